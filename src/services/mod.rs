//! External data services used to enrich prompts

pub mod weather;

pub use weather::{OpenWeatherClient, WeatherProvider};
