//! travel-assistant: a travel-domain chat service over a local Ollama model
//!
//! This library provides:
//! - Query classification, history curation and prompt composition
//! - Weather enrichment from OpenWeather
//! - Advisory quality scanning of model replies
//! - In-memory sessions with expiry and per-session request cancellation
//! - An axum HTTP API over the pipeline

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod services;
pub mod transport;

pub use agent::{ChatOutcome, TravelAssistant};
pub use config::Config;
