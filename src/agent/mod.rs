//! Travel assistant agent: classification, history curation, prompt
//! composition, reply scanning and the request pipeline that ties them.

pub mod assistant;
pub mod classifier;
pub mod history;
pub mod prompt;
pub mod quality;

pub use assistant::{ChatOutcome, ReplyKind, TravelAssistant};
pub use classifier::Classification;
pub use quality::{QualityFlag, QualityReport, QualityScanner};
