pub mod access;
pub mod aggregator;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod heuristic;
pub mod llm_narrator;
pub mod locks;
pub mod meetings;
pub mod orchestrator;
pub mod period;
pub mod renderer;
pub mod scoring;
pub mod sources;
pub mod store;

pub use access::{AccessControl, AccessTarget};
pub use aggregator::ActivityAggregator;
pub use config::{EngineConfig, LLMConfig, LLMProvider};
pub use database::Database;
pub use engine::{Access, Engine};
pub use error::{EngineError, EngineResult};
pub use extractor::SectionExtractor;
pub use heuristic::{ExtractionTarget, KeywordHeuristic, NO_ITEMS_FOUND};
pub use llm_narrator::{LLMNarrator, NarrativeGenerator};
pub use meetings::{MeetingMinutesService, NewMeeting};
pub use orchestrator::SummaryOrchestrator;
pub use period::Period;
pub use renderer::{DerivedFields, RawInput, Renderer};
pub use scoring::{score, Scores};
pub use sources::{JsonFileSource, SourceClient};
pub use store::{IdentityStore, MeetingStore, SummaryStore};
