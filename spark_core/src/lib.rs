#![forbid(unsafe_code)]

//! Core domain model and business logic for the Ignition spark tracker.
//!
//! This crate provides:
//! - Domain types (activities, missions, cards, progress, effects)
//! - Card catalog and weighted drops
//! - Mission catalog, progress rules and the reset scheduler
//! - Points, fuel gauge, overloads and levels
//! - Persistence (JSON documents, JSONL activity log, CSV export)
//! - The progression engine that ties it together

pub mod types;
pub mod error;
pub mod calendar;
pub mod clock;
pub mod random;
pub mod config;
pub mod logging;
pub mod streak;
pub mod cards;
pub mod missions;
pub mod ledger;
pub mod level;
pub mod store;
pub mod export;
pub mod engine;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use calendar::Calendar;
pub use clock::{Clock, ManualClock, SystemClock};
pub use random::{RandomSource, ScriptedRandom, SeededRandom, ThreadRandom};
pub use config::Config;
pub use cards::{build_default_card_catalog, default_card_catalog, DuplicateBonus};
pub use missions::{build_default_missions, default_missions, MissionEngine};
pub use ledger::RewardLedger;
pub use level::{Level, LevelProgress};
pub use store::{Changes, FileStore, MemoryStore, Store};
pub use export::export_activities;
pub use engine::{EngineSettings, ProgressionEngine, StatusReport};
