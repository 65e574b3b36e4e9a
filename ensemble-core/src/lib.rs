//! # Ensemble Core Library
//!
//! Model-agnostic building blocks for a turn-based cast of agents:
//!
//! - **Agents**: identity, factions and personality weights
//! - **World snapshots**: the immutable per-turn view and its legal actions
//! - **Layered memory**: working, episodic, semantic and emotional items
//!   with per-turn decay, capacity eviction and context-matched retrieval
//! - **Fallback**: a deterministic rule table that always produces an action
//!
//! Nothing in this crate performs I/O on the decision path; the inference
//! client lives in `ensemble-llm` and the turn loop in `ensemble-sim`.
//!
//! ## Performance Contract
//!
//! - Memory record: < 10μs
//! - Memory query (top-5 of 200): < 500μs
//! - Fallback decision: < 20μs

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod agent;
pub mod config;
pub mod consolidation;
pub mod decay;
pub mod error;
pub mod eviction;
pub mod fallback;
pub mod memory;
pub mod retrieval;
pub mod types;
pub mod world;

pub use action::{ActionPriority, ActionSource, CharacterAction, CharacterActionBuilder};
pub use agent::AgentState;
pub use config::EnsembleConfig;
pub use error::{EnsembleError, Result};
pub use fallback::FallbackPolicy;
pub use memory::{MemoryItem, MemoryKind, MemoryQuery, MemoryStore};
pub use types::*;
pub use world::{ActionCategory, ActionSet, ActionSpec, ThreatLevel, WorldStateSnapshot};
