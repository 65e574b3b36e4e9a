//! # ensemble-sim: Turn Orchestration for ENSEMBLE
//!
//! Runs a roster of agents turn by turn. Each agent decides through its own
//! pipeline (memory retrieval, prompt, inference, parse, fallback); the
//! orchestrator joins the decisions, isolates failures and applies the
//! actions to the host world in registration order.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                TurnOrchestrator                │
//! │     run_turn(snapshot) ──▶ TurnResult          │
//! │  ┌────────────┐  ┌────────────┐  ┌──────────┐  │
//! │  │ Decide     │  │ Decide     │  │ Decide   │  │  one task per agent
//! │  │ (agent 1)  │  │ (agent 2)  │  │ (agent n)│  │
//! │  └─────┬──────┘  └─────┬──────┘  └────┬─────┘  │
//! │        ▼               ▼              ▼        │
//! │  ┌──────────────────────────────────────────┐  │
//! │  │ DecisionPipeline                         │  │
//! │  │   ensemble-core: MemoryStore, Fallback   │  │
//! │  │   ensemble-llm:  Prompt, Client, Parser  │  │
//! │  └──────────────────────────────────────────┘  │
//! │        │ ActionApplier (registration order)    │
//! └────────┼───────────────────────────────────────┘
//!          ▼
//!      host world
//! ```
//!
//! ## Modules
//!
//! - `pipeline`: the `Decide` seam and the default `DecisionPipeline`
//! - `orchestrator`: `TurnOrchestrator`, `TurnResult`, failure isolation
//! - `telemetry`: `tracing-subscriber` setup

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod orchestrator;
pub mod pipeline;
pub mod telemetry;

pub use orchestrator::{
    ActionApplier, AgentDecisionFailure, FailureReason, NoopApplier, TurnOrchestrator, TurnResult,
};
pub use pipeline::{Decide, Decision, DecisionPipeline, FallbackReason, PipelineConfig, Stage};
