//! # Brood
//!
//! Sequential agent pipeline for planning family outings.
//!
//! A caller supplies a request (city, date, child's age and interests,
//! budget, accessibility needs, ...). Brood resolves it into four stage
//! instructions, each bound to a reasoning persona, runs them in order
//! through an external [`StageExecutor`], and validates the final stage's
//! structured answer into an [`ActivityList`].
//!
//! ## Architecture
//!
//! ```text
//! PipelineContext ──┐
//!                   ▼
//! AgentRegistry ─► Pipeline::family_activities
//!                   │
//!                   ▼
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                           ORCHESTRATOR                             │
//! │                                                                    │
//! │  ┌───────────┐   ┌───────────┐   ┌─────────────┐   ┌────────────┐  │
//! │  │ Discovery │──►│ Local map │──►│ Suitability │──►│ Final pick │  │
//! │  └───────────┘   └───────────┘   └─────────────┘   └─────┬──────┘  │
//! │        ▲               ▲                ▲                │         │
//! │        └───── accumulated stage outputs ┘                ▼         │
//! │                                                   validate + write │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Concepts
//!
//! - **Capability**: a named tool (search, scrape) a role may use
//! - **AgentRole**: persona with a goal, backstory and capabilities
//! - **Stage**: one resolved instruction bound to one role
//! - **Pipeline**: the fixed chain of stages, built once per request
//! - **Orchestrator**: runs a pipeline and validates its output

pub mod activity;
pub mod agent;
pub mod context;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod pipeline;
pub mod run;
pub mod stage;
pub mod template;

pub use activity::{ActivityList, ActivityRecord};
pub use agent::{AgentRegistry, AgentRole, Capability, RoleKind};
pub use context::{CountBounds, PipelineContext};
pub use error::{BroodError, Result};
pub use executor::{RecordedCall, ScriptedExecutor, StageExecutor, StageInvocation, StageOutput};
pub use orchestrator::{Orchestrator, RunReport};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineOptions};
pub use run::{CancelToken, RunEvent, RunId, RunState};
pub use stage::{OutputSchema, StageSpec, StageTemplate};
pub use template::PromptTemplate;
