//! `rota-core`: rotates a single duty role through an ordered roster.
//!
//! ```text
//! ConfigStore ──load──▶ RotationEngine ──arm──▶ Scheduler
//!      ▲                   │    ▲                   │
//!      └──────save─────────┘    └──────rotate───────┘
//!                          │
//!                          ▼
//!                     RoleAdapter (grant / revoke / resolve)
//! ```

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod paths;
pub mod scheduler;
pub mod types;

pub use adapter::{AdapterError, AdapterResult, ParticipantHandle, RoleAdapter, RoleHandle};
pub use config::{ConfigStore, RotationConfig, Schedule};
pub use engine::{IndexUpdate, RevokeFailure, RotationEngine, RotationOutcome, RotationStatus};
pub use error::{Result, RotaError};
pub use types::{EngineState, InvalidReason, ParticipantId, RoleId};
