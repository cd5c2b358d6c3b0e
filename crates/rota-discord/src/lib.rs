//! `rota-discord`: [`RoleAdapter`](rota_core::RoleAdapter) backed by the
//! Discord REST API.
//!
//! Only the guild-member role routes are used; there is no gateway
//! connection. Rate limits (429) and server errors surface as transient
//! adapter errors and are never retried here.

pub mod client;
pub mod error;
pub mod types;

pub use client::{DiscordConfig, DiscordRoleAdapter, DEFAULT_API_BASE};
pub use error::DiscordError;
