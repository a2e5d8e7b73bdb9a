//! Core types shared by every agentflow crate.
//!
//! Holds the strongly-typed identifiers for internal resources, the
//! `Result` alias built on rootcause reports and the retry backoff policy.
//! Domain error enums live in the crates that raise them.

pub mod backoff;
pub mod error;
pub mod id;

pub use backoff::Backoff;
pub use error::Result;
pub use id::{AgentId, IdLinkId, ParseIdError, SessionId, SyncLogId, UserId};
