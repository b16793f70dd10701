//! MUA client core
//!
//! Viewer-side state for the MUA marketplace: the social feed, comment trees,
//! chat, follow state and artist search. Local changes are applied
//! optimistically and reconciled against the REST API and the push channel.

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod realtime;
pub mod search;
pub mod session;
pub mod sync;
