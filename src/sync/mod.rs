//! Reconciliation of local view state against REST results and push events.
//!
//! Every mutating action is split into `begin_*` (apply the optimistic change
//! and return a ticket), the awaited API call, and `settle_*` (confirm or
//! roll back). The `async` convenience methods chain the three; callers that
//! need to process push events while a request is in flight use the split
//! form.

mod chat;
mod comments;
mod engine;
mod feed;
mod follow;
mod ranking;

pub use chat::*;
pub use comments::*;
pub use engine::*;
pub use feed::*;
pub use follow::*;
pub use ranking::*;
