//! Data models for the MUA platform.
//!
//! These mirror the backend JSON payloads. Fields marked `#[serde(skip)]` are
//! client-only and never come from (or go to) the server.

mod artist;
mod comment;
mod conversation;
mod post;
mod user;

pub use artist::*;
pub use comment::*;
pub use conversation::*;
pub use post::*;
pub use user::*;

use serde::{Deserialize, Deserializer};

/// Deserialize a nullable field so that "absent" (`None`) and "explicitly null"
/// (`Some(None)`) stay distinguishable. Pair with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Field-by-field merge of an optional patch value into a target.
pub(crate) fn merge_field<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}
