//! Makeup artist profile and bookable service models used by artist search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bookable service offered by an artist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    /// Price in VND.
    pub price: u64,
    #[serde(default, alias = "category", skip_serializing_if = "Option::is_none")]
    pub occasion: Option<String>,
    #[serde(default)]
    pub add_ons: Vec<String>,
}

/// Artist as returned by the search endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(alias = "fullName")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub bookings_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Artist {
    /// Cheapest service price, used for price sorting.
    pub fn min_price(&self) -> Option<u64> {
        self.services.iter().map(|s| s.price).min()
    }
}
