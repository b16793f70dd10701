//! Response envelopes: `{ success, data?, message? }` and paginated lists.

use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, ClientResult};

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Unwrap the payload, treating `success: false` or a missing `data` as errors.
    pub fn into_data(self) -> ClientResult<T> {
        if !self.success {
            return Err(ClientError::Api(
                self.message.unwrap_or_else(|| "Request failed".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| ClientError::Decode("Response envelope has no data".to_string()))
    }

    /// Check the success flag only, for mutations whose payload is ignored.
    pub fn into_unit(self) -> ClientResult<()> {
        if self.success {
            Ok(())
        } else {
            Err(ClientError::Api(
                self.message.unwrap_or_else(|| "Request failed".to_string()),
            ))
        }
    }
}

/// Canonical page of results.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            total_pages: 0,
        }
    }
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Both list shapes the backend emits. Only `Canonical` is modeled going
/// forward; `Legacy` is normalized on decode.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPage<T> {
    #[serde(rename_all = "camelCase")]
    Canonical {
        items: Vec<T>,
        total: u64,
        page: u32,
        total_pages: u32,
    },
    Legacy {
        items: Vec<T>,
        pages: u32,
    },
}

impl<T> From<RawPage<T>> for Page<T> {
    fn from(raw: RawPage<T>) -> Self {
        match raw {
            RawPage::Canonical {
                items,
                total,
                page,
                total_pages,
            } => Page {
                items,
                total,
                page,
                total_pages,
            },
            RawPage::Legacy { items, pages } => {
                tracing::warn!("Legacy {{items, pages}} list envelope received; normalizing");
                Page {
                    total: items.len() as u64,
                    items,
                    page: 1,
                    total_pages: pages,
                }
            }
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Page<T> {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        RawPage::deserialize(de).map(Page::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_page() {
        let page: Page<u32> = serde_json::from_str(
            r#"{"items":[1,2],"total":14,"page":2,"totalPages":7}"#,
        )
        .unwrap();
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.total, 14);
        assert_eq!(page.page, 2);
        assert!(page.has_more());
    }

    #[test]
    fn test_legacy_page_is_normalized() {
        let page: Page<u32> = serde_json::from_str(r#"{"items":[1,2,3],"pages":4}"#).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 4);
    }

    #[test]
    fn test_failed_envelope_carries_message() {
        let env: ApiResponse<u32> =
            serde_json::from_str(r#"{"success":false,"message":"Post not found"}"#).unwrap();
        assert_eq!(
            env.into_data(),
            Err(ClientError::Api("Post not found".to_string()))
        );
    }

    #[test]
    fn test_unit_envelope_without_data() {
        let env: ApiResponse<serde_json::Value> =
            serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(env.into_unit(), Ok(()));
    }
}
