//! API request/response models for resource endpoints.
//!
//! Record payloads are free-form JSON objects checked against the resource schema, so only the
//! query parameters and confirmation bodies have fixed shapes.

use crate::db::handlers::RecordFilter;
use serde::{Deserialize, Serialize};

/// Query parameters for listing records. Both are optional; without them every record is
/// returned in insertion order.
#[derive(Debug, Default, Deserialize)]
pub struct ListRecordsQuery {
    /// Number of records to skip
    pub skip: Option<i64>,
    /// Maximum number of records to return
    pub limit: Option<i64>,
}

impl ListRecordsQuery {
    pub fn filter(&self) -> RecordFilter {
        RecordFilter::new(self.skip.unwrap_or(0).max(0), self.limit.map(|limit| limit.max(0)))
    }
}

/// Confirmation body returned by delete endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults_to_everything() {
        let filter = ListRecordsQuery::default().filter();
        assert_eq!(filter.skip, 0);
        assert_eq!(filter.limit, None);
    }

    #[test]
    fn test_filter_clamps_negative_values() {
        let query = ListRecordsQuery {
            skip: Some(-4),
            limit: Some(-1),
        };
        let filter = query.filter();
        assert_eq!(filter.skip, 0);
        assert_eq!(filter.limit, Some(0));
    }
}
