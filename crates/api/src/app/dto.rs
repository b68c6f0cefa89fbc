use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListWorkspacesQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

// -------------------------
// Response DTOs
// -------------------------

/// Envelope for list endpoints.
#[derive(Debug, Serialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for Items<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

// -------------------------
// Path helpers
// -------------------------

/// Parse a path segment into one of the UUID id newtypes.
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = atrium_core::DomainError>,
{
    raw.parse::<T>().map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::WorkspaceId;

    #[test]
    fn parse_id_rejects_garbage() {
        let id = WorkspaceId::new();
        assert_eq!(parse_id::<WorkspaceId>(&id.to_string()).unwrap(), id);
        assert!(matches!(
            parse_id::<WorkspaceId>("not-a-uuid"),
            Err(ApiError::Validation(_))
        ));
    }
}
