//! Store error handling
//!
//! Typed errors for requests against the hosted store, with the service's
//! own error message preserved where it sends one.

use thiserror::Error;

use crate::models::TodoId;

/// Errors that can occur while talking to the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport failure (DNS, TLS, connection reset, ...)
    #[error("Request to store failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status
    #[error("Store rejected request ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
        details: Option<String>,
        hint: Option<String>,
    },

    /// Response body did not match the expected shape
    #[error("Unexpected response from store: {0}")]
    Decode(#[from] serde_json::Error),

    /// A write succeeded but returned no representation
    #[error("Store returned no rows for {0}; check row level security policies")]
    NoRows(&'static str),

    /// No record with this id exists
    #[error("Todo not found: {0}")]
    NotFound(TodoId),

    /// Store URL or key cannot be used to build requests
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// Short message suitable for a status bar
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Api {
                message, hint: Some(hint), ..
            } => format!("{} ({})", message, hint),
            StoreError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, hint: Option<&str>) -> StoreError {
        StoreError::Api {
            status,
            message: "permission denied for table todos".to_string(),
            code: Some("42501".to_string()),
            details: None,
            hint: hint.map(str::to_string),
        }
    }

    #[test]
    fn test_display() {
        let err = api(401, None);
        assert_eq!(
            err.to_string(),
            "Store rejected request (401): permission denied for table todos"
        );
        assert_eq!(StoreError::NotFound(7).to_string(), "Todo not found: 7");
    }

    #[test]
    fn test_user_message_includes_hint() {
        assert_eq!(
            api(401, Some("check the anon key")).user_message(),
            "permission denied for table todos (check the anon key)"
        );
        assert_eq!(
            api(401, None).user_message(),
            "permission denied for table todos"
        );
    }
}
