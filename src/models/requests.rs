//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming HTTP request bodies and path checks.

use serde::Deserialize;

/// Maximum allowed record id length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for the sweep operation (POST /cache/sweep)
///
/// # Fields
/// - `max_age_ms`: Entries created longer ago than this are removed
#[derive(Debug, Clone, Deserialize)]
pub struct SweepRequest {
    pub max_age_ms: u64,
}

/// Validates a record id taken from the path.
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_record_id(id: &str) -> Option<String> {
    if id.trim().is_empty() {
        return Some("Record id cannot be empty".to_string());
    }
    if id.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Record id exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_request_deserialize() {
        let json = r#"{"max_age_ms": 1500}"#;
        let req: SweepRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.max_age_ms, 1500);
    }

    #[test]
    fn test_sweep_request_requires_max_age() {
        assert!(serde_json::from_str::<SweepRequest>("{}").is_err());
    }

    #[test]
    fn test_validate_empty_id() {
        assert!(validate_record_id("").is_some());
        assert!(validate_record_id("   ").is_some());
    }

    #[test]
    fn test_validate_long_id() {
        let id = "x".repeat(MAX_KEY_LENGTH + 1);
        assert!(validate_record_id(&id).is_some());
    }

    #[test]
    fn test_validate_valid_id() {
        assert!(validate_record_id("skill-rust").is_none());
    }
}
