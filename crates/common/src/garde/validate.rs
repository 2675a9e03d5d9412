//! Garde validation helpers shared by configuration and request types.

use crate::domain::DomainError;
use garde::{Report, Validate};

/// Validate a value, folding every garde violation into one DomainError::ValidationError
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(format_report(&report)))
}

/// Render a garde report as `path: message` pairs joined by commas
fn format_report(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            let path = path.to_string();
            if path.is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    #[derive(Validate)]
    struct BufferSettings {
        #[garde(range(min = 1))]
        capacity: usize,
        #[garde(length(min = 16, max = 16))]
        device_id: String,
    }

    #[test]
    fn test_valid_settings_pass() {
        let settings = BufferSettings {
            capacity: 8,
            device_id: "0102030405060708".to_string(),
        };
        assert!(validate_struct(&settings).is_ok());
    }

    #[test]
    fn test_every_violation_is_reported() {
        let settings = BufferSettings {
            capacity: 0,
            device_id: "0102".to_string(),
        };

        let Err(DomainError::ValidationError(msg)) = validate_struct(&settings) else {
            panic!("expected ValidationError");
        };
        assert!(msg.contains("capacity"));
        assert!(msg.contains("device_id"));
    }
}
