use crate::domain::DomainError;
use tonic::Status;

/// Convert domain error to gRPC Status
pub fn domain_error_to_status(error: DomainError) -> Status {
    match error {
        DomainError::MalformedPayload(msg) => {
            Status::invalid_argument(format!("Malformed payload: {}", msg))
        }

        DomainError::StorageUnavailable(msg) => Status::unavailable(msg),

        DomainError::CodecNotFound(msg) | DomainError::CodecBindingNotFound(msg) => {
            Status::not_found(msg)
        }

        DomainError::InvalidDeviceId(msg)
        | DomainError::InvalidTimeRange(msg)
        | DomainError::ValidationError(msg) => Status::invalid_argument(msg),

        DomainError::RepositoryError(err) => Status::internal(format!("Internal error: {}", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_malformed_payload_is_invalid_argument() {
        let status = domain_error_to_status(DomainError::MalformedPayload(
            "unknown type tag 0xff".to_string(),
        ));
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().contains("0xff"));
    }

    #[test]
    fn test_storage_unavailable_is_retryable() {
        let status = domain_error_to_status(DomainError::StorageUnavailable("down".to_string()));
        assert_eq!(status.code(), Code::Unavailable);
    }

    #[test]
    fn test_not_found_variants() {
        assert_eq!(
            domain_error_to_status(DomainError::CodecNotFound("x".to_string())).code(),
            Code::NotFound
        );
        assert_eq!(
            domain_error_to_status(DomainError::CodecBindingNotFound("x".to_string())).code(),
            Code::NotFound
        );
    }

    #[test]
    fn test_repository_error_is_internal() {
        let status = domain_error_to_status(DomainError::RepositoryError(anyhow::anyhow!("boom")));
        assert_eq!(status.code(), Code::Internal);
    }
}
