use crate::domain::device_id::DeviceId;
use crate::domain::readings::Readings;
use crate::domain::result::DomainResult;
use async_trait::async_trait;

/// Decode/encode strategy for one binary payload format
///
/// Implementations should:
/// - Decode all-or-nothing: any truncated record, unknown tag or oversized
///   length fails the whole payload with DomainError::MalformedPayload
/// - Encode every legal set of readings (an empty set encodes to a valid,
///   possibly empty, byte sequence)
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Codec: Send + Sync {
    /// Name the codec is registered and bound under
    fn name(&self) -> &str;

    /// Decode a raw uplink payload into readings
    fn decode(&self, payload: &[u8]) -> DomainResult<Readings>;

    /// Encode readings into a raw payload
    fn encode(&self, readings: &Readings) -> DomainResult<Vec<u8>>;
}

/// Lookup of the codec a device's payloads are decoded with
///
/// The binding itself is owned by the device/application management
/// collaborator; implementations only resolve it.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CodecBindingStore: Send + Sync {
    /// Name of the codec bound to a device, None if the device has no binding
    async fn codec_name_for(&self, device_id: DeviceId) -> DomainResult<Option<String>>;
}
