use async_trait::async_trait;
use common::domain::{CodecBindingStore, DeviceId, DomainResult};
use dashmap::DashMap;
use tracing::debug;

/// In-memory device → codec-name bindings
pub struct InMemoryCodecBindingStore {
    bindings: DashMap<DeviceId, String>,
}

impl InMemoryCodecBindingStore {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
        }
    }

    /// Bind a device to a codec, returning the previous binding
    pub fn bind(&self, device_id: DeviceId, codec_name: impl Into<String>) -> Option<String> {
        let codec_name = codec_name.into();
        debug!(device_id = %device_id, codec = %codec_name, "binding device to codec");
        self.bindings.insert(device_id, codec_name)
    }

    pub fn unbind(&self, device_id: DeviceId) -> Option<String> {
        self.bindings.remove(&device_id).map(|(_, name)| name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for InMemoryCodecBindingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CodecBindingStore for InMemoryCodecBindingStore {
    async fn codec_name_for(&self, device_id: DeviceId) -> DomainResult<Option<String>> {
        Ok(self
            .bindings
            .get(&device_id)
            .map(|name| name.value().clone()))
    }
}
