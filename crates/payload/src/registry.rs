use crate::cayenne_lpp::CayenneLpp;
use common::{Codec, DomainError, DomainResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Named codecs, built once at startup and shared by reference.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in codec
    pub fn with_builtin_codecs() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CayenneLpp::new()));
        registry
    }

    /// Register a codec under its own name, replacing any codec of the same name
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        let name = codec.name().to_string();
        debug!(codec = %name, "registering payload codec");
        self.codecs.insert(name, codec);
    }

    pub fn get(&self, name: &str) -> DomainResult<Arc<dyn Codec>> {
        self.codecs
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::CodecNotFound(name.to_string()))
    }

    /// Registered codec names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("codecs", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{MockCodec, Readings};

    #[test]
    fn test_builtin_codecs() {
        let registry = CodecRegistry::with_builtin_codecs();
        assert_eq!(registry.names(), vec!["cayenne_lpp"]);
        assert!(registry.get("cayenne_lpp").is_ok());
    }

    #[test]
    fn test_unknown_codec() {
        let registry = CodecRegistry::new();
        assert!(registry.is_empty());

        let result = registry.get("cayenne_lpp");
        assert!(matches!(result, Err(DomainError::CodecNotFound(name)) if name == "cayenne_lpp"));
    }

    #[test]
    fn test_register_custom_codec() {
        // Arrange
        let mut codec = MockCodec::new();
        codec.expect_name().return_const("custom".to_string());
        codec
            .expect_decode()
            .returning(|_| Ok(Readings::new()));

        let mut registry = CodecRegistry::with_builtin_codecs();

        // Act
        registry.register(Arc::new(codec));

        // Assert
        assert_eq!(registry.len(), 2);
        let custom = registry.get("custom").unwrap();
        assert!(custom.decode(&[0xAA]).unwrap().is_empty());
    }
}
