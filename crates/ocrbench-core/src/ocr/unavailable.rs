//! Placeholder for engines that cannot run in this environment.

use std::path::Path;

use async_trait::async_trait;

use super::{Device, ExtractionResult, Extractor};
use crate::error::EngineError;

/// Adapter that fails every call with the same `Unavailable` error.
///
/// Keeps unavailable engines visible in reports as attempted rather than
/// silently missing.
pub struct UnavailableExtractor {
    name: String,
    reason: String,
}

impl UnavailableExtractor {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait(?Send)]
impl Extractor for UnavailableExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_loaded(&self) -> bool {
        false
    }

    async fn extract(&mut self, _document: &Path, _device: Device) -> Result<ExtractionResult, EngineError> {
        Err(EngineError::Unavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_fails() {
        let mut extractor = UnavailableExtractor::new("smolvlm", "no command configured");
        for _ in 0..2 {
            let err = extractor
                .extract(Path::new("missing.png"), Device::Cpu)
                .await
                .unwrap_err();
            assert_eq!(err, EngineError::Unavailable("no command configured".to_string()));
        }
        assert_eq!(extractor.name(), "smolvlm");
    }
}
