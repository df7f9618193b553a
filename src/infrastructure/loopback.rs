use crate::domain::ports::Transformer;
use crate::domain::service::Service;
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Stands in for the transformation provider by returning the primary image
/// unchanged. Used for local replays and when no provider is configured.
#[derive(Debug, Default, Clone)]
pub struct LoopbackTransformer;

impl LoopbackTransformer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transformer for LoopbackTransformer {
    async fn transform(
        &self,
        service: Service,
        primary: &[u8],
        secondary: Option<&[u8]>,
        _description: Option<&str>,
    ) -> Result<Vec<u8>> {
        debug!(%service, bytes = primary.len(), two_images = secondary.is_some(), "loopback transform");
        Ok(primary.to_vec())
    }
}
