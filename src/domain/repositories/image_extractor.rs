//! Image extraction capability.
//!
//! `Ok(None)` means "no signal extracted" and is not an error; callers only
//! see `Err` on transport failure, which they may retry.

use async_trait::async_trait;

use crate::domain::entities::signal::ParsedSignal;
use crate::domain::errors::VisionError;

#[async_trait]
pub trait ImageExtractor: Send + Sync {
    /// Extract structured trade parameters from a chart image.
    async fn extract(
        &self,
        image_base64: &str,
        mime_type: &str,
    ) -> Result<Option<ParsedSignal>, VisionError>;
}
