//! Variant rendering
//!
//! Decodes an upload once, then produces one encoded image per configured
//! size class: letterboxed to the class's box, or untouched for "original",
//! re-encoded in the format the upload's extension names.

pub mod mime;
pub mod mock;
pub mod processor;

pub use mock::MockVariantRenderer;
pub use processor::ImageProcessor;

use crate::models::RenderedVariants;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait VariantRenderer: Send + Sync {
    /// All-or-nothing: any decode or encode failure fails the whole set.
    async fn render(&self, image_data: &[u8], extension: &str) -> Result<RenderedVariants>;
}
