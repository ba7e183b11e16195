//! Variant persistence
//!
//! Stores rendered variants under `<upload_root>/<category>/` using the
//! naming convention from [`crate::naming`], and sweeps a full variant set
//! given only its original filename.

pub mod local;
pub mod mock;

pub use local::LocalVariantStore;
pub use mock::MockVariantStore;

use crate::models::{Category, RenderedVariants, VariantSet};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait VariantStore: Send + Sync {
    /// Persist one file per rendered size class. On error nothing from this
    /// call is left behind.
    async fn save(
        &self,
        variants: RenderedVariants,
        base_filename: &str,
        category: Category,
    ) -> Result<VariantSet>;

    /// Best-effort removal of every configured variant of `filename`.
    /// Failures are logged, never returned. Yields the number of files removed.
    async fn delete(&self, filename: &str, category: Category) -> usize;
}

/// Stored names must stay inside their category folder.
pub(crate) fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains(['/', '\\'])
        && filename != "."
        && filename != ".."
}
