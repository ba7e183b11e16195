//! Upload orchestration: validate, name, render, store.

use crate::image::{ImageProcessor, VariantRenderer};
use crate::models::{
    Category, Config, ImagePolicy, ProductGallery, SizeClass, UploadedImage, VariantSet,
};
use crate::naming;
use crate::storage::{LocalVariantStore, VariantStore};
use crate::validator::UploadValidator;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs uploads through validation, naming, rendering and storage.
pub struct ImagePipeline {
    policy: Arc<ImagePolicy>,
    renderer: Box<dyn VariantRenderer>,
    store: Box<dyn VariantStore>,
}

/// Injectable service bundle used to construct [`ImagePipeline`] in tests.
pub struct PipelineServices {
    pub renderer: Box<dyn VariantRenderer>,
    pub store: Box<dyn VariantStore>,
}

impl ImagePipeline {
    pub fn with_services(services: PipelineServices, policy: Arc<ImagePolicy>) -> Self {
        Self {
            policy,
            renderer: services.renderer,
            store: services.store,
        }
    }

    /// Pipeline backed by the real renderer and the local filesystem store.
    pub fn new(config: Config) -> Self {
        let policy = Arc::new(config.policy);
        info!("Upload root: {}", config.upload_root.display());

        let store = LocalVariantStore::new(&config.upload_root, Arc::clone(&policy));
        store.remove_stale_staging();

        Self::with_services(
            PipelineServices {
                renderer: Box::new(ImageProcessor::new(Arc::clone(&policy))),
                store: Box::new(store),
            },
            policy,
        )
    }

    pub fn policy(&self) -> &ImagePolicy {
        &self.policy
    }

    /// Store every size class of an upload and return their filenames.
    ///
    /// `Ok(None)` means no file was chosen. Callers persist only
    /// [`VariantSet::original`] and must abandon their record on `Err`.
    pub async fn process_upload(
        &self,
        upload: &UploadedImage,
        category: Category,
    ) -> Result<Option<VariantSet>> {
        if upload.is_empty() {
            return Ok(None);
        }

        match self.process(upload, category).await {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                if e.is_user_correctable() {
                    warn!(
                        "Rejected upload {}: {}",
                        naming::sanitize_filename(&upload.filename),
                        e
                    );
                } else {
                    error!(
                        "Error processing image {}: {}",
                        naming::sanitize_filename(&upload.filename),
                        e
                    );
                }
                Err(e)
            }
        }
    }

    async fn process(&self, upload: &UploadedImage, category: Category) -> Result<VariantSet> {
        UploadValidator::new(&self.policy).validate(&upload.filename, upload.size())?;

        let unique_filename = naming::generate_unique_filename(&upload.filename)?;
        let extension = naming::extension(&unique_filename).ok_or_else(|| {
            Error::Invariant(format!("Generated name {} has no extension", unique_filename))
        })?;

        let rendered = self.renderer.render(&upload.data, &extension).await?;
        let stored = self
            .store
            .save(rendered, &unique_filename, category)
            .await?;

        if stored.len() != self.policy.sizes.len() {
            self.store.delete(&unique_filename, category).await;
            return Err(Error::Invariant(format!(
                "Stored {} variants, expected {}",
                stored.len(),
                self.policy.sizes.len()
            )));
        }

        info!(
            "Processed upload {} as {} in {}",
            naming::sanitize_filename(&upload.filename),
            unique_filename,
            category
        );
        Ok(stored)
    }

    /// Relative URL for a stored reference, or `None` for "no image".
    pub fn image_url(&self, filename: &str, category: Category, size: SizeClass) -> Option<String> {
        naming::resolve(filename, category, size)
    }

    /// Best-effort sweep of a variant set. Placeholders are shared and never
    /// removed.
    pub async fn delete_variants(&self, filename: &str, category: Category) -> usize {
        if filename.is_empty() || naming::is_placeholder(filename) {
            return 0;
        }
        self.store.delete(filename, category).await
    }

    /// Upload a replacement, then drop the old set. If the upload fails the
    /// old image stays in place.
    pub async fn replace(
        &self,
        old_filename: &str,
        upload: &UploadedImage,
        category: Category,
    ) -> Result<Option<VariantSet>> {
        let stored = self.process_upload(upload, category).await?;
        if stored.is_some() {
            self.delete_variants(old_filename, category).await;
        }
        Ok(stored)
    }

    /// Sweep every image a product references.
    pub async fn delete_gallery(&self, gallery: &ProductGallery) -> usize {
        let mut removed = 0;
        for image in &gallery.images {
            removed += self
                .delete_variants(&image.filename, Category::Products)
                .await;
        }
        removed
    }
}
