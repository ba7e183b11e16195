use super::{is_plain_filename, VariantStore};
use crate::models::{Category, ImagePolicy, RenderedVariants, SizeClass, VariantSet};
use crate::naming;
use crate::{Error, Result};
use async_trait::async_trait;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Directory under the upload root holding in-progress saves.
pub const STAGING_DIR: &str = ".staging";

pub struct LocalVariantStore {
    upload_root: PathBuf,
    policy: Arc<ImagePolicy>,
}

impl LocalVariantStore {
    pub fn new(upload_root: &Path, policy: Arc<ImagePolicy>) -> Self {
        Self {
            upload_root: upload_root.to_path_buf(),
            policy,
        }
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.upload_root.join(category.as_str())
    }

    pub fn staging_root(&self) -> PathBuf {
        self.upload_root.join(STAGING_DIR)
    }

    /// Remove staging directories abandoned by a save that never finished,
    /// e.g. after a crash. Run at startup, before uploads are accepted.
    pub fn remove_stale_staging(&self) -> usize {
        let staging_root = self.staging_root();
        let entries = match fs::read_dir(&staging_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                error!("Error reading staging dir {}: {}", staging_root.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove stale staging entry {}: {}", path.display(), e),
            }
        }
        if removed > 0 {
            info!("Removed {} stale staging entries", removed);
        }
        removed
    }

    /// On-disk location of one variant; existence is not checked.
    pub fn variant_path(&self, filename: &str, category: Category, class: SizeClass) -> PathBuf {
        self.category_dir(category)
            .join(naming::variant_filename(filename, class))
    }

    /// Writes land in a per-save directory under the staging root and are
    /// renamed into place only once every variant has been written.
    fn save_sync(
        staging_root: PathBuf,
        dir: PathBuf,
        variants: RenderedVariants,
        base_filename: &str,
    ) -> Result<VariantSet> {
        fs::create_dir_all(&dir)?;
        fs::create_dir_all(&staging_root)?;
        let staging = tempfile::Builder::new()
            .prefix("save-")
            .tempdir_in(&staging_root)?;

        let mut stored = VariantSet::new();
        for (class, bytes) in variants.iter() {
            let filename = naming::variant_filename(base_filename, class);
            fs::write(staging.path().join(&filename), bytes)?;
            stored.insert(class, filename);
        }

        let mut promoted: Vec<PathBuf> = Vec::with_capacity(stored.len());
        for (_, filename) in stored.iter() {
            let target = dir.join(filename);
            if let Err(e) = fs::rename(staging.path().join(filename), &target) {
                for path in &promoted {
                    if let Err(cleanup) = fs::remove_file(path) {
                        warn!(
                            "Failed to roll back variant {}: {}",
                            path.display(),
                            cleanup
                        );
                    }
                }
                return Err(e.into());
            }
            promoted.push(target);
        }

        Ok(stored)
    }

    fn delete_sync(dir: PathBuf, filename: &str, size_classes: &[SizeClass]) -> usize {
        let mut removed = 0;
        for class in size_classes {
            let path = dir.join(naming::variant_filename(filename, *class));
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => error!("Error deleting image variant {}: {}", path.display(), e),
            }
        }
        removed
    }
}

#[async_trait]
impl VariantStore for LocalVariantStore {
    async fn save(
        &self,
        variants: RenderedVariants,
        base_filename: &str,
        category: Category,
    ) -> Result<VariantSet> {
        if !is_plain_filename(base_filename) {
            return Err(Error::Invariant(format!(
                "Refusing to store variants under '{}'",
                base_filename
            )));
        }
        let configured: Vec<SizeClass> = self.policy.size_classes().collect();
        let rendered: Vec<SizeClass> = variants.iter().map(|(class, _)| class).collect();
        if configured.len() != rendered.len()
            || !configured.iter().all(|class| rendered.contains(class))
        {
            return Err(Error::Invariant(format!(
                "Rendered size classes {:?} do not match configured {:?}",
                rendered, configured
            )));
        }

        let dir = self.category_dir(category);
        let staging_root = self.staging_root();
        let stored = tokio::task::spawn_blocking({
            let base_filename = base_filename.to_string();
            move || Self::save_sync(staging_root, dir, variants, &base_filename)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Variant store task join error: {}", e)))??;

        info!(
            "Stored {} variants of {} in {}",
            stored.len(),
            base_filename,
            category
        );
        Ok(stored)
    }

    async fn delete(&self, filename: &str, category: Category) -> usize {
        if !is_plain_filename(filename) {
            warn!("Skipping variant deletion for unsafe filename '{}'", filename);
            return 0;
        }

        let dir = self.category_dir(category);
        let size_classes: Vec<SizeClass> = self.policy.size_classes().collect();
        let result = tokio::task::spawn_blocking({
            let filename = filename.to_string();
            move || Self::delete_sync(dir, &filename, &size_classes)
        })
        .await;

        match result {
            Ok(removed) => {
                info!("Deleted {} variants of {} in {}", removed, filename, category);
                removed
            }
            Err(e) => {
                error!("Error deleting image variants of {}: {}", filename, e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct TestStore {
        store: LocalVariantStore,
        temp_dir: TempDir,
    }

    impl TestStore {
        fn new() -> Result<Self> {
            let temp_dir = TempDir::new()?;
            let store = LocalVariantStore::new(temp_dir.path(), Arc::new(ImagePolicy::default()));
            Ok(Self { store, temp_dir })
        }

        fn files_in(&self, category: Category) -> Vec<String> {
            let mut names: Vec<String> = fs::read_dir(self.temp_dir.path().join(category.as_str()))
                .map(|entries| {
                    entries
                        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                        .collect()
                })
                .unwrap_or_default();
            names.sort();
            names
        }
    }

    fn rendered_all() -> RenderedVariants {
        let mut rendered = RenderedVariants::new();
        for class in SizeClass::all() {
            rendered.insert(*class, class.as_str().as_bytes().to_vec());
        }
        rendered
    }

    #[tokio::test]
    async fn test_save_writes_one_file_per_class() {
        let test = TestStore::new().unwrap();

        let stored = test
            .store
            .save(rendered_all(), "abc123.jpg", Category::Products)
            .await
            .unwrap();

        assert_eq!(stored.original(), Some("abc123.jpg"));
        assert_eq!(stored.get(SizeClass::Large), Some("abc123_large.jpg"));
        assert_eq!(
            test.files_in(Category::Products),
            vec![
                "abc123.jpg",
                "abc123_large.jpg",
                "abc123_medium.jpg",
                "abc123_thumbnail.jpg",
            ]
        );

        let thumb = fs::read(test.store.variant_path(
            "abc123.jpg",
            Category::Products,
            SizeClass::Thumbnail,
        ))
        .unwrap();
        assert_eq!(thumb, b"thumbnail");
    }

    #[tokio::test]
    async fn test_save_then_delete_leaves_nothing() {
        let test = TestStore::new().unwrap();

        test.store
            .save(rendered_all(), "abc123.png", Category::Offers)
            .await
            .unwrap();
        let removed = test.store.delete("abc123.png", Category::Offers).await;

        assert_eq!(removed, 4);
        assert!(test.files_in(Category::Offers).is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_tolerates_missing_files() {
        let test = TestStore::new().unwrap();

        test.store
            .save(rendered_all(), "abc123.png", Category::Users)
            .await
            .unwrap();
        fs::remove_file(test.store.variant_path("abc123.png", Category::Users, SizeClass::Medium))
            .unwrap();

        assert_eq!(test.store.delete("abc123.png", Category::Users).await, 3);
        assert_eq!(test.store.delete("abc123.png", Category::Users).await, 0);
        assert_eq!(test.store.delete("never-stored.png", Category::Products).await, 0);
    }

    #[tokio::test]
    async fn test_delete_continues_past_io_errors() {
        let test = TestStore::new().unwrap();

        test.store
            .save(rendered_all(), "abc.png", Category::Products)
            .await
            .unwrap();
        let medium = test
            .store
            .variant_path("abc.png", Category::Products, SizeClass::Medium);
        fs::remove_file(&medium).unwrap();
        fs::create_dir(&medium).unwrap();

        let removed = test.store.delete("abc.png", Category::Products).await;

        assert_eq!(removed, 3);
        assert_eq!(test.files_in(Category::Products), vec!["abc_medium.png"]);
        assert!(medium.is_dir());
    }

    #[tokio::test]
    async fn test_save_leaves_no_staging_behind() {
        let test = TestStore::new().unwrap();

        test.store
            .save(rendered_all(), "abc.jpg", Category::Offers)
            .await
            .unwrap();

        let leftovers: Vec<_> = fs::read_dir(test.store.staging_root()).unwrap().collect();
        assert!(leftovers.is_empty());
        assert!(test.files_in(Category::Offers).iter().all(|f| f.starts_with("abc")));
    }

    #[test]
    fn test_remove_stale_staging() {
        let test = TestStore::new().unwrap();
        assert_eq!(test.store.remove_stale_staging(), 0);

        let abandoned = test.store.staging_root().join("save-crashed");
        fs::create_dir_all(&abandoned).unwrap();
        fs::write(abandoned.join("abc_large.jpg"), b"partial").unwrap();
        fs::write(test.store.staging_root().join("stray.tmp"), b"x").unwrap();

        assert_eq!(test.store.remove_stale_staging(), 2);
        assert!(!abandoned.exists());
        assert!(test.store.staging_root().exists());
    }

    #[tokio::test]
    async fn test_delete_leaves_other_images_alone() {
        let test = TestStore::new().unwrap();

        test.store
            .save(rendered_all(), "keep.jpg", Category::Products)
            .await
            .unwrap();
        test.store
            .save(rendered_all(), "drop.jpg", Category::Products)
            .await
            .unwrap();
        test.store.delete("drop.jpg", Category::Products).await;

        let files = test.files_in(Category::Products);
        assert_eq!(files.len(), 4);
        assert!(files.iter().all(|f| f.starts_with("keep")));
    }

    #[tokio::test]
    async fn test_save_rejects_incomplete_variant_set() {
        let test = TestStore::new().unwrap();
        let mut partial = RenderedVariants::new();
        partial.insert(SizeClass::Original, b"original".to_vec());

        let result = test
            .store
            .save(partial, "abc123.jpg", Category::Products)
            .await;

        assert!(matches!(result, Err(Error::Invariant(_))));
        assert!(test.files_in(Category::Products).is_empty());
    }

    #[tokio::test]
    async fn test_path_like_names_are_refused() {
        let test = TestStore::new().unwrap();

        let result = test
            .store
            .save(rendered_all(), "../escape.jpg", Category::Products)
            .await;
        assert!(matches!(result, Err(Error::Invariant(_))));
        assert_eq!(test.store.delete("../escape.jpg", Category::Products).await, 0);
    }
}
