use super::{is_plain_filename, VariantStore};
use crate::models::{Category, RenderedVariants, SizeClass, VariantSet};
use crate::naming;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory store keyed by `<category>/<filename>`.
#[derive(Clone)]
pub struct MockVariantStore {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    size_classes: Vec<SizeClass>,
    save_count: Arc<Mutex<usize>>,
    delete_count: Arc<Mutex<usize>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockVariantStore {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            size_classes: SizeClass::all().to_vec(),
            save_count: Arc::new(Mutex::new(0)),
            delete_count: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn with_file(self, category: Category, filename: &str, content: Vec<u8>) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(format!("{}/{}", category, filename), content);
        self
    }

    pub fn get_save_count(&self) -> usize {
        *self.save_count.lock().unwrap()
    }

    pub fn get_delete_count(&self) -> usize {
        *self.delete_count.lock().unwrap()
    }

    pub fn get_files(&self) -> HashMap<String, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }
}

impl Default for MockVariantStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VariantStore for MockVariantStore {
    async fn save(
        &self,
        variants: RenderedVariants,
        base_filename: &str,
        category: Category,
    ) -> Result<VariantSet> {
        if *self.should_fail.lock().unwrap() {
            return Err(crate::Error::Io(std::io::Error::other("Mock failure")));
        }
        if !is_plain_filename(base_filename) {
            return Err(crate::Error::Invariant(format!(
                "Refusing to store variants under '{}'",
                base_filename
            )));
        }

        let mut count = self.save_count.lock().unwrap();
        *count += 1;

        let mut files = self.files.lock().unwrap();
        let mut stored = VariantSet::new();
        for (class, bytes) in variants.iter() {
            let filename = naming::variant_filename(base_filename, class);
            files.insert(format!("{}/{}", category, filename), bytes.to_vec());
            stored.insert(class, filename);
        }
        Ok(stored)
    }

    async fn delete(&self, filename: &str, category: Category) -> usize {
        let mut count = self.delete_count.lock().unwrap();
        *count += 1;

        let mut files = self.files.lock().unwrap();
        self.size_classes
            .iter()
            .filter(|class| {
                let key = format!(
                    "{}/{}",
                    category,
                    naming::variant_filename(filename, **class)
                );
                files.remove(&key).is_some()
            })
            .count()
    }
}
