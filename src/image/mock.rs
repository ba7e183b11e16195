use super::VariantRenderer;
use crate::models::{RenderedVariants, SizeClass};
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockVariantRenderer {
    render_count: Arc<Mutex<usize>>,
    size_classes: Vec<SizeClass>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockVariantRenderer {
    pub fn new() -> Self {
        Self {
            render_count: Arc::new(Mutex::new(0)),
            size_classes: SizeClass::all().to_vec(),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_size_classes(mut self, size_classes: Vec<SizeClass>) -> Self {
        self.size_classes = size_classes;
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_render_count(&self) -> usize {
        *self.render_count.lock().unwrap()
    }
}

impl Default for MockVariantRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VariantRenderer for MockVariantRenderer {
    async fn render(&self, _image_data: &[u8], extension: &str) -> Result<RenderedVariants> {
        if *self.should_fail.lock().unwrap() {
            return Err(crate::Error::ImageEncode {
                size_class: SizeClass::Large.to_string(),
                source: image::ImageError::IoError(std::io::Error::other("Mock failure")),
            });
        }

        let mut count = self.render_count.lock().unwrap();
        *count += 1;

        let mut rendered = RenderedVariants::new();
        for class in &self.size_classes {
            rendered.insert(*class, format!("{}:{}", class, extension).into_bytes());
        }
        Ok(rendered)
    }
}
