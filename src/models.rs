//! Data models and structures
//!
//! Defines the size classes, storage categories, upload policy and the
//! variant maps passed between the pipeline stages.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Storage sub-folder an image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Products,
    Offers,
    Users,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[Category::Products, Category::Offers, Category::Users]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Products => "products",
            Category::Offers => "offers",
            Category::Users => "users",
        }
    }

    /// Reference stored on a record that has no uploaded image.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Category::Products => "default_product.jpg",
            Category::Offers => "default_offer.jpg",
            Category::Users => "default_user.jpg",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "products" => Ok(Category::Products),
            "offers" => Ok(Category::Offers),
            "users" => Ok(Category::Users),
            other => Err(Error::Config(format!("Unknown category '{}'", other))),
        }
    }
}

/// Named target for a rendered variant. Declaration order is the order
/// variants are rendered, stored and swept.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Thumbnail,
    #[default]
    Medium,
    Large,
    Original,
}

impl SizeClass {
    pub fn all() -> &'static [SizeClass] {
        &[
            SizeClass::Thumbnail,
            SizeClass::Medium,
            SizeClass::Large,
            SizeClass::Original,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeClass::Thumbnail => "thumbnail",
            SizeClass::Medium => "medium",
            SizeClass::Large => "large",
            SizeClass::Original => "original",
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "thumbnail" => Ok(SizeClass::Thumbnail),
            "medium" => Ok(SizeClass::Medium),
            "large" => Ok(SizeClass::Large),
            "original" => Ok(SizeClass::Original),
            other => Err(Error::Config(format!("Unknown size class '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A size class paired with its target box; `None` means "keep as decoded".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSpec {
    pub class: SizeClass,
    pub target: Option<Dimensions>,
}

/// Immutable upload policy, built once at startup and handed to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePolicy {
    pub allowed_extensions: Vec<String>,
    pub max_file_size: usize,
    pub sizes: Vec<SizeSpec>,
    pub jpeg_quality: u8,
    pub png_compression: u8,
}

pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;
pub const DEFAULT_PNG_COMPRESSION: u8 = 6;

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: ["jpg", "jpeg", "png", "gif", "webp", "bmp"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            sizes: vec![
                SizeSpec {
                    class: SizeClass::Thumbnail,
                    target: Some(Dimensions::new(300, 300)),
                },
                SizeSpec {
                    class: SizeClass::Medium,
                    target: Some(Dimensions::new(600, 600)),
                },
                SizeSpec {
                    class: SizeClass::Large,
                    target: Some(Dimensions::new(1200, 1200)),
                },
                SizeSpec {
                    class: SizeClass::Original,
                    target: None,
                },
            ],
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            png_compression: DEFAULT_PNG_COMPRESSION,
        }
    }
}

impl ImagePolicy {
    /// Case-insensitive membership test against the allow-list.
    pub fn allows_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.allowed_extensions.iter().any(|e| *e == extension)
    }

    pub fn size_classes(&self) -> impl Iterator<Item = SizeClass> + '_ {
        self.sizes.iter().map(|s| s.class)
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub upload_root: PathBuf,
    pub policy: ImagePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut policy = ImagePolicy::default();

        if let Some(raw) = lookup("IMAGE_MAX_FILE_SIZE") {
            policy.max_file_size = raw
                .parse::<usize>()
                .map_err(|_| Error::Config(format!("Invalid IMAGE_MAX_FILE_SIZE '{}'", raw)))?;
        }

        if let Some(raw) = lookup("IMAGE_JPEG_QUALITY") {
            policy.jpeg_quality = raw
                .parse::<u8>()
                .ok()
                .filter(|q| (1..=100).contains(q))
                .ok_or_else(|| Error::Config(format!("Invalid IMAGE_JPEG_QUALITY '{}'", raw)))?;
        }

        if let Some(raw) = lookup("IMAGE_PNG_COMPRESSION") {
            policy.png_compression = raw
                .parse::<u8>()
                .ok()
                .filter(|c| *c <= 9)
                .ok_or_else(|| {
                    Error::Config(format!("Invalid IMAGE_PNG_COMPRESSION '{}'", raw))
                })?;
        }

        Ok(Self {
            upload_root: lookup("UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static/uploads")),
            policy,
        })
    }
}

/// Raw upload as received from a form: declared filename plus bytes.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub data: Vec<u8>,
}

impl UploadedImage {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    /// A form field submitted without choosing a file.
    pub fn is_empty(&self) -> bool {
        self.filename.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Encoded bytes for every size class of one image, ready to be stored.
#[derive(Debug, Clone, Default)]
pub struct RenderedVariants {
    variants: BTreeMap<SizeClass, Vec<u8>>,
}

impl RenderedVariants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: SizeClass, bytes: Vec<u8>) {
        self.variants.insert(class, bytes);
    }

    pub fn get(&self, class: SizeClass) -> Option<&[u8]> {
        self.variants.get(&class).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SizeClass, &[u8])> {
        self.variants.iter().map(|(c, b)| (*c, b.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Stored filename for every size class of one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantSet {
    files: BTreeMap<SizeClass, String>,
}

impl VariantSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: SizeClass, filename: String) {
        self.files.insert(class, filename);
    }

    pub fn get(&self, class: SizeClass) -> Option<&str> {
        self.files.get(&class).map(String::as_str)
    }

    /// The reference a record persists; every sibling derives from it.
    pub fn original(&self) -> Option<&str> {
        self.get(SizeClass::Original)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SizeClass, &str)> {
        self.files.iter().map(|(c, f)| (*c, f.as_str()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    pub is_primary: bool,
}

/// Image references owned by one product, in upload order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductGallery {
    pub images: Vec<ImageRef>,
}

impl ProductGallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reference; the first image of an empty gallery becomes primary.
    pub fn add(&mut self, filename: impl Into<String>) {
        let is_primary = self.images.is_empty();
        self.images.push(ImageRef {
            filename: filename.into(),
            is_primary,
        });
    }

    /// Flagged primary image, else the first image, else the placeholder.
    pub fn primary(&self) -> &str {
        self.images
            .iter()
            .find(|img| img.is_primary)
            .or_else(|| self.images.first())
            .map(|img| img.filename.as_str())
            .unwrap_or_else(|| Category::Products.placeholder())
    }

    /// Returns false when the gallery does not hold `filename`.
    pub fn set_primary(&mut self, filename: &str) -> bool {
        if !self.images.iter().any(|img| img.filename == filename) {
            return false;
        }
        for img in &mut self.images {
            img.is_primary = img.filename == filename;
        }
        true
    }

    pub fn remove(&mut self, filename: &str) -> Option<ImageRef> {
        let index = self.images.iter().position(|img| img.filename == filename)?;
        let removed = self.images.remove(index);
        if removed.is_primary {
            if let Some(first) = self.images.first_mut() {
                first.is_primary = true;
            }
        }
        Some(removed)
    }
}
