//! Filename conventions for stored variants
//!
//! A record keeps only the "original" filename. Every sibling variant is
//! derived from it by suffixing the size class onto the stem, so resolving
//! and deleting never need a manifest.

use crate::models::{Category, SizeClass};
use crate::{Error, Result};
use uuid::Uuid;

/// Lower-cased substring after the last `.`, if there is one.
pub fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Fresh `<32 hex chars>.<ext>` name for an upload.
///
/// Nothing from the original name survives except its lower-cased extension.
pub fn generate_unique_filename(original_filename: &str) -> Result<String> {
    let ext = extension(original_filename).ok_or_else(|| Error::UnsupportedFormat {
        filename: sanitize_filename(original_filename),
    })?;
    Ok(format!("{}.{}", Uuid::new_v4().simple(), ext))
}

/// Stored filename of `class` for an image whose original is `filename`.
pub fn variant_filename(filename: &str, class: SizeClass) -> String {
    if class == SizeClass::Original {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, class, ext.to_ascii_lowercase()),
        None => format!("{}_{}", filename, class),
    }
}

/// Whether `filename` is one of the per-category "no image" placeholders.
pub fn is_placeholder(filename: &str) -> bool {
    Category::all().iter().any(|c| c.placeholder() == filename)
}

/// Relative URL of a variant, or `None` when the record has no image.
///
/// Pure naming: the file is not checked on disk.
pub fn resolve(filename: &str, category: Category, size: SizeClass) -> Option<String> {
    if filename.is_empty() || is_placeholder(filename) {
        return None;
    }
    Some(format!(
        "uploads/{}/{}",
        category,
        variant_filename(filename, size)
    ))
}

/// Client-supplied filename reduced to something safe to log.
pub fn sanitize_filename(filename: &str) -> String {
    let last = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    cleaned.trim_start_matches(['.', '_']).to_string()
}
