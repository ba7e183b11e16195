//! Upload admissibility checks
//!
//! Only the declared extension and the byte length are inspected here.
//! Whether the bytes really are an image is left to the decoder.

use crate::models::ImagePolicy;
use crate::naming;
use crate::{Error, Result};

pub struct UploadValidator<'a> {
    policy: &'a ImagePolicy,
}

impl<'a> UploadValidator<'a> {
    pub fn new(policy: &'a ImagePolicy) -> Self {
        Self { policy }
    }

    /// Extension first, then size, so a bad file type is reported even when
    /// the file is also oversized.
    pub fn validate(&self, filename: &str, size: usize) -> Result<()> {
        self.validate_extension(filename)?;
        self.validate_size(size)
    }

    pub fn validate_extension(&self, filename: &str) -> Result<()> {
        match naming::extension(filename) {
            Some(ext) if self.policy.allows_extension(&ext) => Ok(()),
            _ => Err(Error::UnsupportedFormat {
                filename: naming::sanitize_filename(filename),
            }),
        }
    }

    pub fn validate_size(&self, size: usize) -> Result<()> {
        if size > self.policy.max_file_size {
            return Err(Error::FileTooLarge {
                size,
                max: self.policy.max_file_size,
            });
        }
        Ok(())
    }
}
