//! Image upload pipeline for the storefront back office
//!
//! Validates uploaded product, offer and user images, renders a fixed set of
//! letterboxed size variants, and stores them under a naming convention that
//! lets a single stored filename stand in for the whole variant set.

pub mod error;
pub mod image;
pub mod models;
pub mod naming;
pub mod pipeline;
pub mod storage;
pub mod validator;

pub use error::{Error, Result};
