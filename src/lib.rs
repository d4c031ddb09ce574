//! Rename Docker image archives in place.
//!
//! An image archive, as written by `docker save`, is a plain tar holding one
//! directory per layer (each with a `json` config carrying its creation
//! time) and an optional top-level `repositories` file mapping an image
//! name to its tags. [`Image::set_name`] rewrites that mapping under an
//! exclusive cross-process lock and repacks the archive.

pub mod archive;
mod config;
mod error;
pub mod image;
pub mod layer;
pub mod lock;
pub mod repositories;
pub mod workdir;

pub use config::Config;
pub use error::{Error, Result};
pub use image::Image;
pub use layer::Layer;
pub use repositories::Repositories;
