//! Configuration loading and schema definitions
//!
//! Settings consumed by the image pipeline, external tools and the container codec.

mod loader;
mod schema;

pub use loader::Config;
pub use schema::*;
