mod builder;
pub mod cache;
pub mod document;
pub mod feed;
pub mod item;
pub mod markdown;
pub mod paths;
pub mod pipeline;
pub mod render;

pub use builder::{BuildResult, Builder, clean};
pub use paths::base_path_from_config;
