//! Imagery catalog implementations

pub mod http;
pub mod scene;

pub use http::HttpCatalog;
pub use scene::{SceneCatalog, SceneManifest};
