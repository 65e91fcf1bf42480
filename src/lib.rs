// lib.rs: 全景球体查看器的视角 / 投影引擎

pub mod config;
pub mod error;
pub mod input;
pub mod media;
pub mod orientation;
pub mod projection;
pub mod render_loop;
pub mod scene;
pub mod viewer;
pub mod viewport;

pub use config::ViewerConfig;
pub use error::ViewerError;
pub use viewer::Viewer;
