//! Services which implement the core logic behind the routes.
pub mod codec;
pub mod derivatives;
pub mod files;
pub mod media;
pub mod paths;
pub mod stats;
pub mod uploads;
