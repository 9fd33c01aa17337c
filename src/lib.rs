//! genv: install several versions of an externally distributed binary tool
//! side by side, pin one as current, and resolve its path.

pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod install;
pub mod lock;
pub mod manager;
pub mod platform;
pub mod profile;
pub mod types;
pub mod version;


pub use error::{GenvError, Result};
pub use install::Installer;
pub use manager::{EnvContext, VersionManager};
