//! Installation strategies.
//!
//! An [`Installer`] materializes one version of a tool's binary at a given
//! path. The version manager decides *whether* to install; installers only
//! know *how*:
//! - [`FetchInstaller`] downloads a pre-built artifact from a URL template
//! - [`SourceBuildInstaller`] clones a repository at a ref and compiles it
//! - [`FallbackInstaller`] tries one installer, then another, retrying semver
//!   tags with the `v` prefix toggled

#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use std::path::Path;

pub mod fallback;
pub mod fetch;
pub mod source;
pub mod template;

pub use fallback::FallbackInstaller;
pub use fetch::FetchInstaller;
pub use source::{SourceBuildInstaller, Toolchain};
pub use template::UrlTemplate;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Installer: Send + Sync {
    /// Places the executable for `version` at `dst`, creating `dst`'s parent
    /// directory if needed. Temporary workspaces are removed on both success
    /// and failure.
    async fn install(&self, version: &str, dst: &Path) -> Result<()>;

    /// Cheap, side-effect-free probe of whether this strategy's prerequisites
    /// are usable here. Advisory only.
    fn available(&self) -> bool;
}
