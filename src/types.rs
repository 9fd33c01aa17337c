use crate::install::Toolchain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How one managed tool is obtained. At least one of `download_url_template`
/// and `source_repo` must be set; with both, downloads are tried first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolDefinition {
    pub binary_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
    #[serde(default)]
    pub toolchain: Toolchain,
}

impl ToolDefinition {
    pub fn can_download(&self) -> bool {
        self.download_url_template
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    pub fn can_build(&self) -> bool {
        self.source_repo.as_deref().is_some_and(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenvSettings {
    #[serde(default = "default_home_dir")]
    pub home_dir: String,
}

fn default_home_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("genv")
        .to_string_lossy()
        .to_string()
}

impl Default for GenvSettings {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GenvConfig {
    #[serde(default)]
    pub tools: BTreeMap<String, ToolDefinition>,
    #[serde(default)]
    pub settings: GenvSettings,
}
