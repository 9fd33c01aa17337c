use crate::install::{FallbackInstaller, FetchInstaller, Installer, SourceBuildInstaller, UrlTemplate};
use crate::manager::{EnvContext, VersionManager};
use crate::platform::Platform;
use crate::types::*;
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub const APP_NAME: &str = "genv";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const CONFIG_ENV: &str = "GENV_CONFIG";
pub const HOME_ENV: &str = "GENV_HOME";

/// Settings that `config set`/`config unset` accept, in normalized form.
pub const SETTING_KEYS: &[&str] = &["home_dir"];

pub fn get_user_config_dir() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join(APP_NAME);
    Ok(path)
}

pub fn get_config_file_path() -> Result<PathBuf> {
    let path = match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => get_user_config_dir()?.join(CONFIG_FILE_NAME),
    };
    tracing::debug!("Config file path: {}", path.display());
    Ok(path)
}

pub fn load_config() -> Result<GenvConfig> {
    let mut config = load_config_from(&get_config_file_path()?)?;
    apply_env_overrides(&mut config, std::env::var(HOME_ENV).ok());
    Ok(config)
}

pub fn load_config_from(config_path: &Path) -> Result<GenvConfig> {
    if !config_path.exists() {
        return Ok(GenvConfig::default());
    }

    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Could not read config file at {}", config_path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Could not parse config file {} as JSON", config_path.display()))
}

pub fn apply_env_overrides(config: &mut GenvConfig, home_dir: Option<String>) {
    if let Some(home_dir) = home_dir.filter(|h| !h.is_empty()) {
        tracing::debug!("Using {}={}", HOME_ENV, home_dir);
        config.settings.home_dir = home_dir;
    }
}

pub fn save_config(config: &GenvConfig) -> Result<()> {
    save_config_to(config, &get_config_file_path()?)
}

pub fn save_config_to(config: &GenvConfig, config_path: &Path) -> Result<()> {
    let config_dir = config_path
        .parent()
        .ok_or_else(|| anyhow!("Invalid config path"))?;

    fs::create_dir_all(config_dir)?;

    let content = serde_json::to_string_pretty(config)?;
    fs::write(config_path, content)
        .with_context(|| format!("Could not write config file at {}", config_path.display()))?;

    Ok(())
}

pub fn normalize_key(key: &str) -> String {
    key.replace('-', "_")
        .chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                format!("_{}", c.to_lowercase())
            } else {
                c.to_string()
            }
        })
        .collect::<String>()
        .to_lowercase()
}

pub fn set_setting(config: &mut GenvConfig, key: &str, value: &str) -> Result<()> {
    match normalize_key(key).as_str() {
        "home_dir" => {
            if value.is_empty() {
                bail!("home_dir cannot be empty");
            }
            config.settings.home_dir = value.to_string();
        }
        other => bail!(
            "'{}' is not a valid configuration setting. Valid settings: {}",
            other,
            SETTING_KEYS.join(", ")
        ),
    }
    Ok(())
}

pub fn unset_setting(config: &mut GenvConfig, key: &str) -> Result<()> {
    match normalize_key(key).as_str() {
        "home_dir" => config.settings.home_dir = GenvSettings::default().home_dir,
        other => bail!(
            "'{}' is not a valid configuration setting. Valid settings: {}",
            other,
            SETTING_KEYS.join(", ")
        ),
    }
    Ok(())
}

/// Tool names become directory names under the home dir.
pub fn validate_tool(name: &str, tool: &ToolDefinition) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        bail!("Invalid tool name '{}'", name);
    }
    if tool.binary_name.is_empty() || tool.binary_name.contains(['/', '\\']) {
        bail!("Invalid binary name '{}' for {}", tool.binary_name, name);
    }
    if !tool.can_download() && !tool.can_build() {
        bail!(
            "Tool {} needs a download URL template, a source repository, or both",
            name
        );
    }
    if let Some(template) = tool.download_url_template.as_deref().filter(|t| !t.is_empty()) {
        UrlTemplate::parse(template)?;
    }
    Ok(())
}

/// Download first, then build from source, when both are configured.
pub fn build_installer(
    name: &str,
    tool: &ToolDefinition,
    platform: &Platform,
    cancel: &CancellationToken,
) -> Result<Box<dyn Installer>> {
    validate_tool(name, tool)?;

    let fetch = match tool.download_url_template.as_deref().filter(|t| !t.is_empty()) {
        Some(template) => Some(
            FetchInstaller::new(template, platform.clone(), cancel.clone())
                .with_context(|| format!("Invalid download configuration for {}", name))?,
        ),
        None => None,
    };
    let source = tool
        .source_repo
        .as_deref()
        .filter(|r| !r.is_empty())
        .map(|repo| {
            SourceBuildInstaller::new(
                repo,
                tool.binary_name.as_str(),
                tool.sub_path.clone(),
                tool.toolchain,
                cancel.clone(),
            )
        });

    let installer: Box<dyn Installer> = match (fetch, source) {
        (Some(fetch), Some(source)) => {
            Box::new(FallbackInstaller::new(Box::new(fetch), Box::new(source)))
        }
        (Some(fetch), None) => Box::new(fetch),
        (None, Some(source)) => Box::new(source),
        (None, None) => bail!("Tool {} has no installer configured", name),
    };
    Ok(installer)
}

pub fn build_manager(
    config: &GenvConfig,
    name: &str,
    cancel: &CancellationToken,
) -> Result<VersionManager> {
    let tool = config.tools.get(name).ok_or_else(|| {
        anyhow!(
            "Tool '{}' is not configured. Add it with `genv tool add {} --binary <name> --url <template>`",
            name,
            name
        )
    })?;

    let ctx = EnvContext::current(&config.settings.home_dir);
    let installer = build_installer(name, tool, &ctx.platform, cancel)?;
    Ok(VersionManager::new(
        ctx,
        name,
        tool.binary_name.as_str(),
        installer,
    ))
}
