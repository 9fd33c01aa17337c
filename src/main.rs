use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use genv::cli::{get_version, Cli, Commands, ConfigAction, OutputFormat, ToolAction};
use genv::config::{
    build_installer, build_manager, get_config_file_path, load_config, load_config_from,
    save_config_to, set_setting, unset_setting, validate_tool,
};
use genv::manager::VersionManager;
use genv::platform::Platform;
use genv::types::{GenvConfig, ToolDefinition};
use std::process::Command;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    match cli.command {
        Commands::Version => {
            println!("genv {}", get_version());
        }

        Commands::Install { tool, version } => {
            let manager = manager_for(&tool, &cancel)?;
            manager.install(&version).await?;
            println!("Installed {} {}", tool, version);
        }

        Commands::Use {
            tool,
            version,
            install,
        } => {
            let manager = manager_for(&tool, &cancel)?;
            let version = version.unwrap_or_default();
            if install && !version.is_empty() {
                manager.install(&version).await?;
            }
            manager.use_version(&version)?;
            if version.is_empty() {
                println!("{} is no longer pinned", tool);
            } else {
                println!("Using {} {}", tool, version);
            }
        }

        Commands::Uninstall { tool, version } => {
            let manager = manager_for(&tool, &cancel)?;
            manager.uninstall(&version)?;
            println!("Uninstalled {} {}", tool, version);
        }

        Commands::List { tool } => {
            let manager = manager_for(&tool, &cancel)?;
            list_installed_versions(&manager)?;
        }

        Commands::Current { tool } => {
            let manager = manager_for(&tool, &cancel)?;
            let version = manager
                .current_version()?
                .ok_or_else(|| not_pinned(&tool))?;
            println!("{}", version);
        }

        Commands::Path { tool } => {
            let manager = manager_for(&tool, &cancel)?;
            let path = manager
                .current_binary_path()?
                .ok_or_else(|| not_pinned(&tool))?;
            println!("{}", path.display());
        }

        Commands::Run { tool, args } => {
            let manager = manager_for(&tool, &cancel)?;
            let path = manager
                .current_binary_path()?
                .ok_or_else(|| not_pinned(&tool))?;
            if !path.exists() {
                bail!(
                    "{} points at {}, which no longer exists. Reinstall it or pick another version",
                    tool,
                    path.display()
                );
            }

            tracing::debug!("Executing: {:?} {:?}", path, args);
            let mut child = Command::new(&path)
                .args(&args)
                .spawn()
                .with_context(|| format!("Failed to start {}", path.display()))?;
            let status = child.wait()?;
            std::process::exit(status.code().unwrap_or(1));
        }

        Commands::Tools => {
            let config = load_config()?;
            list_configured_tools(&config, &cancel);
        }

        Commands::Tool { action } => {
            let config_path = get_config_file_path()?;
            let mut config = load_config_from(&config_path)?;
            match action {
                ToolAction::Add {
                    name,
                    binary,
                    url,
                    repo,
                    sub_path,
                    toolchain,
                } => {
                    let tool = ToolDefinition {
                        binary_name: binary,
                        download_url_template: url,
                        source_repo: repo,
                        sub_path,
                        toolchain,
                    };
                    validate_tool(&name, &tool)?;
                    if config.tools.insert(name.clone(), tool).is_some() {
                        tracing::info!("Replacing definition of {}", name);
                    }
                    save_config_to(&config, &config_path)?;
                    println!("Added {}", name);
                }
                ToolAction::Remove { name } => {
                    if config.tools.remove(&name).is_none() {
                        bail!("Tool '{}' is not configured", name);
                    }
                    save_config_to(&config, &config_path)?;
                    println!("Removed {} (installed versions were kept)", name);
                }
            }
        }

        Commands::Config { action } => {
            let config_path = get_config_file_path()?;
            match action {
                ConfigAction::Show { format } => {
                    let config = load_config()?;
                    let rendered = match format {
                        OutputFormat::Json => serde_json::to_string_pretty(&config)?,
                        OutputFormat::Yaml => serde_yaml::to_string(&config)?,
                    };
                    println!("{}", rendered);
                }
                ConfigAction::Set { args } => {
                    let (key, value) = parse_key_value(&args)?;
                    let mut config = load_config_from(&config_path)?;
                    set_setting(&mut config, &key, &value)?;
                    save_config_to(&config, &config_path)?;
                    tracing::info!("Setting '{}' updated to '{}'", key, value);
                }
                ConfigAction::Unset { key } => {
                    let mut config = load_config_from(&config_path)?;
                    unset_setting(&mut config, &key)?;
                    save_config_to(&config, &config_path)?;
                    tracing::info!("Setting '{}' unset", key);
                }
            }
        }
    }

    Ok(())
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout belongs to `current`/`path`/`run` output.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });
}

fn manager_for(tool: &str, cancel: &CancellationToken) -> Result<VersionManager> {
    let config = load_config()?;
    build_manager(&config, tool, cancel)
}

fn not_pinned(tool: &str) -> anyhow::Error {
    anyhow!(
        "No version of {} is in use. Run `genv use {} <version>` first",
        tool,
        tool
    )
}

fn parse_key_value(args: &[String]) -> Result<(String, String)> {
    match args {
        [single] => single
            .split_once('=')
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .ok_or_else(|| anyhow!("Invalid format. Use 'key=value' or 'key value'")),
        [key, rest @ ..] => Ok((key.clone(), rest.join(" "))),
        [] => bail!("Invalid format. Use 'key=value' or 'key value'"),
    }
}

fn list_installed_versions(manager: &VersionManager) -> Result<()> {
    let versions = manager.list_installed()?;
    if versions.is_empty() {
        println!("No versions of {} installed yet.", manager.name());
        return Ok(());
    }

    let current = manager.current_version()?;
    for version in versions {
        let marker = if current.as_deref() == Some(version.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}", marker, version);
    }
    Ok(())
}

fn list_configured_tools(config: &GenvConfig, cancel: &CancellationToken) {
    println!("--- Configured genv Tools ---");
    if config.tools.is_empty() {
        println!("  No tools configured yet.");
        return;
    }

    let platform = Platform::current();
    for (name, tool) in &config.tools {
        let available = match build_installer(name, tool, &platform, cancel) {
            Ok(installer) => installer.available().to_string(),
            Err(e) => format!("invalid ({})", e),
        };
        println!("  - {} [binary: {}] [installer available: {}]", name, tool.binary_name, available);
        if let Some(url) = &tool.download_url_template {
            println!("    Download: {}", url);
        }
        if let Some(repo) = &tool.source_repo {
            println!("    Source:   {} ({})", repo, tool.toolchain);
        }
        println!();
    }
    println!("-----------------------------");
}
