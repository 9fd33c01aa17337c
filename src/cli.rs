use crate::install::Toolchain;
use clap::{Parser, Subcommand, ValueEnum};

pub fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // Release builds are tagged; report just the tag.
    if let Some(tag) = option_env!("GENV_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("GENV_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("GENV_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once, at startup.
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser)]
#[command(name = "genv")]
#[command(about = "Install, pin and run multiple versions of binary tools")]
#[command(version = get_version(), propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a version of a tool
    Install {
        /// Configured tool name (see `genv tools`)
        tool: String,
        /// Version to install, e.g. 'v1.2.3', a commit hash, or 'latest'
        #[arg(id = "target_version", value_name = "VERSION")]
        version: String,
    },

    /// Pin a version as current, or unpin when no version is given
    Use {
        tool: String,
        #[arg(id = "target_version", value_name = "VERSION")]
        version: Option<String>,
        /// Install the version first if it is missing
        #[arg(long)]
        install: bool,
    },

    /// Remove an installed version
    Uninstall {
        tool: String,
        // `--version` already belongs to every subcommand.
        #[arg(id = "target_version", value_name = "VERSION")]
        version: String,
    },

    /// List installed versions of a tool
    List { tool: String },

    /// Print the current version of a tool
    Current { tool: String },

    /// Print the path of the current binary of a tool
    Path { tool: String },

    /// Run the current binary of a tool
    #[command(
        allow_hyphen_values = true,
        disable_help_flag = true,
        disable_version_flag = true,
        after_help = "Examples:\n  genv run terraform version\n  genv -v run terraform plan -out tf.plan"
    )]
    Run {
        tool: String,
        /// Arguments passed through to the tool
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List configured tools
    Tools,

    /// Add or remove tool definitions
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },

    /// Manage genv's configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show the current version
    Version,
}

#[derive(Subcommand)]
pub enum ToolAction {
    /// Define (or redefine) a tool
    Add {
        name: String,
        /// Executable name inside each version directory
        #[arg(long)]
        binary: String,
        /// Download URL template using {{ .Version }}, {{ .Os }} and {{ .Arch }}
        #[arg(long)]
        url: Option<String>,
        /// Git repository to build from when downloading fails or no URL is set
        #[arg(long)]
        repo: Option<String>,
        /// Sub-path inside the repository to build
        #[arg(long)]
        sub_path: Option<String>,
        /// Toolchain used to build from source (go, cargo)
        #[arg(long, default_value = "go")]
        toolchain: Toolchain,
    },
    /// Remove a tool definition (installed versions are kept)
    Remove { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show full configuration
    Show {
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
    /// Set a configuration setting
    Set {
        /// Key and value (e.g., 'home-dir=/opt/genv' or 'home-dir /opt/genv')
        #[arg(trailing_var_arg = true, required = true)]
        args: Vec<String>,
    },
    /// Unset a configuration setting (restores the default)
    Unset { key: String },
}
