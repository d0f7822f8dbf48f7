pub mod config;
pub mod init;
pub mod logs;
pub mod pid;
pub mod run;
pub mod start;
pub mod status;
pub mod stop;

use clap::{Parser, Subcommand};

use ap_domain::Config;

/// Apiary — a daemon supervisor for a swarm of CLI-driven agents.
#[derive(Debug, Parser)]
#[command(name = "apiary", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one agent's daemon in the foreground (what `start` spawns).
    Run {
        /// Agent name from the config.
        agent: String,
    },
    /// Start agent daemons in the background.
    Start {
        /// Agent to start (all configured agents when omitted).
        agent: Option<String>,
    },
    /// Stop running agent daemons.
    Stop {
        /// Agent to stop (all configured agents when omitted).
        agent: Option<String>,
    },
    /// Show the status of all configured agents.
    Status,
    /// Print the tail of an agent's daemon log.
    Logs {
        /// Agent name from the config.
        agent: String,
        /// Number of lines to print.
        #[arg(long, default_value_t = 80)]
        lines: usize,
        /// Keep printing as new lines arrive.
        #[arg(short, long)]
        follow: bool,
    },
    /// Write a starter config file.
    Init {
        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helpers ───────────────────────────────────────────

/// The config path: `APIARY_CONFIG` when set, otherwise
/// `~/.apiary/apiary.toml`.
pub fn config_path() -> String {
    if let Ok(path) = std::env::var("APIARY_CONFIG") {
        return path;
    }
    match dirs::home_dir() {
        Some(home) => home.join(".apiary").join("apiary.toml").display().to_string(),
        None => "apiary.toml".into(),
    }
}

/// Load the configuration from [`config_path`]. A missing file yields
/// the built-in defaults (no agents). Returns the parsed [`Config`] and
/// the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = config_path();

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

/// The agents a supervisor subcommand operates on: one named agent, or
/// every configured agent in name order.
pub(crate) fn resolve_targets(config: &Config, agent: Option<&str>) -> anyhow::Result<Vec<String>> {
    match agent {
        Some(name) => {
            config.agent(name)?;
            Ok(vec![name.to_string()])
        }
        None => {
            let mut names: Vec<String> = config.agents.keys().cloned().collect();
            if names.is_empty() {
                anyhow::bail!("no agents configured; run `apiary init` and edit the config");
            }
            names.sort();
            Ok(names)
        }
    }
}
