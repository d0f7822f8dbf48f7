use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ap_daemon::cli::{self, Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { agent } => {
            let (config, _config_path) = cli::load_config()?;
            init_tracing();
            cli::run::run(config, &agent).await
        }
        Command::Start { agent } => {
            init_cli_tracing();
            let (config, config_path) = cli::load_config()?;
            cli::start::start(&config, &config_path, agent.as_deref())
        }
        Command::Stop { agent } => {
            init_cli_tracing();
            let (config, _config_path) = cli::load_config()?;
            cli::stop::stop(&config, agent.as_deref())
        }
        Command::Status => {
            init_cli_tracing();
            let (config, config_path) = cli::load_config()?;
            cli::status::status(&config, &config_path)
        }
        Command::Logs {
            agent,
            lines,
            follow,
        } => {
            init_cli_tracing();
            let (config, _config_path) = cli::load_config()?;
            cli::logs::logs(&config, &agent, lines, follow)
        }
        Command::Init { force } => {
            init_cli_tracing();
            cli::init::init(force)
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config)
        }
        Command::Version => {
            println!("apiary {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Tracing for the daemon process. Its stdout/stderr are redirected to
/// the agent log by `start`, so everything goes to one place.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ap_daemon=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Minimal stderr tracing for one-shot supervisor commands.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
