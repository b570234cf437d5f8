mod app;
mod client;
mod commands;
mod runner;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use routerdash_core::api::DashboardApi;
use routerdash_core::config::DashConfig;
use routerdash_core::fake::FakeApi;
use routerdash_core::model::SortOrder;
use routerdash_core::session::{FileSessionStore, MemorySessionStore, SessionStore};

use app::AppContext;
use client::HttpApi;
use commands::CommandEnv;

#[derive(Parser)]
#[command(name = "routerdash")]
#[command(about = "Router signal telemetry dashboard", long_about = None)]
struct Cli {
    /// Config file (default: discover routerdash.yaml upward from the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the telemetry API base URL
    #[arg(long, global = true)]
    api: Option<String>,

    /// Use the built-in demo backend instead of the REST API
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive dashboard (default)
    Tui,
    Login {
        id: String,
        #[arg(short, long)]
        password: String,
    },
    Logout,
    /// List devices
    Devices {
        /// Include dormant devices
        #[arg(short, long)]
        all: bool,
    },
    /// Set a device alias; an empty alias clears it
    Alias { msisdn: String, alias: String },
    /// Hide a device from the dashboard without deleting its data
    Dormant {
        msisdn: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Return a dormant device to the active list
    Activate { msisdn: String },
    /// Download records for a device as CSV
    Export {
        msisdn: String,
        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value = "desc")]
        order: SortOrder,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check configuration, session, log directory and backend
    Doctor,
}

fn load_config(cli: &Cli) -> Result<(Option<PathBuf>, DashConfig)> {
    let (path, mut config) = match &cli.config {
        Some(path) => {
            let config = DashConfig::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            (Some(path.clone()), config)
        }
        None => {
            let cwd = std::env::current_dir().context("no working directory")?;
            DashConfig::discover_or_default(&cwd).context("failed to load config")?
        }
    };
    if let Some(api) = &cli.api {
        config.api.base_url = api.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok((path, config))
}

// The TUI owns stdout, so logs only go to the rolling file
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log dir {}", log_dir.display()))?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "routerdash.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();
    Ok(guard)
}

fn build_api(config: &DashConfig, demo: bool) -> Result<Arc<dyn DashboardApi>> {
    if demo {
        return Ok(Arc::new(FakeApi::new()));
    }
    let api = HttpApi::new(config.base_url(), Duration::from_millis(config.api.timeout_ms))
        .context("failed to build HTTP client")?;
    Ok(Arc::new(api))
}

fn build_session(config: &DashConfig, demo: bool) -> Arc<dyn SessionStore> {
    if demo {
        Arc::new(MemorySessionStore::default())
    } else {
        Arc::new(FileSessionStore::new(config.session_path.clone()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config_path, config) = load_config(&cli)?;
    let _guard = init_tracing(&config.log_dir)?;

    let demo = cli.demo;
    let api = build_api(&config, demo)?;
    let session = build_session(&config, demo);
    info!(backend = %api.describe(), config = ?config_path, "starting");

    let env = CommandEnv {
        config,
        config_path,
        api,
        session,
        demo,
    };

    match cli.command {
        Some(Commands::Login { id, password }) => commands::run_login(&env, &id, &password),
        Some(Commands::Logout) => commands::run_logout(&env),
        Some(Commands::Devices { all }) => commands::run_devices(&env, all).await,
        Some(Commands::Alias { msisdn, alias }) => commands::run_alias(&env, &msisdn, &alias).await,
        Some(Commands::Dormant { msisdn, yes }) => commands::run_dormant(&env, &msisdn, yes).await,
        Some(Commands::Activate { msisdn }) => commands::run_activate(&env, &msisdn).await,
        Some(Commands::Export {
            msisdn,
            start,
            end,
            order,
            output,
        }) => commands::run_export(
            &env,
            &msisdn,
            start.as_deref(),
            end.as_deref(),
            order,
            output,
        )
        .await
        .map(|_| ()),
        Some(Commands::Doctor) => commands::run_doctor(&env).await,
        Some(Commands::Tui) | None => {
            let export_dir = std::env::current_dir().context("no working directory")?;
            app::run_tui(AppContext {
                config: env.config,
                api: env.api,
                session: env.session,
                export_dir,
            })
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["routerdash", "export", "01000000001", "--order", "asc", "--demo"]);
        assert!(cli.demo);
        match cli.command {
            Some(Commands::Export { msisdn, order, .. }) => {
                assert_eq!(msisdn, "01000000001");
                assert_eq!(order, SortOrder::Asc);
            }
            _ => panic!("expected export"),
        }
        assert!(Cli::try_parse_from(["routerdash", "export", "1", "--order", "sideways"]).is_err());
    }

    #[test]
    fn test_api_flag_overrides_config() {
        let cli = Cli::parse_from([
            "routerdash",
            "--config",
            "/nonexistent/routerdash.yaml",
            "devices",
        ]);
        assert!(load_config(&cli).is_err());

        let mut cli = Cli::parse_from(["routerdash", "--api", "ftp://example.com", "doctor"]);
        cli.config = None;
        let err = load_config(&cli).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid configuration"));
    }

    #[test]
    fn test_api_flag_replaces_bad_base_url_from_file() {
        let dir = std::env::temp_dir().join(format!("routerdash-cli-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("routerdash.yaml");
        std::fs::write(&path, "api:\n  base_url: \"ftp://bad\"\n").unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        let cli = Cli::parse_from(["routerdash", "--config", path_arg.as_str(), "devices"]);
        let err = load_config(&cli).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid configuration"));

        let cli = Cli::parse_from([
            "routerdash",
            "--config",
            path_arg.as_str(),
            "--api",
            "http://127.0.0.1:9000",
            "devices",
        ]);
        let (loaded, config) = load_config(&cli).unwrap();
        assert_eq!(loaded, Some(path.clone()));
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
