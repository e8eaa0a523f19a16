/// Version injected at compile time via OCI_DATASOURCE_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("OCI_DATASOURCE_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use oci_metrics_datasource::config::{Config, APP_DIR};
use oci_metrics_datasource::datasource::model::DatasourceRequest;
use oci_metrics_datasource::oci::client::OciClientFactory;
use oci_metrics_datasource::{server, OciDatasource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// OCI Monitoring datasource backend for dashboard hosts
#[derive(Parser, Debug)]
#[command(name = "oci-metrics-datasource", version = VERSION, about, long_about = None)]
struct Args {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the datasource over HTTP
    Serve {
        /// Address to bind, overrides the config file
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Run a single request read from a JSON file and print the response
    Query {
        /// Request file ("-" reads stdin)
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Write a config file with default settings
    InitConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG narrows per target; the CLI level caps everything
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(tracing_level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("oci-metrics-datasource {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(dir) = Config::app_dir() {
        return dir.join("datasource.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(format!(".{}", APP_DIR)).join("datasource.log");
    }
    PathBuf::from("datasource.log")
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn build_datasource(config: &Config) -> Arc<OciDatasource> {
    let factory = OciClientFactory::new(config.endpoints.clone(), config.http_timeout());
    Arc::new(OciDatasource::new(
        Arc::new(factory),
        config.datasource_options(),
    ))
}

fn read_request(file: &PathBuf) -> Result<DatasourceRequest> {
    let content = if file.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read request from stdin")?
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read request file {}", file.display()))?
    };
    serde_json::from_str(&content).context("Failed to parse datasource request")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    match args.command {
        Command::Serve { listen } => {
            let config = load_config(args.config.as_ref())?;
            let listen = listen.unwrap_or_else(|| config.listen.clone());
            server::serve(&listen, build_datasource(&config)).await
        },
        Command::Query { file } => {
            let config = load_config(args.config.as_ref())?;
            let request = read_request(&file)?;
            let response = build_datasource(&config).query(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        },
        Command::InitConfig => {
            let config = Config::default();
            let path = match args.config {
                Some(path) => {
                    config.save_to(&path)?;
                    path
                },
                None => config.save()?,
            };
            println!("Wrote default config to {}", path.display());
            Ok(())
        },
    }
}
