//! Integration server binary.
//!
//! ```text
//! daq_integration --backend-url http://backend:8080 --writer-url http://writer:8083
//! daq_integration --mock --port 10001
//! ```

use clap::Parser;
use daq_integration::{
    api,
    clients::{
        BackendRestClient, CallJournal, DetectorCliClient, MockBackendClient, MockDetectorClient,
        MockWriterClient, WriterRestClient,
    },
    config::{ServerConfig, DEFAULT_CONFIG_PATH},
    logging,
    validation::CsaxsEiger9mValidator,
    AppResult, IntegrationManager,
};
use figment::providers::Serialized;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// REST API coordinating detector, writer and backend.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Hostname interface to bind to
    #[arg(short, long)]
    interface: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level to use
    #[arg(long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// Backend REST API url
    #[arg(short, long)]
    backend_url: Option<String>,

    /// Writer REST API url
    #[arg(short, long)]
    writer_url: Option<String>,

    /// Writer instance name
    #[arg(long)]
    writer_instance: Option<String>,

    /// Serve against in-process mock subsystems
    #[arg(long)]
    mock: bool,

    /// Also expose the /debug routes
    #[arg(long)]
    debug_routes: bool,
}

impl Cli {
    fn load_config(&self) -> AppResult<ServerConfig> {
        let mut figment = ServerConfig::figment(&self.config);

        let strings = [
            ("server.interface", &self.interface),
            ("logging.level", &self.log_level),
            ("backend.url", &self.backend_url),
            ("writer.url", &self.writer_url),
            ("writer.instance_name", &self.writer_instance),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                figment = figment.merge(Serialized::default(key, value));
            }
        }
        if let Some(port) = self.port {
            figment = figment.merge(Serialized::default("server.port", port));
        }

        Ok(ServerConfig::from_figment(figment)?)
    }
}

fn build_manager(config: &ServerConfig, mock: bool) -> anyhow::Result<IntegrationManager> {
    let validator = Arc::new(CsaxsEiger9mValidator);

    if mock {
        let journal = CallJournal::new();
        return Ok(IntegrationManager::new(
            Arc::new(MockBackendClient::new(journal.clone())),
            Arc::new(MockWriterClient::new(journal.clone())),
            Arc::new(MockDetectorClient::new(journal)),
            validator,
        ));
    }

    let timeout = config.client.timeout();
    let backend = BackendRestClient::new(&config.backend.url, timeout)?;
    let writer = WriterRestClient::new(&config.writer.url, &config.writer.instance_name, timeout)?;
    let detector = DetectorCliClient::new(
        config.detector.get_command.clone(),
        config.detector.put_command.clone(),
    );

    Ok(IntegrationManager::new(
        Arc::new(backend),
        Arc::new(writer),
        Arc::new(detector),
        validator,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    logging::init(&config.logging)?;

    info!(
        backend_url = %config.backend.url,
        writer_url = %config.writer.url,
        mock = cli.mock,
        "Starting integration REST API"
    );

    let manager = Arc::new(build_manager(&config, cli.mock)?);
    api::serve(manager, &config.bind_address(), cli.debug_routes).await?;
    Ok(())
}
