use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Args};
use netapi_session::{ConnectionOptions, PlatformRegistry, SessionConnection};
use netapi_transport::UreqTransport;
use tracing_subscriber::EnvFilter;

#[derive(Args)]
pub struct CommonArgs {
    /// Connection options file (YAML); `NETAPI_*` variables override it
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,
    /// Raise log verbosity (-v debug, -vv trace); `RUST_LOG` wins when set
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

impl CommonArgs {
    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    }

    pub fn load_options(&self) -> anyhow::Result<ConnectionOptions> {
        let options =
            ConnectionOptions::load(self.config.as_deref()).with_context(|| match &self.config {
                Some(path) => format!("loading connection options from {}", path.display()),
                None => "loading connection options from the environment".to_owned(),
            })?;
        tracing::debug!(endpoint = %options.endpoint(), "connection options loaded");
        Ok(options)
    }
}

/// A session over the blocking HTTP transport with the built-in platforms.
pub fn build_connection(options: ConnectionOptions) -> SessionConnection {
    let transport = UreqTransport::new().with_max_body_bytes(options.max_body_bytes);
    SessionConnection::new(
        options,
        Arc::new(PlatformRegistry::with_builtin()),
        Arc::new(transport),
    )
}
