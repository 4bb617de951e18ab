use std::time::Duration;

use anyhow::Context;
use clap::Args;
use netapi_session::ConnectionOptions;

use crate::common::{CommonArgs, build_connection};

#[derive(Args)]
pub struct ProbeArgs {
    /// Seconds to wait for the device; `connect_timeout` from the options when omitted
    #[arg(short = 't', long)]
    timeout: Option<u64>,
}

impl ProbeArgs {
    pub fn run(&self, common: &CommonArgs) -> anyhow::Result<()> {
        let options = common.load_options()?;
        let timeout = self.timeout(&options);
        let connection = build_connection(options);
        let url = connection.base_url();

        let meta = connection
            .probe_reachability(timeout)
            .with_context(|| format!("{url} is not reachable"))?;

        tracing::info!(url = %meta.url, status = meta.status.as_u16(), "device reachable");
        eprintln!("{} {}", meta.status, meta.url);
        Ok(())
    }

    fn timeout(&self, options: &ConnectionOptions) -> Duration {
        self.timeout
            .map_or(options.connect_timeout, Duration::from_secs)
    }
}
