use std::io::{self, Write};

use anyhow::Context;
use bytes::Bytes;
use clap::Args;
use http::{HeaderName, HeaderValue, Method};
use netapi_session::SendOptions;

use crate::common::{CommonArgs, build_connection};

#[derive(Args)]
pub struct SendArgs {
    /// Request path, e.g. `/restconf/data/ietf-interfaces:interfaces`
    path: String,
    /// Request body; the method defaults to POST when set
    #[arg(short = 'd', long)]
    data: Option<String>,
    /// HTTP method override
    #[arg(short = 'X', long)]
    method: Option<Method>,
    /// Retry budget for recoverable errors; unbounded when omitted
    #[arg(short = 'r', long)]
    retries: Option<u32>,
    /// Extra request header as `Name: value`, repeatable
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(HeaderName, HeaderValue)>,
    /// Platform identifier, overrides `network_os` from the options
    #[arg(short = 'p', long)]
    platform: Option<String>,
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{raw}`"))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| e.to_string())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|e| e.to_string())?;
    Ok((name, value))
}

impl SendArgs {
    pub fn run(&self, common: &CommonArgs) -> anyhow::Result<()> {
        let mut options = common.load_options()?;
        if let Some(platform) = &self.platform {
            options.network_os = Some(platform.clone());
        }

        let mut send_options = SendOptions::new();
        if let Some(method) = &self.method {
            send_options = send_options.with_method(method.clone());
        }
        for (name, value) in &self.headers {
            send_options = send_options.with_header(name.clone(), value.clone());
        }
        let body = self.data.clone().map(Bytes::from);

        let mut connection = build_connection(options);
        let result = connection.send(&self.path, body, self.retries, &send_options);
        connection.close();
        let (meta, mut reply) = result.with_context(|| format!("sending {}", self.path))?;

        eprintln!("{} {}", meta.status, meta.url);
        let mut stdout = io::stdout().lock();
        io::copy(&mut reply, &mut stdout).context("writing response body")?;
        stdout.flush().context("writing response body")?;
        Ok(())
    }
}
