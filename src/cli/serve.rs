use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::context::CliContext;
use super::run::BrowserArgs;
use crate::server::{serve, ServeState};

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

pub async fn cmd_serve(args: ServeArgs, ctx: &CliContext) -> Result<()> {
    let mut config = ctx.config().clone();
    args.browser.apply(&mut config);

    let host = match args.host {
        Some(host) => host,
        None => config
            .server
            .host
            .parse()
            .with_context(|| format!("invalid server host '{}'", config.server.host))?,
    };
    let addr = SocketAddr::new(host, args.port.unwrap_or(config.server.port));

    let (session, service) = ctx.start_engine(&config).await?;
    info!(
        generator = service.has_generator(),
        "Engine attached to browser; starting plan server"
    );
    let state = ServeState::new(Arc::new(service));

    let result = serve(state, addr, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;
    session.shutdown().await;
    result
}
