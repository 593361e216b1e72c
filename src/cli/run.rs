use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use stepwise_core_types::ActionPlan;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use super::context::CliContext;
use super::output::print_result;
use crate::config::Config;
use crate::service::plan_from_str;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Plan file (JSON array or {"actionPlan": [...]}); `-` reads stdin
    #[arg(value_name = "PLAN")]
    pub plan: PathBuf,

    #[command(flatten)]
    pub browser: BrowserArgs,

    /// Delay after each successful step, in milliseconds
    #[arg(long)]
    pub pacing_ms: Option<u64>,
}

/// Browser overrides shared by the commands that drive a page.
#[derive(Args, Clone, Debug, Default)]
pub struct BrowserArgs {
    /// Attach to a running browser through its DevTools websocket
    #[arg(long, value_name = "URL")]
    pub ws_url: Option<String>,

    /// Launch a visible browser window
    #[arg(long)]
    pub headed: bool,

    /// Page to open when no tab is available
    #[arg(long, value_name = "URL")]
    pub start_url: Option<String>,
}

impl BrowserArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.ws_url {
            config.browser.websocket_url = Some(url.clone());
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(url) = &self.start_url {
            config.browser.start_url = Some(url.clone());
        }
    }
}

pub async fn read_plan(path: &Path) -> Result<ActionPlan> {
    let raw = if path.as_os_str() == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("failed to read plan from stdin")?;
        raw
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read plan file {}", path.display()))?
    };
    plan_from_str(&raw).context("invalid action plan")
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let plan = read_plan(&args.plan).await?;
    for (index, action) in plan.unsupported() {
        warn!(step = index, action, "Plan contains an unsupported action; it will be skipped");
    }

    let mut config = ctx.config().clone();
    args.browser.apply(&mut config);
    if let Some(pacing) = args.pacing_ms {
        config.engine.step_pacing_ms = pacing;
    }

    let (session, service) = ctx.start_engine(&config).await?;
    info!(entries = plan.len(), "Running plan from {}", args.plan.display());

    let outcome = tokio::select! {
        outcome = service.run_plan(plan) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; stopping run");
            service.shutdown();
            session.shutdown().await;
            bail!("run interrupted");
        }
    };
    session.shutdown().await;

    let result = outcome?;
    ctx.output().emit(&result, print_result)?;
    if !result.is_success() {
        bail!("{}", result.message());
    }
    Ok(())
}
