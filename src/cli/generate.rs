use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::fs;
use tracing::info;

use super::context::CliContext;
use crate::llm::build_generator;

#[derive(Args, Clone, Debug)]
pub struct GenerateArgs {
    /// Free-text instruction, e.g. "create an Account named Acme"
    #[arg(value_name = "INSTRUCTION")]
    pub instruction: String,

    /// Write the plan to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Model override
    #[arg(long)]
    pub model: Option<String>,
}

pub async fn cmd_generate(args: GenerateArgs, ctx: &CliContext) -> Result<()> {
    let mut generator_config = ctx.config().generator.clone();
    if let Some(model) = args.model {
        generator_config.model = model;
    }
    let Some(generator) =
        build_generator(&generator_config).context("failed to configure plan generator")?
    else {
        bail!("plan generation is not configured; set OPENAI_API_KEY or generator.api_keys");
    };

    let plan = generator.generate(&args.instruction).await?;
    let rendered = serde_json::to_string_pretty(&plan)?;
    match args.out {
        Some(path) => {
            fs::write(&path, &rendered)
                .await
                .with_context(|| format!("failed to write plan to {}", path.display()))?;
            info!(entries = plan.len(), "Plan written to {}", path.display());
            println!("Saved plan with {} entries to {}", plan.len(), path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
