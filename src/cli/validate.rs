use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use stepwise_core_types::PlanEntry;

use super::context::CliContext;
use super::run::read_plan;

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Plan file (JSON array or {"actionPlan": [...]}); `-` reads stdin
    #[arg(value_name = "PLAN")]
    pub plan: PathBuf,
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    entries: usize,
    steps: Vec<String>,
    unsupported: Vec<UnsupportedEntry>,
}

#[derive(Debug, Serialize)]
struct UnsupportedEntry {
    index: usize,
    action: String,
}

pub async fn cmd_validate(args: ValidateArgs, ctx: &CliContext) -> Result<()> {
    let plan = read_plan(&args.plan).await?;
    let report = ValidationReport {
        entries: plan.len(),
        steps: plan
            .entries()
            .iter()
            .enumerate()
            .map(|(offset, entry)| match entry {
                PlanEntry::Step(step) => format!("{}. {}", offset + 1, step.describe()),
                PlanEntry::Unsupported { action } => {
                    format!("{}. (skipped) {}", offset + 1, action)
                }
            })
            .collect(),
        unsupported: plan
            .unsupported()
            .map(|(index, action)| UnsupportedEntry {
                index,
                action: action.to_string(),
            })
            .collect(),
    };

    ctx.output().emit(&report, |report| {
        println!("Plan is valid: {} entries", report.entries);
        for line in &report.steps {
            println!("  {}", line);
        }
        if !report.unsupported.is_empty() {
            println!(
                "{} unsupported action(s) will be skipped",
                report.unsupported.len()
            );
        }
    })
}
