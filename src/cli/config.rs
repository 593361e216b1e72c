use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (API keys masked)
    Show,

    /// Print the configuration file path
    Path,

    /// Validate the configuration
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            println!("Current configuration ({}):", ctx.config_path().display());
            println!("{}", serde_yaml::to_string(&ctx.config().redacted())?);
        }
        ConfigAction::Path => println!("{}", ctx.config_path().display()),
        ConfigAction::Validate => {
            let config = ctx.config();
            config
                .workflow
                .validate()
                .context("workflow configuration is invalid")?;
            config
                .server
                .host
                .parse::<std::net::IpAddr>()
                .with_context(|| format!("invalid server host '{}'", config.server.host))?;
            println!("Configuration is valid");
            if !config.generator.is_configured() {
                println!("Note: plan generation is disabled (no API key configured)");
            }
        }
    }
    Ok(())
}
