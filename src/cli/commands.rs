use clap::Subcommand;

use super::config::ConfigArgs;
use super::generate::GenerateArgs;
use super::run::RunArgs;
use super::serve::ServeArgs;
use super::validate::ValidateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Execute an action plan against the configured browser
    Run(RunArgs),

    /// Decode an action plan and report what would run
    Validate(ValidateArgs),

    /// Generate an action plan from a free-text instruction
    Generate(GenerateArgs),

    /// Serve the plan endpoints over HTTP
    Serve(ServeArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),
}
