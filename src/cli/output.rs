use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use stepwise_core_types::ExecutionResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    /// Print `value` as pretty JSON, or through `human` otherwise.
    pub fn emit<T, F>(&self, value: &T, human: F) -> Result<()>
    where
        T: Serialize,
        F: FnOnce(&T),
    {
        match self {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Human => human(value),
        }
        Ok(())
    }
}

pub fn print_result(result: &ExecutionResult) {
    match result {
        ExecutionResult::Success {
            summary,
            steps_executed,
        } => {
            println!("✔ Plan completed ({} steps executed)", steps_executed);
            println!("  {}", summary);
        }
        ExecutionResult::Failure {
            step_index,
            message,
        } => {
            println!("✘ Plan failed at step {}", step_index);
            println!("  {}", message);
        }
    }
}
