mod app;
mod commands;
mod config;
mod context;
mod dispatch;
mod env;
mod generate;
mod output;
mod run;
mod runtime;
mod serve;
mod validate;

pub use app::run;
pub use env::CliArgs;
