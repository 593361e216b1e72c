use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cdp_adapter::{BrowserSession, Document};

use super::output::OutputFormat;
use crate::config::Config;
use crate::llm::build_generator;
use crate::service::EngineService;

pub struct CliContext {
    config: Config,
    config_path: PathBuf,
    output: OutputFormat,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf, output: OutputFormat) -> Self {
        Self {
            config,
            config_path,
            output,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    /// Attach to (or launch) the browser and wire an engine service to its page.
    pub async fn start_engine(&self, config: &Config) -> Result<(BrowserSession, EngineService)> {
        let session = BrowserSession::start(&config.browser)
            .await
            .context("failed to start browser session")?;
        let document: Arc<dyn Document> = Arc::new(session.document());
        let generator =
            build_generator(&config.generator).context("failed to configure plan generator")?;
        let service = EngineService::new(document, config)
            .context("invalid engine configuration")?
            .with_generator(generator);
        Ok((session, service))
    }
}
