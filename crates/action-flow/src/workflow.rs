//! Object creation workflow
//!
//! Opens the creation form for a named object through the app launcher:
//! 1. click the launcher trigger and let the panel settle
//! 2. type the object name into the launcher search (input notification only)
//! 3. click the result link, matched by attribute or, failing that, by exact text
//! 4. click the "New" control, directly or through the overflow menu

use std::sync::Arc;
use std::time::Duration;

use action_locator::ResolvedNode;
use action_primitives::{ActionError, ActionPrimitives, ExecCtx, Notify};
use cdp_adapter::AdapterErrorKind;
use serde::{Deserialize, Serialize};
use stepwise_core_types::{SelectorMode, Target};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::{
    errors::{FlowError, WorkflowStage},
    types::{WorkflowConfig, OBJECT_PLACEHOLDER},
};

/// How the launcher result link was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultMatch {
    Attribute,
    TextScan,
}

/// How the "New" control was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationPath {
    Direct,
    Overflow,
}

/// Report of one workflow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub object: String,
    pub result_match: ResultMatch,
    /// Candidate expression that found the result link
    pub result_selector: String,
    pub creation_path: CreationPath,
    pub latency_ms: u64,
}

/// Launcher-driven object creation workflow.
pub struct ObjectWorkflow {
    primitives: Arc<dyn ActionPrimitives>,
    config: WorkflowConfig,
    launcher: Target,
    search: Target,
    scan: Target,
    new_controls: Target,
    overflow_triggers: Target,
    overflow_new_controls: Target,
}

fn target(name: &str, expressions: &[String]) -> Result<Target, FlowError> {
    Target::from_expressions(expressions.iter().cloned())
        .map_err(|err| FlowError::InvalidConfig(format!("workflow.{}: {}", name, err)))
}

/// Substitute the object name into a result-link template, quoted for the
/// template's selector syntax.
fn fill_template(template: &str, object: &str) -> String {
    match SelectorMode::infer(template) {
        SelectorMode::Structural => template.replace(OBJECT_PLACEHOLDER, &css_escape(object)),
        SelectorMode::Path => {
            let mut filled = template.to_string();
            for quote in ['\'', '"'] {
                let quoted = format!("{quote}{OBJECT_PLACEHOLDER}{quote}");
                filled = filled.replace(&quoted, &xpath_literal(object));
            }
            filled.replace(OBJECT_PLACEHOLDER, object)
        }
    }
}

fn css_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '\'' | '"') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// XPath 1.0 has no escapes; a value holding both quote kinds needs `concat()`.
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value.split('\'').map(|part| format!("'{part}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

fn stage_error(stage: WorkflowStage, object: &str, source: ActionError) -> FlowError {
    FlowError::Workflow {
        stage,
        object: object.to_string(),
        source,
    }
}

impl ObjectWorkflow {
    pub fn new(
        primitives: Arc<dyn ActionPrimitives>,
        config: WorkflowConfig,
    ) -> Result<Self, FlowError> {
        config.validate()?;
        Ok(Self {
            launcher: target("launcher_triggers", &config.launcher_triggers)?,
            search: target("search_inputs", &config.search_inputs)?,
            scan: target("result_scan", &config.result_scan)?,
            new_controls: target("new_controls", &config.new_controls)?,
            overflow_triggers: target("overflow_triggers", &config.overflow_triggers)?,
            overflow_new_controls: target("overflow_new_controls", &config.overflow_new_controls)?,
            primitives,
            config,
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Run all four stages for `object`; `timeout` bounds each element lookup of
    /// stages 1 to 3.
    pub async fn run(
        &self,
        ctx: &ExecCtx,
        object: &str,
        timeout: Duration,
    ) -> Result<WorkflowReport, FlowError> {
        let started = Instant::now();
        info!(action_id = %ctx.action_id, object, "Starting object creation workflow");

        self.open_launcher(ctx, object, timeout).await?;
        self.search(ctx, object, timeout).await?;
        let (result, result_match) = self.select_result(ctx, object, timeout).await?;
        let creation_path = self.open_creation_form(ctx, object).await?;

        let latency_ms = started.elapsed().as_millis() as u64;
        info!(
            action_id = %ctx.action_id,
            object,
            ?result_match,
            ?creation_path,
            latency_ms,
            "Object creation form opened"
        );
        Ok(WorkflowReport {
            object: object.to_string(),
            result_match,
            result_selector: result.candidate.expression,
            creation_path,
            latency_ms,
        })
    }

    async fn open_launcher(
        &self,
        ctx: &ExecCtx,
        object: &str,
        timeout: Duration,
    ) -> Result<(), FlowError> {
        let stage = WorkflowStage::OpenLauncher;
        self.primitives
            .click(ctx, &self.launcher, timeout)
            .await
            .map_err(|err| stage_error(stage, object, err))?;
        self.settle(ctx, stage, object, self.config.launcher_settle_ms)
            .await
    }

    async fn search(&self, ctx: &ExecCtx, object: &str, timeout: Duration) -> Result<(), FlowError> {
        let stage = WorkflowStage::Search;
        let input = self
            .locate(ctx, &self.search, timeout)
            .await
            .map_err(|err| stage_error(stage, object, err))?;
        self.primitives
            .fill_resolved(ctx, &input, object, Notify::Input)
            .await
            .map_err(|err| stage_error(stage, object, err))?;
        self.settle(ctx, stage, object, self.config.search_settle_ms)
            .await
    }

    async fn select_result(
        &self,
        ctx: &ExecCtx,
        object: &str,
        timeout: Duration,
    ) -> Result<(ResolvedNode, ResultMatch), FlowError> {
        let stage = WorkflowStage::SelectResult;
        let links = Target::from_expressions(
            self.config
                .result_links
                .iter()
                .map(|template| fill_template(template, object)),
        )
        .ok();
        let poll_interval = self.primitives.locator().config().poll_interval();
        let started = Instant::now();
        let deadline = started + timeout;
        let mut rounds = 0u32;

        let (resolved, result_match) = loop {
            rounds += 1;
            if let Some(links) = &links {
                match self.primitives.locator().probe(links).await {
                    Ok(Some(resolved)) => break (resolved, ResultMatch::Attribute),
                    Ok(None) => {}
                    Err(err) => return Err(stage_error(stage, object, err.into())),
                }
            }
            if let Some(resolved) = self.scan_results(object, rounds, started).await? {
                break (resolved, ResultMatch::TextScan);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(action_id = %ctx.action_id, object, rounds, "No launcher result matched");
                return Err(FlowError::ObjectLinkNotFound {
                    object: object.to_string(),
                });
            }
            tokio::select! {
                _ = sleep(poll_interval.min(deadline - now)) => {}
                _ = ctx.cancel_token.cancelled() => {
                    return Err(stage_error(
                        stage,
                        object,
                        ActionError::Interrupted("cancelled while matching results".to_string()),
                    ));
                }
            }
        };

        debug!(
            action_id = %ctx.action_id,
            object,
            ?result_match,
            selector = %resolved.candidate,
            "Launcher result matched"
        );
        self.primitives
            .click_resolved(ctx, &resolved)
            .await
            .map_err(|err| stage_error(stage, object, err))?;
        Ok((resolved, result_match))
    }

    /// One pass over the result links, comparing trimmed text exactly.
    async fn scan_results(
        &self,
        object: &str,
        rounds: u32,
        started: Instant,
    ) -> Result<Option<ResolvedNode>, FlowError> {
        let stage = WorkflowStage::SelectResult;
        let document = self.primitives.locator().document();
        let wanted = object.trim();

        for (candidate_index, candidate) in self.scan.candidates().iter().enumerate() {
            let nodes = match document.query_all(candidate).await {
                Ok(nodes) => nodes,
                Err(err) if err.is(AdapterErrorKind::InvalidSelector) => {
                    warn!(selector = %candidate, error = %err, "Skipping invalid scan selector");
                    continue;
                }
                Err(err) => {
                    return Err(stage_error(
                        stage,
                        object,
                        ActionError::document("scan", candidate.expression.clone(), err),
                    ))
                }
            };
            for node in nodes {
                match document.text_content(node).await {
                    Ok(text) if text.trim() == wanted => {
                        return Ok(Some(ResolvedNode {
                            node,
                            candidate: candidate.clone(),
                            candidate_index,
                            attempts: rounds,
                            elapsed: started.elapsed(),
                        }))
                    }
                    Ok(_) => {}
                    // Result list re-rendered between query and read
                    Err(err) if err.is(AdapterErrorKind::NodeDetached) => {}
                    Err(err) => {
                        return Err(stage_error(
                            stage,
                            object,
                            ActionError::document("scan", candidate.expression.clone(), err),
                        ))
                    }
                }
            }
        }
        Ok(None)
    }

    async fn open_creation_form(
        &self,
        ctx: &ExecCtx,
        object: &str,
    ) -> Result<CreationPath, FlowError> {
        let stage = WorkflowStage::OpenCreationForm;
        let budget = self.config.new_control_budget();
        let not_found = || FlowError::NewControlNotFound {
            object: object.to_string(),
        };

        if let Some(control) = self
            .locate_optional(ctx, stage, object, &self.new_controls, budget)
            .await?
        {
            self.primitives
                .click_resolved(ctx, &control)
                .await
                .map_err(|err| stage_error(stage, object, err))?;
            return Ok(CreationPath::Direct);
        }

        debug!(action_id = %ctx.action_id, object, "No direct 'New' control; trying overflow menu");
        let trigger = self
            .locate_optional(ctx, stage, object, &self.overflow_triggers, budget)
            .await?
            .ok_or_else(not_found)?;
        self.primitives
            .click_resolved(ctx, &trigger)
            .await
            .map_err(|err| stage_error(stage, object, err))?;
        self.settle(ctx, stage, object, self.config.overflow_settle_ms)
            .await?;

        let control = self
            .locate_optional(ctx, stage, object, &self.overflow_new_controls, budget)
            .await?
            .ok_or_else(not_found)?;
        self.primitives
            .click_resolved(ctx, &control)
            .await
            .map_err(|err| stage_error(stage, object, err))?;
        Ok(CreationPath::Overflow)
    }

    /// Locate with cancellation; a plain timeout maps to `None`.
    async fn locate_optional(
        &self,
        ctx: &ExecCtx,
        stage: WorkflowStage,
        object: &str,
        target: &Target,
        budget: Duration,
    ) -> Result<Option<ResolvedNode>, FlowError> {
        match self.locate(ctx, target, budget).await {
            Ok(resolved) => Ok(Some(resolved)),
            Err(ActionError::Locator(err)) if err.is_timeout() => Ok(None),
            Err(err) => Err(stage_error(stage, object, err)),
        }
    }

    async fn locate(
        &self,
        ctx: &ExecCtx,
        target: &Target,
        budget: Duration,
    ) -> Result<ResolvedNode, ActionError> {
        let locate = self.primitives.locator().locate(target, budget);
        tokio::select! {
            result = locate => result.map_err(ActionError::Locator),
            _ = ctx.cancel_token.cancelled() => Err(ActionError::Interrupted(format!(
                "cancelled while resolving {}",
                target
            ))),
        }
    }

    async fn settle(
        &self,
        ctx: &ExecCtx,
        stage: WorkflowStage,
        object: &str,
        duration_ms: u64,
    ) -> Result<(), FlowError> {
        self.primitives
            .settle(ctx, Duration::from_millis(duration_ms))
            .await
            .map(|_| ())
            .map_err(|err| stage_error(stage, object, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::{ElementLocator, LocatorConfig, LocatorError};
    use action_primitives::{DefaultActionPrimitives, SettlePolicy};
    use cdp_adapter::memory::{Interaction, MemoryDocument, NodeSpec};
    use cdp_adapter::DomEvent;

    const LAUNCHER: &str = "div.appLauncher button";
    const SEARCH: &str = "one-app-launcher-menu input[type='search']";
    const OVERFLOW: &str = "button[title='Show more actions']";
    const OVERFLOW_NEW: &str = "lightning-menu-item a[title='New']";
    const DIRECT_NEW: &str = "a[title='New']";

    fn workflow(doc: MemoryDocument) -> (Arc<MemoryDocument>, ObjectWorkflow) {
        let doc = Arc::new(doc);
        let locator = ElementLocator::new(doc.clone(), LocatorConfig::default());
        let primitives = Arc::new(DefaultActionPrimitives::new(locator, SettlePolicy::Fixed));
        let workflow = ObjectWorkflow::new(primitives, WorkflowConfig::default()).unwrap();
        (doc, workflow)
    }

    fn launcher_and_search() -> MemoryDocument {
        MemoryDocument::new()
            .with_node(NodeSpec::new(LAUNCHER).tag("button"))
            .with_node(NodeSpec::new(SEARCH).tag("input").revealed_by(LAUNCHER))
    }

    #[tokio::test(start_paused = true)]
    async fn attribute_match_and_direct_new_control() {
        let doc = launcher_and_search()
            .with_node(
                NodeSpec::new("a[data-label='Account']")
                    .tag("a")
                    .text("Account")
                    .revealed_by(LAUNCHER),
            )
            .with_node(NodeSpec::new(DIRECT_NEW).tag("a").revealed_by("a[data-label='Account']"))
            .with_node(NodeSpec::new(OVERFLOW).tag("button"));
        let (doc, workflow) = workflow(doc);

        let report = workflow
            .run(&ExecCtx::default(), "Account", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(report.result_match, ResultMatch::Attribute);
        assert_eq!(report.result_selector, "a[data-label='Account']");
        assert_eq!(report.creation_path, CreationPath::Direct);
        assert_eq!(doc.clicks(LAUNCHER), 1);
        assert_eq!(doc.clicks("a[data-label='Account']"), 1);
        assert_eq!(doc.clicks(DIRECT_NEW), 1);
        assert_eq!(doc.clicks(OVERFLOW), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn text_scan_fallback_and_overflow_menu() {
        let doc = launcher_and_search()
            .with_node(
                NodeSpec::new("#link-invoices")
                    .also("one-app-launcher-menu-item a")
                    .text("Invoices")
                    .revealed_by(LAUNCHER),
            )
            .with_node(
                NodeSpec::new("#link-invoice")
                    .also("one-app-launcher-menu-item a")
                    .text("  Invoice \n")
                    .revealed_by(LAUNCHER),
            )
            .with_node(NodeSpec::new(OVERFLOW).tag("button").revealed_by("#link-invoice"))
            .with_node(NodeSpec::new(OVERFLOW_NEW).tag("a").revealed_by(OVERFLOW));
        let (doc, workflow) = workflow(doc);

        let report = workflow
            .run(&ExecCtx::default(), "Invoice", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(report.result_match, ResultMatch::TextScan);
        assert_eq!(report.result_selector, "one-app-launcher-menu-item a");
        assert_eq!(report.creation_path, CreationPath::Overflow);
        assert_eq!(doc.clicks("#link-invoices"), 0);
        assert_eq!(doc.clicks("#link-invoice"), 1);
        assert_eq!(doc.clicks(OVERFLOW), 1);
        assert_eq!(doc.clicks(OVERFLOW_NEW), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn search_emits_input_notification_only() {
        let doc = launcher_and_search()
            .with_node(NodeSpec::new("a[data-label='Case']").revealed_by(LAUNCHER))
            .with_node(NodeSpec::new(DIRECT_NEW).revealed_by("a[data-label='Case']"));
        let (doc, workflow) = workflow(doc);

        workflow
            .run(&ExecCtx::default(), "Case", Duration::from_secs(10))
            .await
            .unwrap();

        let interactions = doc.interactions(SEARCH);
        assert!(interactions.contains(&Interaction::SetValue("Case".to_string())));
        assert!(interactions.contains(&Interaction::Event(DomEvent::Input)));
        assert!(!interactions.contains(&Interaction::Event(DomEvent::Change)));
        assert_eq!(doc.value_of(SEARCH).as_deref(), Some("Case"));
    }

    #[tokio::test(start_paused = true)]
    async fn unmatched_object_fails_after_timeout() {
        let doc = launcher_and_search().with_node(
            NodeSpec::new("one-app-launcher-menu-item a")
                .text("Contacts")
                .revealed_by(LAUNCHER),
        );
        let (doc, workflow) = workflow(doc);
        let started = Instant::now();

        let err = workflow
            .run(&ExecCtx::default(), "Contact", Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::ObjectLinkNotFound { ref object } if object == "Contact"));
        assert_eq!(doc.clicks("one-app-launcher-menu-item a"), 0);
        // launcher settle + search settle + result budget
        assert_eq!(started.elapsed(), Duration::from_millis(2_000 + 1_500 + 2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_new_control_is_reported() {
        let doc = launcher_and_search()
            .with_node(NodeSpec::new("a[data-label='Lead']").revealed_by(LAUNCHER));
        let (_doc, workflow) = workflow(doc);

        let err = workflow
            .run(&ExecCtx::default(), "Lead", Duration::from_secs(10))
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::NewControlNotFound { ref object } if object == "Lead"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_launcher_fails_first_stage() {
        let (doc, workflow) = workflow(MemoryDocument::new());

        let err = workflow
            .run(&ExecCtx::default(), "Account", Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FlowError::Workflow {
                stage: WorkflowStage::OpenLauncher,
                source: ActionError::Locator(LocatorError::ElementNotFound { .. }),
                ..
            }
        ));
        assert!(doc.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn quoted_object_name_matches_by_attribute() {
        let link = r"a[data-label='O\'Brien Ltd']";
        let doc = launcher_and_search()
            .with_node(NodeSpec::new(link).tag("a").revealed_by(LAUNCHER))
            .with_node(NodeSpec::new(DIRECT_NEW).tag("a").revealed_by(link));
        let (doc, workflow) = workflow(doc);

        let report = workflow
            .run(&ExecCtx::default(), "O'Brien Ltd", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(report.result_match, ResultMatch::Attribute);
        assert_eq!(report.result_selector, link);
        assert_eq!(doc.clicks(DIRECT_NEW), 1);
    }

    #[test]
    fn templates_quote_object_names() {
        assert_eq!(
            fill_template("a[title='{object}']", r#"O'Brien "Co""#),
            r#"a[title='O\'Brien \"Co\"']"#
        );
        assert_eq!(
            fill_template("//a[@title='{object}']", "O'Brien"),
            r#"//a[@title="O'Brien"]"#
        );
        assert_eq!(
            fill_template("//a[text()='{object}']", r#"O'Brien "Co""#),
            r#"//a[text()=concat('O', "'", 'Brien "Co"')]"#
        );
        assert_eq!(fill_template("a[data-label='{object}']", "Account"), "a[data-label='Account']");
    }

    #[test]
    fn rejects_invalid_config() {
        let doc: Arc<MemoryDocument> = Arc::new(MemoryDocument::new());
        let locator = ElementLocator::new(doc, LocatorConfig::default());
        let primitives = Arc::new(DefaultActionPrimitives::new(locator, SettlePolicy::Fixed));
        let config = WorkflowConfig {
            launcher_triggers: Vec::new(),
            ..WorkflowConfig::default()
        };
        assert!(matches!(
            ObjectWorkflow::new(primitives, config),
            Err(FlowError::InvalidConfig(_))
        ));
    }
}
