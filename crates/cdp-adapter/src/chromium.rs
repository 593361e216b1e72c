//! Chromium backend: a page of a launched or attached browser, driven over CDP.
//!
//! Nodes are tracked in a page-side registry (`window.__stepwiseNodes`) so a handle
//! returned by a query keeps pointing at the same element across evaluations.

use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::layout::Point;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use stepwise_core_types::{LocatorCandidate, SelectorMode};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::document::{Document, DomEvent, NodeHandle, SettleSignal};
use crate::error::{AdapterError, AdapterErrorKind};

const REGISTRY_JS: &str = r#"
const reg = window.__stepwiseNodes || (window.__stepwiseNodes = {
  next: 1,
  nodes: new Map(),
  ids: new WeakMap(),
  gone: new FinalizationRegistry((id) => window.__stepwiseNodes.nodes.delete(id)),
});
const track = (el) => {
  let id = reg.ids.get(el);
  if (id === undefined) {
    id = reg.next++;
    reg.ids.set(el, id);
    reg.nodes.set(id, new WeakRef(el));
    reg.gone.register(el, id);
  }
  return id;
};
const lookup = (id) => {
  const ref = reg.nodes.get(id);
  const el = ref && ref.deref();
  if (!el || !el.isConnected) { reg.nodes.delete(id); return null; }
  return el;
};
"#;

const CLICK_PROBE_JS: &str = r#"
const r = el.getBoundingClientRect();
if (r.width <= 0 || r.height <= 0) return { rejected: 'element has no rendered box' };
const x = r.left + r.width / 2;
const y = r.top + r.height / 2;
const hit = document.elementFromPoint(x, y);
if (!hit || (hit !== el && !el.contains(hit))) {
  return { rejected: 'click point covered by ' + (hit ? hit.tagName.toLowerCase() : 'nothing') };
}
return { x, y };
"#;

const SET_VALUE_JS: &str = r#"
const v = __VALUE__;
if ('value' in el) {
  const proto = Object.getPrototypeOf(el);
  const desc = proto && Object.getOwnPropertyDescriptor(proto, 'value');
  if (desc && desc.set) { desc.set.call(el, v); } else { el.value = v; }
  return true;
}
if (el.isContentEditable) { el.textContent = v; return true; }
return false;
"#;

const SETTLE_JS: &str = r#"
return new Promise((resolve) => {
  if (typeof MutationObserver === 'undefined') { resolve('unsupported'); return; }
  let quietTimer = null;
  let ceilingTimer = null;
  const observer = new MutationObserver(() => arm());
  const finish = (signal) => {
    observer.disconnect();
    clearTimeout(quietTimer);
    clearTimeout(ceilingTimer);
    resolve(signal);
  };
  const arm = () => {
    clearTimeout(quietTimer);
    quietTimer = setTimeout(() => finish('quiet'), __QUIET__);
  };
  observer.observe(document, { subtree: true, childList: true, attributes: true, characterData: true });
  arm();
  ceilingTimer = setTimeout(() => finish('ceiling'), __CEILING__);
});
"#;

/// Browser connection plus the page plans run against.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    owned: bool,
}

impl BrowserSession {
    /// Attach to `websocket_url` when configured, otherwise launch Chromium.
    pub async fn start(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let (browser, mut handler, owned) = match &cfg.websocket_url {
            Some(url) => {
                let (browser, handler) = Browser::connect(url.clone()).await.map_err(|err| {
                    AdapterError::new(AdapterErrorKind::CdpIo)
                        .with_hint(format!("failed to connect to {url}: {err}"))
                })?;
                info!(target: "cdp-adapter", url = %url, "attached to running browser");
                (browser, handler, false)
            }
            None => {
                let (browser, handler) =
                    Browser::launch(browser_config(cfg)?).await.map_err(|err| {
                        AdapterError::new(AdapterErrorKind::CdpIo)
                            .with_hint(format!("failed to launch chromium: {err}"))
                    })?;
                info!(target: "cdp-adapter", headless = cfg.headless, "chromium launched");
                (browser, handler, true)
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "cdp-adapter", error = %err, "cdp handler event error");
                }
            }
        });

        let start_url = cfg.start_url.as_deref().unwrap_or("about:blank");
        let existing = if owned {
            None
        } else {
            browser.pages().await?.into_iter().next()
        };
        let page = match existing {
            Some(page) => page,
            None => browser.new_page(start_url).await?,
        };

        Ok(Self {
            browser,
            page,
            handler,
            owned,
        })
    }

    pub fn document(&self) -> ChromiumDocument {
        ChromiumDocument::new(self.page.clone())
    }

    /// Close a launched browser; an attached one is left running.
    pub async fn shutdown(mut self) {
        if self.owned {
            if let Err(err) = self.browser.close().await {
                warn!(target: "cdp-adapter", error = %err, "failed to close browser");
            }
            if let Some(problem) = exit_problem(self.browser.wait().await) {
                warn!(target: "cdp-adapter", "{problem}");
            }
        }
        self.handler.abort();
    }
}

fn exit_problem(exit: std::io::Result<Option<ExitStatus>>) -> Option<String> {
    match exit {
        Ok(Some(status)) if !status.success() => Some(format!("browser exited with {status}")),
        Ok(_) => None,
        Err(err) => Some(format!("failed to reap browser process: {err}")),
    }
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let profile_dir = if cfg.user_data_dir.is_absolute() {
        cfg.user_data_dir.clone()
    } else {
        let cwd = std::env::current_dir().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("failed to resolve cwd for user-data-dir: {err}"))
        })?;
        cwd.join(&cfg.user_data_dir)
    };
    std::fs::create_dir_all(&profile_dir).map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal)
            .with_hint(format!("failed to ensure user-data-dir: {err}"))
    })?;

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.request_timeout_ms))
        .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms))
        .user_data_dir(profile_dir)
        .args(vec![
            "--disable-background-networking",
            "--disable-default-apps",
            "--disable-dev-shm-usage",
            "--disable-popup-blocking",
            "--no-first-run",
            "--no-default-browser-check",
            "--remote-allow-origins=*",
        ]);

    if !cfg.headless {
        builder = builder.with_head();
    }
    if cfg.no_sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(executable) = cfg.resolve_executable() {
        builder = builder.chrome_executable(executable);
    }

    builder.build().map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal)
            .with_hint(format!("browser config error: {err}"))
    })
}

/// [`Document`] backed by a CDP page.
#[derive(Clone)]
pub struct ChromiumDocument {
    page: Page,
}

impl ChromiumDocument {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    async fn evaluate(&self, body: &str) -> Result<Value, AdapterError> {
        let expression = format!("(() => {{\n{REGISTRY_JS}\n{body}\n}})()");
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err))?;
        let result = self.page.evaluate_expression(params).await?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    /// Run `op` with `el` bound to the node; detached nodes fail with `NodeDetached`.
    async fn with_node(&self, node: NodeHandle, op: &str) -> Result<Value, AdapterError> {
        let body = format!(
            "const el = lookup({id});\nif (!el) return {{ detached: true }};\nreturn {{ ok: (() => {{\n{op}\n}})() }};",
            id = node.id()
        );
        let value = self.evaluate(&body).await?;
        if value.get("detached").and_then(Value::as_bool).unwrap_or(false) {
            return Err(AdapterError::detached().with_hint(node.to_string()));
        }
        Ok(value.get("ok").cloned().unwrap_or(Value::Null))
    }

    async fn run_query(&self, candidate: &LocatorCandidate, all: bool) -> Result<Value, AdapterError> {
        let body = format!(
            "let found;\ntry {{ found = {expr}; }} catch (e) {{ return {{ invalid: String((e && e.message) || e) }}; }}\n{ret}",
            expr = query_expression(candidate, all),
            ret = if all {
                "return { ids: found.filter((n) => n instanceof Element).map(track) };"
            } else {
                "return { id: found instanceof Element ? track(found) : null };"
            }
        );
        let value = self.evaluate(&body).await?;
        if let Some(reason) = value.get("invalid").and_then(Value::as_str) {
            return Err(AdapterError::new(AdapterErrorKind::InvalidSelector)
                .with_hint(format!("{candidate}: {reason}")));
        }
        Ok(value)
    }
}

fn js_string(raw: &str) -> String {
    Value::String(raw.to_string()).to_string()
}

fn query_expression(candidate: &LocatorCandidate, all: bool) -> String {
    let selector = js_string(&candidate.expression);
    match (candidate.mode, all) {
        (SelectorMode::Structural, false) => format!("document.querySelector({selector})"),
        (SelectorMode::Structural, true) => {
            format!("Array.from(document.querySelectorAll({selector}))")
        }
        (SelectorMode::Path, false) => format!(
            "document.evaluate({selector}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
        ),
        (SelectorMode::Path, true) => format!(
            "(() => {{ const r = document.evaluate({selector}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); return out; }})()"
        ),
    }
}

#[async_trait]
impl Document for ChromiumDocument {
    async fn query(&self, candidate: &LocatorCandidate) -> Result<Option<NodeHandle>, AdapterError> {
        let value = self.run_query(candidate, false).await?;
        Ok(value.get("id").and_then(Value::as_u64).map(NodeHandle::new))
    }

    async fn query_all(&self, candidate: &LocatorCandidate) -> Result<Vec<NodeHandle>, AdapterError> {
        let value = self.run_query(candidate, true).await?;
        Ok(value
            .get("ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_u64).map(NodeHandle::new).collect())
            .unwrap_or_default())
    }

    async fn is_attached(&self, node: NodeHandle) -> Result<bool, AdapterError> {
        let value = self
            .evaluate(&format!("return lookup({}) !== null;", node.id()))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_rendered(&self, node: NodeHandle) -> Result<bool, AdapterError> {
        let value = self
            .with_node(
                node,
                "const r = el.getBoundingClientRect(); return r.width > 0 && r.height > 0;",
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn scroll_into_view(&self, node: NodeHandle) -> Result<(), AdapterError> {
        self.with_node(
            node,
            "el.scrollIntoView({ block: 'center', inline: 'center' }); return true;",
        )
        .await?;
        Ok(())
    }

    async fn native_click(&self, node: NodeHandle) -> Result<(), AdapterError> {
        let probe = self.with_node(node, CLICK_PROBE_JS).await?;
        if let Some(reason) = probe.get("rejected").and_then(Value::as_str) {
            return Err(AdapterError::new(AdapterErrorKind::ClickRejected).with_hint(reason));
        }
        let (Some(x), Some(y)) = (
            probe.get("x").and_then(Value::as_f64),
            probe.get("y").and_then(Value::as_f64),
        ) else {
            return Err(AdapterError::new(AdapterErrorKind::ClickRejected)
                .with_hint("click point unavailable"));
        };
        self.page.click(Point { x, y }).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::ClickRejected).with_hint(err.to_string())
        })?;
        Ok(())
    }

    async fn synthetic_click(&self, node: NodeHandle) -> Result<(), AdapterError> {
        self.with_node(
            node,
            "el.dispatchEvent(new MouseEvent('click', { bubbles: true, cancelable: true, view: window, button: 0 })); return true;",
        )
        .await?;
        Ok(())
    }

    async fn focus(&self, node: NodeHandle) -> Result<(), AdapterError> {
        self.with_node(node, "el.focus(); return true;").await?;
        Ok(())
    }

    async fn set_value(&self, node: NodeHandle, value: &str) -> Result<(), AdapterError> {
        let op = SET_VALUE_JS.replace("__VALUE__", &js_string(value));
        let accepted = self.with_node(node, &op).await?;
        if accepted.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(AdapterError::new(AdapterErrorKind::Script)
                .with_hint(format!("{node} does not accept a value")))
        }
    }

    async fn dispatch_event(&self, node: NodeHandle, event: DomEvent) -> Result<(), AdapterError> {
        let op = format!(
            "el.dispatchEvent(new Event({}, {{ bubbles: true }})); return true;",
            js_string(event.name())
        );
        self.with_node(node, &op).await?;
        Ok(())
    }

    async fn tag_name(&self, node: NodeHandle) -> Result<String, AdapterError> {
        let value = self
            .with_node(node, "return el.tagName.toLowerCase();")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn text_content(&self, node: NodeHandle) -> Result<String, AdapterError> {
        let value = self.with_node(node, "return el.textContent || '';").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn wait_for_settle(
        &self,
        quiet: Duration,
        ceiling: Duration,
    ) -> Result<SettleSignal, AdapterError> {
        let body = SETTLE_JS
            .replace("__QUIET__", &quiet.as_millis().to_string())
            .replace("__CEILING__", &ceiling.as_millis().to_string());
        // The page enforces the ceiling; the outer bound covers a hung evaluation.
        let outcome =
            match tokio::time::timeout(ceiling + Duration::from_secs(2), self.evaluate(&body)).await {
                Ok(result) => result?,
                Err(_) => return Ok(SettleSignal::CeilingReached),
            };
        Ok(match outcome.as_str() {
            Some("quiet") => SettleSignal::Quiet,
            Some("ceiling") => SettleSignal::CeilingReached,
            _ => SettleSignal::Unsupported,
        })
    }
}
