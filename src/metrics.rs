use action_flow::{FlowError, PlanReport, RunObserver, SkippedEntry, StepRecord};
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{
    histogram_opts, Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::error;

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();
static PLAN_RUNS: OnceCell<IntCounterVec> = OnceCell::new();
static STEPS_EXECUTED: OnceCell<IntCounterVec> = OnceCell::new();
static STEP_LATENCY: OnceCell<HistogramVec> = OnceCell::new();
static UNSUPPORTED_ACTIONS: OnceCell<IntCounter> = OnceCell::new();
static PLAN_GENERATIONS: OnceCell<IntCounterVec> = OnceCell::new();

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        register_run_metrics(registry);
        register_generation_metrics(registry);
    });
}

fn register<M>(
    registry: &Registry,
    cell: &OnceCell<M>,
    name: &str,
    metric: Result<M, prometheus::Error>,
) where
    M: prometheus::core::Collector + Clone + 'static,
{
    match metric {
        Ok(metric) => {
            if let Err(err) = registry.register(Box::new(metric.clone())) {
                error!(?err, metric = name, "failed to register metric");
            }
            let _ = cell.set(metric);
        }
        Err(err) => error!(?err, metric = name, "failed to create metric"),
    }
}

fn register_run_metrics(registry: &Registry) {
    register(
        registry,
        &PLAN_RUNS,
        "stepwise_plan_runs_total",
        IntCounterVec::new(
            Opts::new("stepwise_plan_runs_total", "Plan runs by outcome"),
            &["result"],
        ),
    );
    register(
        registry,
        &STEPS_EXECUTED,
        "stepwise_steps_executed_total",
        IntCounterVec::new(
            Opts::new("stepwise_steps_executed_total", "Successfully executed steps by kind"),
            &["kind"],
        ),
    );
    register(
        registry,
        &STEP_LATENCY,
        "stepwise_step_latency_ms",
        HistogramVec::new(
            histogram_opts!(
                "stepwise_step_latency_ms",
                "Latency of successful steps (milliseconds)",
                vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 30000.0]
            ),
            &["kind"],
        ),
    );
    register(
        registry,
        &UNSUPPORTED_ACTIONS,
        "stepwise_unsupported_actions_total",
        IntCounter::new(
            "stepwise_unsupported_actions_total",
            "Plan entries skipped because their action is unknown",
        ),
    );
}

fn register_generation_metrics(registry: &Registry) {
    register(
        registry,
        &PLAN_GENERATIONS,
        "stepwise_plan_generations_total",
        IntCounterVec::new(
            Opts::new("stepwise_plan_generations_total", "Plan generation requests by outcome"),
            &["result"],
        ),
    );
}

pub fn record_plan_run(result: &str) {
    if let Some(counter) = PLAN_RUNS.get() {
        counter.with_label_values(&[result]).inc();
    }
}

pub fn record_plan_generation(result: &str) {
    if let Some(counter) = PLAN_GENERATIONS.get() {
        counter.with_label_values(&[result]).inc();
    }
}

/// Prometheus text exposition of the global registry.
pub fn render() -> Result<(String, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&global_registry().gather(), &mut buffer)?;
    let body = String::from_utf8(buffer)
        .map_err(|err| prometheus::Error::Msg(format!("metrics are not utf8: {err}")))?;
    Ok((encoder.format_type().to_string(), body))
}

/// Feeds run events into the global registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsObserver;

impl RunObserver for MetricsObserver {
    fn plan_started(&self, _run_id: &str, _total_entries: usize) {
        record_plan_run("started");
    }

    fn step_succeeded(&self, record: &StepRecord) {
        let kind = record.kind.wire_name();
        if let Some(counter) = STEPS_EXECUTED.get() {
            counter.with_label_values(&[kind]).inc();
        }
        if let Some(histogram) = STEP_LATENCY.get() {
            histogram
                .with_label_values(&[kind])
                .observe(record.latency_ms as f64);
        }
    }

    fn step_skipped(&self, _entry: &SkippedEntry) {
        if let Some(counter) = UNSUPPORTED_ACTIONS.get() {
            counter.inc();
        }
    }

    fn plan_finished(&self, _report: &PlanReport) {
        record_plan_run("succeeded");
    }

    fn plan_failed(&self, _run_id: &str, _error: &FlowError) {
        record_plan_run("failed");
    }
}
