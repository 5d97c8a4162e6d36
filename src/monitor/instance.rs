//! One monitored target and its probe loops

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::action::{ActionExecutor, ActionOutcome};
use crate::alerts::{evaluate, Admission, AlertGate, AlertRule};
use crate::config::ProbeSpec;
use crate::notify::{AlertContext, DispatchReport, Dispatcher};
use crate::probe::{ProbeError, ProbeExecutor, ProbeResult, Scalar};

/// What happened to one triggered rule during a tick
#[derive(Debug, Clone)]
pub struct AlertOutcome {
    pub probe: String,
    pub rule_index: usize,
    /// Category of the (possibly synthesized) rule
    pub category: String,
    pub value: Scalar,
    pub admission: Admission,
    /// Present when the alert was admitted
    pub dispatch: Option<DispatchReport>,
    /// Present when an action was configured and run
    pub action: Option<ActionOutcome>,
}

/// A monitored database instance: its executor, gate state and shared
/// notification plumbing. Every probe of the instance runs in its own task.
pub struct MonitorInstance {
    name: String,
    executor: Arc<dyn ProbeExecutor>,
    gate: AlertGate,
    dispatcher: Arc<Dispatcher>,
    actions: ActionExecutor,
    /// Startup probes that already fired
    started: Mutex<HashSet<String>>,
}

impl MonitorInstance {
    pub fn new(
        name: impl Into<String>,
        executor: Arc<dyn ProbeExecutor>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            name: name.into(),
            executor,
            gate: AlertGate::new(),
            dispatcher,
            actions: ActionExecutor::default(),
            started: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_action_executor(mut self, actions: ActionExecutor) -> Self {
        self.actions = actions;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gate(&self) -> &AlertGate {
        &self.gate
    }

    pub fn executor(&self) -> &Arc<dyn ProbeExecutor> {
        &self.executor
    }

    /// Spawn the loop for one probe
    pub fn spawn(self: &Arc<Self>, probe: ProbeSpec, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let instance = Arc::clone(self);
        tokio::spawn(async move { instance.run_probe(probe, shutdown).await })
    }

    /// Tick `probe` every interval until shutdown is signalled. The first
    /// tick happens one interval after start.
    pub async fn run_probe(&self, probe: ProbeSpec, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            instance = %self.name,
            probe = %probe.name,
            interval = ?probe.interval,
            "Probe scheduled"
        );

        let mut ticker = interval_at(Instant::now() + probe.interval, probe.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = self.tick(&probe) => {}
            }
        }

        tracing::info!(instance = %self.name, probe = %probe.name, "Probe stopped");
    }

    /// Run the probe once and process every triggered rule
    pub async fn tick(&self, probe: &ProbeSpec) -> Vec<AlertOutcome> {
        if probe.is_startup_probe() {
            if !self.started.lock().insert(probe.name.clone()) {
                return Vec::new();
            }
            let result = ProbeResult::single_column("started", vec![Scalar::Int(1)]);
            return self.evaluate_result(probe, &result).await;
        }

        match self.execute(probe).await {
            Ok(result) => {
                tracing::debug!(
                    instance = %self.name,
                    probe = %probe.name,
                    rows = result.rows.len(),
                    "Probe executed"
                );
                self.evaluate_result(probe, &result).await
            }
            Err(e) => {
                tracing::error!(
                    instance = %self.name,
                    probe = %probe.name,
                    error = %e,
                    "Probe failed"
                );
                self.report_failure(probe, &e).await
            }
        }
    }

    async fn execute(&self, probe: &ProbeSpec) -> Result<ProbeResult, ProbeError> {
        let timeout = probe.timeout();
        match tokio::time::timeout(timeout, self.executor.execute(&probe.sql)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }

    async fn evaluate_result(&self, probe: &ProbeSpec, result: &ProbeResult) -> Vec<AlertOutcome> {
        let mut outcomes = Vec::new();
        for value in result.first_column() {
            for (index, rule) in probe.alert_rules.iter().enumerate() {
                if evaluate(value, rule.condition, &rule.value) {
                    tracing::debug!(
                        instance = %self.name,
                        probe = %probe.name,
                        value = %value,
                        condition = %rule.condition,
                        threshold = %rule.value,
                        "Rule triggered"
                    );
                    outcomes.push(self.handle_trigger(probe, index, rule, value, true).await);
                }
            }
        }
        outcomes
    }

    /// Every rule on a failing probe turns into an `error` alert. These go
    /// through the gate and the channels but never run the rule's action.
    async fn report_failure(&self, probe: &ProbeSpec, error: &ProbeError) -> Vec<AlertOutcome> {
        let error = error.to_string();
        let mut outcomes = Vec::with_capacity(probe.alert_rules.len());
        for (index, rule) in probe.alert_rules.iter().enumerate() {
            let error_rule = rule.as_error(&probe.name, &error);
            let value = error_rule.value.clone();
            outcomes.push(self.handle_trigger(probe, index, &error_rule, &value, false).await);
        }
        outcomes
    }

    /// Gate, then dispatch, then run the action
    async fn handle_trigger(
        &self,
        probe: &ProbeSpec,
        rule_index: usize,
        rule: &AlertRule,
        value: &Scalar,
        allow_action: bool,
    ) -> AlertOutcome {
        let mut outcome = AlertOutcome {
            probe: probe.name.clone(),
            rule_index,
            category: rule.category.clone(),
            value: value.clone(),
            admission: Admission::Admitted,
            dispatch: None,
            action: None,
        };

        let channels = self.dispatcher.resolve_channels(rule);
        outcome.admission = self
            .gate
            .admit(&self.name, &probe.name, rule, &channels, Utc::now());
        if !outcome.admission.is_admitted() {
            tracing::debug!(
                instance = %self.name,
                probe = %probe.name,
                reason = %outcome.admission,
                "Alert suppressed"
            );
            return outcome;
        }

        let alert = AlertContext::new(&self.name, &probe.name, rule, value);
        let report = self
            .dispatcher
            .dispatch(self.gate.tracker(), &probe.name, rule, &alert)
            .await;
        outcome.dispatch = Some(report);

        if allow_action {
            if let Some(command) = rule.action() {
                outcome.action = Some(self.actions.execute(command, &alert).await);
            }
        }

        outcome
    }
}

impl std::fmt::Debug for MonitorInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorInstance")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::probe::{ProbeError, ProbeExecutor, ProbeResult, Scalar};

    /// Executor answering from a script; the last answer repeats
    pub struct ScriptedExecutor {
        answers: Mutex<VecDeque<Result<ProbeResult, ProbeError>>>,
        last: Mutex<Option<Result<ProbeResult, ProbeError>>>,
        pub delay: Option<Duration>,
        pub calls: AtomicUsize,
    }

    impl ScriptedExecutor {
        pub fn new(answers: Vec<Result<ProbeResult, ProbeError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                last: Mutex::new(None),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn values(values: Vec<Scalar>) -> Self {
            Self::new(vec![Ok(ProbeResult::single_column("value", values))])
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProbeExecutor for ScriptedExecutor {
        async fn execute(&self, _sql: &str) -> Result<ProbeResult, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.answers.lock().pop_front();
            match next {
                Some(answer) => {
                    *self.last.lock() = Some(answer.clone());
                    answer
                }
                None => self
                    .last
                    .lock()
                    .clone()
                    .unwrap_or_else(|| Ok(ProbeResult::default())),
            }
        }
    }
}
