use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pgalert::alerts::Admission;
use pgalert::config::{Config, ProbeSpec};
use pgalert::monitor::{Monitor, MonitorInstance};
use pgalert::notify::{ChannelOutcome, ChannelRegistry, Dispatcher};
use pgalert::{
    ActionOutcome, AlertContext, AlertRule, NotificationChannel, NotifierError, Operator,
    ProbeError, ProbeExecutor, ProbeResult, Scalar,
};

struct FixedExecutor(Vec<Scalar>);

#[async_trait]
impl ProbeExecutor for FixedExecutor {
    async fn execute(&self, _sql: &str) -> Result<ProbeResult, ProbeError> {
        Ok(ProbeResult::single_column("value", self.0.clone()))
    }
}

fn config_with_telegram(api_url: &str, interval: &str) -> Config {
    let yaml = format!(
        r#"
databases:
  - instance: primary
    database: app
queries:
  - name: connections
    sql: SELECT count(*) FROM pg_stat_activity
    interval: 10s
    alert_rules:
      - condition: gt
        value: 100
        message: "{{{{value}}}} connections on {{{{instance}}}}"
        category: performance
alerts:
  telegram:
    enabled: true
    bot_token: "42:token"
    chat_id: "-1001"
    interval: {interval}
    api_url: {api_url}
"#
    );
    Config::from_yaml_str(&yaml).unwrap()
}

fn instance(registry: ChannelRegistry, values: Vec<Scalar>) -> MonitorInstance {
    MonitorInstance::new(
        "primary",
        Arc::new(FixedExecutor(values)),
        Arc::new(Dispatcher::new(registry)),
    )
}

#[tokio::test]
async fn threshold_breach_reaches_telegram_and_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot42:token/sendMessage"))
        .and(body_partial_json(serde_json::json!({ "chat_id": "-1001" })))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(2)
        .mount(&server)
        .await;

    let config = config_with_telegram(&server.uri(), "300ms");
    let registry = ChannelRegistry::from_config(&config.alerts).unwrap();
    let probe = config.queries[0].clone();
    let instance = instance(registry, vec![Scalar::Int(150)]);

    let first = instance.tick(&probe).await;
    assert_eq!(first.len(), 1);
    let report = first[0].dispatch.as_ref().unwrap();
    assert_eq!(report.outcome("telegram"), Some(&ChannelOutcome::Sent));

    // inside the interval: suppressed before any request is made
    let second = instance.tick(&probe).await;
    assert_eq!(second[0].admission, Admission::RateLimited);

    tokio::time::sleep(Duration::from_millis(350)).await;
    let third = instance.tick(&probe).await;
    assert_eq!(
        third[0].dispatch.as_ref().unwrap().outcome("telegram"),
        Some(&ChannelOutcome::Sent)
    );
}

#[tokio::test]
async fn failed_send_is_retried_on_next_tick() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let config = config_with_telegram(&server.uri(), "1h");
    let registry = ChannelRegistry::from_config(&config.alerts).unwrap();
    let probe = config.queries[0].clone();
    let instance = instance(registry, vec![Scalar::Int(150)]);

    for _ in 0..2 {
        let outcomes = instance.tick(&probe).await;
        assert_eq!(outcomes[0].admission, Admission::Admitted);
        assert!(matches!(
            outcomes[0].dispatch.as_ref().unwrap().outcome("telegram"),
            Some(ChannelOutcome::Failed(_))
        ));
    }
    assert!(instance.gate().tracker().is_empty());
}

/// Records whether the action's marker file already existed when sending
struct MarkerChannel {
    marker: PathBuf,
    seen: Mutex<Vec<bool>>,
}

#[async_trait]
impl NotificationChannel for MarkerChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn min_interval(&self) -> Duration {
        Duration::ZERO
    }

    async fn send(&self, _alert: &AlertContext) -> Result<(), NotifierError> {
        self.seen.lock().push(self.marker.exists());
        Err(NotifierError::Http {
            channel: "webhook".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

#[cfg(unix)]
#[tokio::test]
async fn action_runs_after_dispatch_even_when_dispatch_fails() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("remediated");
    let channel = Arc::new(MarkerChannel {
        marker: marker.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let mut registry = ChannelRegistry::new();
    registry.register(channel.clone());

    let probe = ProbeSpec::new("locks", "SELECT count(*) FROM pg_locks", Duration::from_secs(10))
        .with_rule(AlertRule::new(Operator::Gte, 10).with_action(format!("touch {}", marker.display())));
    let instance = instance(registry, vec![Scalar::Int(12)]);

    let outcomes = instance.tick(&probe).await;

    assert_eq!(*channel.seen.lock(), vec![false]);
    assert!(marker.exists());
    assert_eq!(outcomes[0].action, Some(ActionOutcome::Succeeded));
}

#[cfg(unix)]
#[tokio::test]
async fn failing_action_does_not_undo_dispatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_with_telegram(&server.uri(), "1m");
    let registry = ChannelRegistry::from_config(&config.alerts).unwrap();
    let mut probe = config.queries[0].clone();
    probe.alert_rules[0].execute_action = Some("false".to_string());
    let instance = instance(registry, vec![Scalar::Int(150)]);

    let outcomes = instance.tick(&probe).await;

    assert_eq!(outcomes[0].action, Some(ActionOutcome::Failed { code: Some(1) }));
    assert_eq!(
        outcomes[0].dispatch.as_ref().unwrap().outcome("telegram"),
        Some(&ChannelOutcome::Sent)
    );
}

#[tokio::test]
async fn monitor_runs_probes_until_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(serde_json::json!({
            "type": "database_alert",
            "instance": "primary",
            "value": "150",
        })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let yaml = format!(
        r#"
databases:
  - instance: primary
    database: app
queries:
  - name: connections
    sql: SELECT 1
    interval: 100ms
    alert_rules:
      - condition: gt
        value: 100
alerts:
  webhook:
    enabled: true
    url: {}/hook
"#,
        server.uri()
    );
    let config = Config::from_yaml_str(&yaml).unwrap();
    let registry = ChannelRegistry::from_config(&config.alerts).unwrap();
    let executor: Arc<dyn ProbeExecutor> = Arc::new(FixedExecutor(vec![Scalar::Int(150)]));

    let mut monitor = Monitor::from_parts(
        vec![("primary".to_string(), executor)],
        config.queries,
        registry,
    );
    monitor.start();
    assert_eq!(monitor.task_count(), 1);

    tokio::time::sleep(Duration::from_millis(450)).await;
    monitor.shutdown().await;
    assert_eq!(monitor.task_count(), 0);

    let received = server.received_requests().await.unwrap().len();
    assert!(received >= 2, "expected repeated sends, got {received}");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), received);
}
