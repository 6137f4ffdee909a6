use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use gantry_core::context::{Context, RemoteSession, SessionFactory};
use gantry_core::coordinator::{Invocation, fan_out, run_all};
use gantry_core::execution::{CommandOutput, CommandStatus};
use gantry_core::models::{
    CoreError, CoreResult, ExecutionErrorKind, ParamKind, ParamSpec, TaskName,
};
use gantry_core::provider::{HostRangeSpec, Provider, SshProvider};
use gantry_core::registry::{Registry, SearchRoot, TaskManifest, TaskUnit};
use gantry_core::task::{TaskArgs, TaskBehavior, TaskCall};

struct NullContext {
    identity: String,
}

impl NullContext {
    fn new(identity: &str) -> Arc<Self> {
        Arc::new(Self {
            identity: identity.to_string(),
        })
    }
}

#[async_trait(?Send)]
impl Context for NullContext {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    async fn execute(&self, _command: &str) -> CoreResult<CommandOutput> {
        Ok(CommandOutput {
            status: CommandStatus::ExitCode(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }

    async fn read(&self, path: &str) -> CoreResult<Vec<u8>> {
        Err(CoreError::execution(
            ExecutionErrorKind::Io,
            format!("no such file '{path}'"),
        ))
    }

    async fn write(&self, _path: &str, _content: &[u8]) -> CoreResult<()> {
        Ok(())
    }
}

/// Sleeps for `delay_ms`, records its completion, and returns its label.
struct TimerTask {
    completions: Arc<Mutex<Vec<String>>>,
}

#[async_trait(?Send)]
impl TaskBehavior for TimerTask {
    async fn run(&self, call: &mut TaskCall) -> CoreResult<Value> {
        let delay = call.params().int("delay_ms")?;
        let label = call.params().str("label")?.to_string();
        tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        self.completions
            .lock()
            .expect("completions lock")
            .push(label.clone());
        Ok(Value::String(label))
    }
}

fn timer_registry(completions: &Arc<Mutex<Vec<String>>>) -> Arc<Registry> {
    let mut root = SearchRoot::new();
    let completions = Arc::clone(completions);
    root.register("timer.wait", move || {
        TaskUnit::new().task(TaskManifest::new(
            "Waits and reports back.",
            vec![
                ParamSpec::new("delay_ms", ParamKind::Int, "How long to wait"),
                ParamSpec::new("label", ParamKind::Str, "Result label"),
            ],
            Arc::new(TimerTask {
                completions: Arc::clone(&completions),
            }),
        ))
    })
    .expect("registration should succeed");
    Arc::new(Registry::new(vec![root]))
}

#[tokio::test]
async fn run_all_returns_results_in_submission_order() {
    let completions = Arc::new(Mutex::new(Vec::new()));
    let registry = timer_registry(&completions);
    let name = TaskName::parse("timer.wait").expect("name should parse");

    let invocations = vec![
        Invocation::new(
            name.clone(),
            NullContext::new("a@local"),
            TaskArgs::new().arg(60).arg("A"),
        ),
        Invocation::new(
            name.clone(),
            NullContext::new("b@local"),
            TaskArgs::new().arg(5).arg("B"),
        ),
        Invocation::new(
            name,
            NullContext::new("c@local"),
            TaskArgs::new().arg(25).arg("C"),
        ),
    ];

    let results = run_all(&registry, invocations).await;

    let labels: Vec<&Value> = results
        .iter()
        .map(|result| result.outcome().as_ref().expect("success"))
        .collect();
    assert_eq!(labels, [&json!("A"), &json!("B"), &json!("C")]);

    // The slow first invocation finished last; order above is submission
    // order, not completion order.
    let completed = completions.lock().expect("completions lock").clone();
    assert_eq!(completed, ["B", "C", "A"]);
}

#[tokio::test]
async fn one_failing_invocation_does_not_disturb_its_siblings() {
    struct FailingTask;

    #[async_trait(?Send)]
    impl TaskBehavior for FailingTask {
        async fn run(&self, _call: &mut TaskCall) -> CoreResult<Value> {
            Err(CoreError::task("target rejected the change"))
        }
    }

    let completions = Arc::new(Mutex::new(Vec::new()));
    let registry = {
        let mut root = SearchRoot::new();
        let completions = Arc::clone(&completions);
        root.register("timer.wait", move || {
            TaskUnit::new().task(TaskManifest::new(
                "Waits and reports back.",
                vec![
                    ParamSpec::new("delay_ms", ParamKind::Int, "How long to wait"),
                    ParamSpec::new("label", ParamKind::Str, "Result label"),
                ],
                Arc::new(TimerTask {
                    completions: Arc::clone(&completions),
                }),
            ))
        })
        .expect("registration should succeed");
        root.register("broken", || {
            TaskUnit::new().task(TaskManifest::new(
                "Always fails.",
                Vec::new(),
                Arc::new(FailingTask),
            ))
        })
        .expect("registration should succeed");
        Arc::new(Registry::new(vec![root]))
    };

    let timer = TaskName::parse("timer.wait").expect("name should parse");
    let broken = TaskName::parse("broken").expect("name should parse");
    let invocations = vec![
        Invocation::new(
            timer.clone(),
            NullContext::new("a@local"),
            TaskArgs::new().arg(10).arg("A"),
        ),
        Invocation::new(broken, NullContext::new("b@local"), TaskArgs::new()),
        Invocation::new(
            timer,
            NullContext::new("c@local"),
            TaskArgs::new().arg(10).arg("C"),
        ),
    ];

    let results = run_all(&registry, invocations).await;
    assert_eq!(results.len(), 3);
    assert!(results[0].is_success());
    assert!(!results[1].is_success());
    assert!(results[2].is_success());
    assert_eq!(results[1].context(), "b@local");
}

struct FakeSession {
    host: String,
}

#[async_trait(?Send)]
impl RemoteSession for FakeSession {
    async fn exec(&self, _command: &str) -> CoreResult<CommandOutput> {
        if self.host == "10.0.0.2" {
            Ok(CommandOutput {
                status: CommandStatus::ExitCode(1),
                stdout: Vec::new(),
                stderr: b"probe rejected".to_vec(),
            })
        } else {
            Ok(CommandOutput {
                status: CommandStatus::ExitCode(0),
                stdout: b"ok\n".to_vec(),
                stderr: Vec::new(),
            })
        }
    }
}

struct FakeSessionFactory {
    connects: AtomicUsize,
}

impl FakeSessionFactory {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
        })
    }
}

#[async_trait(?Send)]
impl SessionFactory for FakeSessionFactory {
    async fn connect(&self, _user: &str, host: &str) -> CoreResult<Box<dyn RemoteSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            host: host.to_string(),
        }))
    }
}

struct ProbeTask;

#[async_trait(?Send)]
impl TaskBehavior for ProbeTask {
    async fn run(&self, call: &mut TaskCall) -> CoreResult<Value> {
        let stdout = call.sh("uptime").await?;
        Ok(Value::String(stdout.trim().to_string()))
    }
}

fn probe_registry() -> Arc<Registry> {
    let mut root = SearchRoot::new();
    root.register("probe.uptime", || {
        TaskUnit::new().task(TaskManifest::new(
            "Checks that the target answers.",
            Vec::new(),
            Arc::new(ProbeTask),
        ))
    })
    .expect("registration should succeed");
    Arc::new(Registry::new(vec![root]))
}

#[tokio::test]
async fn fan_out_records_per_target_failures_without_raising() {
    let registry = probe_registry();
    let factory = FakeSessionFactory::new();
    let spec = HostRangeSpec::parse("10.0.0.1-3").expect("spec should parse");
    let mut provider = SshProvider::new(spec, "root", factory.clone());

    let name = TaskName::parse("probe.uptime").expect("name should parse");
    let report = fan_out(&registry, &mut provider, &name, &TaskArgs::new())
        .await
        .expect("fan-out itself should not fail");

    let identities: Vec<&str> = report
        .results()
        .iter()
        .map(|result| result.context())
        .collect();
    assert_eq!(
        identities,
        ["root@10.0.0.1", "root@10.0.0.2", "root@10.0.0.3"]
    );

    assert!(!report.all_succeeded());
    assert_eq!(report.failures().count(), 1);
    let failed = report.get("root@10.0.0.2").expect("entry for the failed host");
    assert!(!failed.is_success());
    assert!(report.get("root@10.0.0.1").expect("h1").is_success());
    assert!(report.get("root@10.0.0.3").expect("h3").is_success());

    let records = report.into_records();
    let rows = serde_json::to_value(&records).expect("records should serialize");
    assert_eq!(rows[0]["result"], json!("ok"));
    assert_eq!(rows[0]["exception"], Value::Null);
    assert_eq!(rows[1]["result"], Value::Null);
    assert!(
        rows[1]["exception"]
            .as_str()
            .expect("exception text")
            .contains("probe rejected")
    );
}

#[tokio::test]
async fn fan_out_surfaces_provider_failures() {
    struct RefusingFactory;

    #[async_trait(?Send)]
    impl SessionFactory for RefusingFactory {
        async fn connect(&self, _user: &str, host: &str) -> CoreResult<Box<dyn RemoteSession>> {
            Err(CoreError::execution(
                ExecutionErrorKind::Transport,
                format!("connection refused by {host}"),
            ))
        }
    }

    let registry = probe_registry();
    let spec = HostRangeSpec::parse("10.0.0.1-2").expect("spec should parse");
    let mut provider = SshProvider::new(spec, "root", Arc::new(RefusingFactory));

    let name = TaskName::parse("probe.uptime").expect("name should parse");
    let error = fan_out(&registry, &mut provider, &name, &TaskArgs::new())
        .await
        .expect_err("expected a production failure");
    assert!(matches!(
        error,
        CoreError::Execution {
            kind: ExecutionErrorKind::Transport,
            ..
        }
    ));
}

#[tokio::test]
async fn ssh_provider_establishes_sessions_lazily() {
    let factory = FakeSessionFactory::new();
    let spec = HostRangeSpec::parse("10.0.0.0/30").expect("spec should parse");
    let mut provider = SshProvider::new(spec, "root", factory.clone());

    assert_eq!(factory.connects.load(Ordering::SeqCst), 0);
    let first = provider
        .next_context()
        .await
        .expect("advance should succeed")
        .expect("a context");
    assert_eq!(first.identity(), "root@10.0.0.0");
    assert_eq!(factory.connects.load(Ordering::SeqCst), 1);

    let second = provider
        .next_context()
        .await
        .expect("advance should succeed")
        .expect("a context");
    assert_eq!(second.identity(), "root@10.0.0.1");
    assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
}
