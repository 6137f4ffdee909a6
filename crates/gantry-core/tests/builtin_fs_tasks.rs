use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use gantry_core::context::Context;
use gantry_core::execution::{CommandOutput, CommandStatus};
use gantry_core::models::{CoreError, CoreResult, ExecutionErrorKind, TaskName};
use gantry_core::navigator::Navigator;
use gantry_core::registry::Registry;
use gantry_core::task::TaskArgs;

/// In-memory target that also answers `md5sum` with a canned digest, so the
/// built-in tasks run the same way they would against a real machine.
struct FakeContext {
    files: Mutex<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
    md5_reply: String,
}

impl FakeContext {
    fn new(md5_reply: &str) -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            md5_reply: md5_reply.to_string(),
        })
    }

    fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().expect("files lock").get(path).cloned()
    }
}

#[async_trait(?Send)]
impl Context for FakeContext {
    fn identity(&self) -> String {
        "ci@local".to_string()
    }

    async fn execute(&self, command: &str) -> CoreResult<CommandOutput> {
        let stdout = if command.starts_with("md5sum ") {
            self.md5_reply.clone().into_bytes()
        } else {
            Vec::new()
        };
        Ok(CommandOutput {
            status: CommandStatus::ExitCode(0),
            stdout,
            stderr: Vec::new(),
        })
    }

    async fn read(&self, path: &str) -> CoreResult<Vec<u8>> {
        self.file(path).ok_or_else(|| {
            CoreError::execution(ExecutionErrorKind::Io, format!("no such file '{path}'"))
        })
    }

    async fn write(&self, path: &str, content: &[u8]) -> CoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .expect("files lock")
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }
}

fn builtin_registry() -> Arc<Registry> {
    Arc::new(Registry::with_builtins().expect("builtins should register"))
}

#[test]
fn builtin_listing_covers_both_hierarchy_shapes() {
    let names: Vec<String> = builtin_registry()
        .list_all()
        .expect("listing should succeed")
        .iter()
        .map(|definition| definition.name().dotted())
        .collect();
    assert_eq!(names, ["fs.digests.md5", "fs.read", "fs.write"]);
}

#[tokio::test]
async fn write_then_read_round_trips_base64_content() {
    let registry = builtin_registry();
    let context = FakeContext::new("");
    let nav = Navigator::root(Arc::clone(&registry), context.clone());

    let encoded = STANDARD.encode(b"payload bytes");
    let written = nav
        .segment("fs")
        .segment("write")
        .invoke(TaskArgs::new().arg("/srv/data").arg(encoded.clone()))
        .await;
    assert!(written.is_success(), "{:?}", written.outcome());
    assert_eq!(context.file("/srv/data").expect("file"), b"payload bytes");

    let read = nav
        .segment("fs")
        .segment("read")
        .invoke(TaskArgs::new().arg("/srv/data"))
        .await;
    assert_eq!(read.outcome(), &Ok(Value::String(encoded)));
}

#[tokio::test]
async fn write_short_circuits_when_the_content_already_matches() {
    let registry = builtin_registry();
    let context = FakeContext::new("");
    context
        .write("/srv/data", b"payload bytes")
        .await
        .expect("seeding should succeed");
    let seeded_writes = context.writes.load(Ordering::SeqCst);

    let result = Navigator::root(registry, context.clone())
        .segment("fs")
        .segment("write")
        .invoke(
            TaskArgs::new()
                .arg("/srv/data")
                .arg(STANDARD.encode(b"payload bytes")),
        )
        .await;

    assert!(result.is_success(), "{:?}", result.outcome());
    assert_eq!(context.writes.load(Ordering::SeqCst), seeded_writes);
}

#[tokio::test]
async fn rejected_base64_content_names_a_task_failure() {
    let registry = builtin_registry();
    let context = FakeContext::new("");
    let result = Navigator::root(registry, context)
        .segment("fs")
        .segment("write")
        .invoke(TaskArgs::new().arg("/srv/data").arg("*** not base64 ***"))
        .await;
    assert!(!result.is_success());
}

#[tokio::test]
async fn md5_task_returns_the_digest_token() {
    let registry = builtin_registry();
    let context = FakeContext::new("d41d8cd98f00b204e9800998ecf8427e  /srv/data\n");
    context
        .write("/srv/data", b"")
        .await
        .expect("seeding should succeed");

    let result = Navigator::root(registry, context)
        .segment("fs")
        .segment("digests")
        .segment("md5")
        .invoke(TaskArgs::new().arg("/srv/data"))
        .await;
    assert_eq!(
        result.outcome(),
        &Ok(Value::String("d41d8cd98f00b204e9800998ecf8427e".to_string()))
    );
}

#[tokio::test]
async fn md5_self_test_passes_through_the_harness() {
    let registry = builtin_registry();
    let name = TaskName::parse("fs.digests.md5").expect("name should parse");

    let reports = registry
        .run_tests(&name, || {
            FakeContext::new("6f5902ac237024bdd0c176cb93063dc4  /tmp/gantry_md5_check\n")
                as Arc<dyn Context>
        })
        .await
        .expect("harness should run");

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].test, "digests_known_payload");
    assert!(reports[0].passed(), "{:?}", reports[0].failure);
}
