use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::context::Context;
use crate::models::{CoreError, CoreResult, TaskName, TestReport};
use crate::task::{TaskCall, TaskDefinition, TaskTest};

mod manifest;

pub use manifest::{SearchRoot, TaskManifest, TaskUnit, UnitItem, UnitSource};

/// Resolves dotted task names to loaded, validated definitions. Search roots
/// are consulted in order; the first root that knows a name shadows the
/// rest. The load-once cache is the registry's only mutable state.
pub struct Registry {
    roots: Vec<SearchRoot>,
    cache: Mutex<HashMap<String, Arc<TaskDefinition>>>,
}

impl Registry {
    pub fn new(roots: Vec<SearchRoot>) -> Self {
        Self {
            roots,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// A registry preloaded with the built-in `fs` task namespace.
    pub fn with_builtins() -> CoreResult<Self> {
        Ok(Self::new(vec![crate::builtins::builtin_root()?]))
    }

    /// Returns the cached definition, or locates and loads it. A name no
    /// root knows fails with `TaskNotFound`; a malformed unit fails with
    /// `TaskLoad`. Load failures are not cached and not retried here. The
    /// cache lock is held across the load, so concurrent resolution of one
    /// name loads it exactly once and the first writer wins.
    pub fn resolve(&self, name: &TaskName) -> CoreResult<Arc<TaskDefinition>> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| CoreError::Internal("task cache lock poisoned".to_string()))?;

        if let Some(definition) = cache.get(&name.dotted()) {
            return Ok(Arc::clone(definition));
        }

        let source = self
            .roots
            .iter()
            .find_map(|root| root.find(name))
            .ok_or_else(|| CoreError::TaskNotFound {
                name: name.dotted(),
            })?;

        let definition = Arc::new(load_definition(name, &source)?);
        tracing::debug!(task = %name, "loaded task definition");
        cache.insert(name.dotted(), Arc::clone(&definition));
        Ok(definition)
    }

    pub fn resolve_dotted(&self, dotted: &str) -> CoreResult<Arc<TaskDefinition>> {
        self.resolve(&TaskName::parse(dotted)?)
    }

    /// Every resolvable task exactly once: roots in configuration order,
    /// depth-first and lexicographic within each root, earlier roots
    /// shadowing later ones exactly as `resolve` does.
    pub fn list_all(&self) -> CoreResult<Vec<Arc<TaskDefinition>>> {
        let mut seen = HashSet::new();
        let mut definitions = Vec::new();
        for root in &self.roots {
            for name in root.walk() {
                if seen.insert(name.dotted()) {
                    definitions.push(self.resolve(&name)?);
                }
            }
        }
        Ok(definitions)
    }

    /// Runs every self-test associated with the named task, each against a
    /// fresh context from the factory, and reports per-test pass/fail
    /// without stopping at the first failure.
    pub async fn run_tests(
        self: Arc<Self>,
        name: &TaskName,
        context_factory: impl Fn() -> Arc<dyn Context>,
    ) -> CoreResult<Vec<TestReport>> {
        let definition = self.resolve(name)?;
        let mut reports = Vec::with_capacity(definition.tests().len());
        for test in definition.tests() {
            let mut call = TaskCall::new(name.clone(), Arc::clone(&self), context_factory());
            let failure = test.body().run(&mut call).await.err();
            if let Some(error) = &failure {
                tracing::warn!(task = %name, test = test.name(), %error, "self-test failed");
            }
            reports.push(TestReport {
                test: test.name().to_string(),
                failure,
            });
        }
        Ok(reports)
    }
}

fn load_definition(name: &TaskName, source: &UnitSource) -> CoreResult<TaskDefinition> {
    let mut manifest = None;
    let mut tests: Vec<TaskTest> = Vec::new();

    for item in source().into_items() {
        match item {
            UnitItem::Task(found) => {
                if manifest.is_some() {
                    return Err(load_error(name, "unit declares more than one task"));
                }
                manifest = Some(found);
            }
            UnitItem::Test(test) => tests.push(test),
        }
    }

    let manifest = manifest.ok_or_else(|| load_error(name, "unit declares no task"))?;

    let mut param_names = HashSet::new();
    for spec in &manifest.params {
        spec.validate()
            .map_err(|reason| load_error(name, &reason))?;
        if !param_names.insert(spec.name.clone()) {
            return Err(load_error(
                name,
                &format!("duplicate parameter '{}'", spec.name),
            ));
        }
    }

    Ok(TaskDefinition::new(name.clone(), manifest, tests))
}

fn load_error(name: &TaskName, reason: &str) -> CoreError {
    CoreError::TaskLoad {
        name: name.dotted(),
        reason: reason.to_string(),
    }
}
