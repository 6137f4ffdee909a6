use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{CoreError, CoreResult, ParamSpec, TaskName};
use crate::task::{TaskBehavior, TaskTest};

/// Factory producing the contents of one registered unit. The registry calls
/// it at most once per name for the process lifetime.
pub type UnitSource = Arc<dyn Fn() -> TaskUnit + Send + Sync>;

/// What a task module declares about itself when it registers: parameter
/// specs, documentation, and the behavior object.
pub struct TaskManifest {
    pub doc: String,
    pub params: Vec<ParamSpec>,
    pub behavior: Arc<dyn TaskBehavior>,
}

impl TaskManifest {
    pub fn new(
        doc: impl Into<String>,
        params: Vec<ParamSpec>,
        behavior: Arc<dyn TaskBehavior>,
    ) -> Self {
        Self {
            doc: doc.into(),
            params,
            behavior,
        }
    }
}

pub enum UnitItem {
    Task(TaskManifest),
    Test(TaskTest),
}

/// The contents of one loadable unit: exactly one task manifest plus any
/// number of associated self-tests. The one-task rule is enforced at load
/// time, not here.
#[derive(Default)]
pub struct TaskUnit {
    items: Vec<UnitItem>,
}

impl TaskUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, manifest: TaskManifest) -> Self {
        self.items.push(UnitItem::Task(manifest));
        self
    }

    pub fn test(mut self, test: TaskTest) -> Self {
        self.items.push(UnitItem::Test(test));
        self
    }

    pub(crate) fn into_items(self) -> Vec<UnitItem> {
        self.items
    }
}

/// One hierarchical namespace of registered units. Name segments map onto
/// tree levels; a node may hold a unit, children, or both, so file-shaped
/// leaves and directory-shaped groups resolve through the same lookup path.
#[derive(Default)]
pub struct SearchRoot {
    root: Node,
}

#[derive(Default)]
struct Node {
    unit: Option<UnitSource>,
    children: BTreeMap<String, Node>,
}

impl SearchRoot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        dotted: &str,
        source: impl Fn() -> TaskUnit + Send + Sync + 'static,
    ) -> CoreResult<()> {
        let name = TaskName::parse(dotted)?;
        let mut node = &mut self.root;
        for segment in name.segments() {
            node = node.children.entry(segment.clone()).or_default();
        }
        if node.unit.is_some() {
            return Err(CoreError::TaskLoad {
                name: name.dotted(),
                reason: "a unit is already registered under this name".to_string(),
            });
        }
        node.unit = Some(Arc::new(source));
        Ok(())
    }

    pub(crate) fn find(&self, name: &TaskName) -> Option<UnitSource> {
        let mut node = &self.root;
        for segment in name.segments() {
            node = node.children.get(segment)?;
        }
        node.unit.clone()
    }

    /// All registered names, depth-first, lexicographic at each level. A
    /// node's own unit comes before its children's.
    pub(crate) fn walk(&self) -> Vec<TaskName> {
        let mut names = Vec::new();
        let mut prefix = Vec::new();
        walk_node(&self.root, &mut prefix, &mut names);
        names
    }
}

fn walk_node(node: &Node, prefix: &mut Vec<String>, names: &mut Vec<TaskName>) {
    if node.unit.is_some()
        && !prefix.is_empty()
        && let Ok(name) = TaskName::from_segments(prefix.clone())
    {
        names.push(name);
    }
    for (segment, child) in &node.children {
        prefix.push(segment.clone());
        walk_node(child, prefix, names);
        prefix.pop();
    }
}
