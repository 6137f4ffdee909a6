use std::collections::BTreeMap;

use serde_json::Value;

use crate::execution::shell_escape;
use crate::models::{CoreError, CoreResult, ParamSpec, TaskName};

/// Arguments supplied to an invocation, before binding. Positional values
/// bind to parameter specs in declaration order; named values bind by name.
#[derive(Clone, Debug, Default)]
pub struct TaskArgs {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// Parameter values validated against a definition's specs. Values are fixed
/// for the lifetime of one invocation.
#[derive(Clone, Debug, Default)]
pub struct BoundParams {
    values: BTreeMap<String, Value>,
}

impl BoundParams {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    /// Binds and type-checks the supplied arguments. Every failure names the
    /// offending parameter; nothing else observes a partially bound set.
    pub(crate) fn bind(task: &TaskName, specs: &[ParamSpec], args: TaskArgs) -> CoreResult<Self> {
        let TaskArgs { positional, mut named } = args;

        if positional.len() > specs.len() {
            return Err(binding_error(
                task,
                format!("positional[{}]", specs.len()),
                format!(
                    "task takes at most {} positional arguments, {} given",
                    specs.len(),
                    positional.len()
                ),
            ));
        }

        let mut positional = positional.into_iter();
        let mut values = BTreeMap::new();

        for spec in specs {
            let value = match (positional.next(), named.remove(&spec.name)) {
                (Some(_), Some(_)) => {
                    return Err(binding_error(
                        task,
                        &spec.name,
                        "given both positionally and by name",
                    ));
                }
                (Some(value), None) | (None, Some(value)) => value,
                (None, None) => match &spec.default {
                    Some(default) => default.clone(),
                    None => {
                        return Err(binding_error(
                            task,
                            &spec.name,
                            "required parameter is missing",
                        ));
                    }
                },
            };

            if !spec.kind.matches(&value) {
                return Err(binding_error(
                    task,
                    &spec.name,
                    format!("expected {}, got {}", spec.kind.label(), kind_of(&value)),
                ));
            }

            values.insert(spec.name.clone(), value);
        }

        if let Some(unknown) = named.keys().next() {
            return Err(binding_error(task, unknown.clone(), "no such parameter"));
        }

        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> CoreResult<&str> {
        self.typed(name, "str", |value| value.as_str())
    }

    pub fn int(&self, name: &str) -> CoreResult<i64> {
        self.typed(name, "int", |value| value.as_i64())
    }

    pub fn bool(&self, name: &str) -> CoreResult<bool> {
        self.typed(name, "bool", |value| value.as_bool())
    }

    pub fn list(&self, name: &str) -> CoreResult<Vec<String>> {
        self.typed(name, "list", |value| {
            value.as_array().map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
        })
    }

    /// Shell-safe view of a bound value, for inclusion in command lines.
    /// Lists render as one quoted word per element.
    pub fn esc(&self, name: &str) -> CoreResult<String> {
        let value = self
            .get(name)
            .ok_or_else(|| CoreError::task(format!("parameter '{name}' is not bound")))?;
        escape_value(value)
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        expected: &str,
        accessor: impl Fn(&'a Value) -> Option<T>,
    ) -> CoreResult<T> {
        let value = self
            .get(name)
            .ok_or_else(|| CoreError::task(format!("parameter '{name}' is not bound")))?;
        accessor(value).ok_or_else(|| {
            CoreError::task(format!(
                "parameter '{name}' is not a {expected} (got {})",
                kind_of(value)
            ))
        })
    }
}

fn escape_value(value: &Value) -> CoreResult<String> {
    match value {
        Value::String(text) => shell_escape(text),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Array(items) => {
            let words = items
                .iter()
                .map(escape_value)
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(words.join(" "))
        }
        other => Err(CoreError::task(format!(
            "cannot shell-escape a {} value",
            kind_of(other)
        ))),
    }
}

fn binding_error(
    task: &TaskName,
    parameter: impl Into<String>,
    reason: impl Into<String>,
) -> CoreError {
    CoreError::ParameterBinding {
        task: task.dotted(),
        parameter: parameter.into(),
        reason: reason.into(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
