use serde_json::Value;

/// Declared value type of a task parameter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ParamKind {
    Str,
    Bool,
    Int,
    List,
}

impl ParamKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::List => "list",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Str => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64(),
            Self::List => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }
}

/// A parameter declaration, fixed at unit load time.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub doc: String,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamKind, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            doc: doc.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Structural validation performed when the owning unit is loaded.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!("parameter name '{}' is not an identifier", self.name));
        }

        if let Some(default) = &self.default
            && !self.kind.matches(default)
        {
            return Err(format!(
                "default for parameter '{}' does not match declared type {}",
                self.name,
                self.kind.label()
            ));
        }

        Ok(())
    }
}
