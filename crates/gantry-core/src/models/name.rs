use std::fmt::{Display, Formatter};

use crate::models::{CoreError, CoreResult};

/// A task's fully qualified name: one or more dotted identifier segments
/// (`fs.digests.md5`). Equality, hashing, and registry lookup all use the
/// joined dotted form.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TaskName {
    segments: Vec<String>,
}

impl TaskName {
    pub fn parse(dotted: &str) -> CoreResult<Self> {
        Self::from_segments(dotted.split('.').map(str::to_owned).collect())
    }

    pub fn from_segments(segments: Vec<String>) -> CoreResult<Self> {
        if segments.is_empty() {
            return Err(CoreError::InvalidName {
                name: String::new(),
                reason: "name must contain at least one segment".to_string(),
            });
        }

        for segment in &segments {
            if !is_identifier(segment) {
                return Err(CoreError::InvalidName {
                    name: segments.join("."),
                    reason: format!(
                        "segment '{segment}' is not an identifier (expected [A-Za-z_][A-Za-z0-9_]*)"
                    ),
                });
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl Display for TaskName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
