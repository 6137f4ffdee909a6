//! The built-in `fs` task namespace. These tasks are written against the
//! context capability set only, so they behave identically on local and
//! remote targets.

use crate::models::CoreResult;
use crate::registry::SearchRoot;

mod fs;

/// A search root populated with the built-in tasks.
pub fn builtin_root() -> CoreResult<SearchRoot> {
    let mut root = SearchRoot::new();
    fs::register(&mut root)?;
    Ok(root)
}
