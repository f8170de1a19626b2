//! Pattern store preflight check.

use super::CheckResult;
use crate::store::{PatternStore, SqlitePatternStore};
use std::path::Path;

/// Check that the pattern database opens and can be queried.
pub fn check(path: &Path) -> CheckResult {
    match SqlitePatternStore::open(path).and_then(|store| store.stats()) {
        Ok(stats) => CheckResult::ok(
            "Pattern store",
            &format!("{} ({} patterns)", path.display(), stats.total_patterns),
        ),
        Err(e) => CheckResult::fail(
            "Pattern store",
            &e.to_string(),
            &format!("Check that {} is writable, or pass --database", path.display()),
        ),
    }
}
