//! Fixture update pass
//!
//! Rewrites the `output` field of every output-bearing case record from a
//! freshly observed run, wholesale. Records carrying xfail or error
//! expectations are left untouched.

use std::path::Path;

use tracing::info;

use crate::common::{Error, Result};

use super::eval::{Evaluator, RunContext};
use super::record::{load_dir, CaseRecord};

/// Re-run every output-bearing record under `dir` and overwrite its
/// expected payload with the observed one.
///
/// A command that fails during the update aborts the pass: stale fixtures
/// must never be silently rewritten from a broken run.
pub async fn update_fixtures(
    evaluator: &Evaluator,
    dir: &Path,
    ctx: &RunContext,
) -> Result<usize> {
    let mut rewritten = 0;

    for (path, mut records) in load_dir(dir)? {
        let mut changed = false;

        for record in &mut records {
            if record.output.is_none() {
                continue;
            }
            let fresh = observe(evaluator, record, ctx, &path).await?;
            if record.output.as_deref() != Some(fresh.as_str()) {
                record.output = Some(fresh);
                changed = true;
                rewritten += 1;
            }
        }

        if changed {
            let text = serde_yaml::to_string(&records)?;
            std::fs::write(&path, text)?;
            info!(fixture = %path.display(), "fixture rewritten");
        }
    }

    Ok(rewritten)
}

async fn observe(
    evaluator: &Evaluator,
    record: &CaseRecord,
    ctx: &RunContext,
    path: &Path,
) -> Result<String> {
    let out = evaluator.invoke(record, ctx).await?;
    match out.stdout {
        Some(stdout) => Ok(stdout.trim().to_string()),
        None => Err(Error::FixtureUpdate {
            path: path.display().to_string(),
            detail: format!(
                "'{}' exited {:?}: {}",
                record.command,
                out.code,
                out.error_text()
            ),
        }),
    }
}
