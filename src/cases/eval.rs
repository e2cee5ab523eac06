//! Case evaluation
//!
//! Interprets one case record against a captured dataset: invoke the CLI
//! under test, parse what comes back, and classify it against the record's
//! declared expectation. Comparison is structural: shape tags first, then
//! a weak non-degeneracy check. It never does deep content equality.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_yaml::{Mapping, Value};
use tempfile::NamedTempFile;

use crate::common::{Error, Result};
use crate::runner::{CmdOutput, CommandRunner};

use super::record::{CaseRecord, Expectation};

/// Process-wide configuration threaded through one suite execution.
///
/// Constructed fresh per topology iteration because the data directory
/// changes. Paths are explicit; nothing ever touches the process-wide
/// current directory.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// CLI under test
    pub cli: PathBuf,
    /// Base config file handed to the CLI
    pub config_file: Option<PathBuf>,
    /// Per-run data-directory override; forces a temp merged config
    pub data_directory: Option<PathBuf>,
    /// Directory commands run in
    pub work_dir: PathBuf,
}

/// Parsed command payload: structured JSON or opaque text fallback
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Raw(String),
}

/// Shape tag for structural comparison, a small closed set.
///
/// Raw text and a JSON string carry the same tag: both are text to the
/// comparison, whatever produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    List,
    Mapping,
    Text,
    Number,
    Boolean,
    Null,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::List => "list",
            Shape::Mapping => "mapping",
            Shape::Text => "text",
            Shape::Number => "number",
            Shape::Boolean => "boolean",
            Shape::Null => "null",
        };
        f.write_str(name)
    }
}

impl Payload {
    /// Parse JSON, falling back to opaque text; some commands
    /// legitimately emit non-JSON
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str(text.trim()) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Raw(text.to_string()),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Payload::Json(serde_json::Value::Array(_)) => Shape::List,
            Payload::Json(serde_json::Value::Object(_)) => Shape::Mapping,
            Payload::Json(serde_json::Value::String(_)) => Shape::Text,
            Payload::Json(serde_json::Value::Number(_)) => Shape::Number,
            Payload::Json(serde_json::Value::Bool(_)) => Shape::Boolean,
            Payload::Json(serde_json::Value::Null) => Shape::Null,
            Payload::Raw(_) => Shape::Text,
        }
    }

    /// Element or character count, where one is defined
    pub fn len(&self) -> Option<usize> {
        match self {
            Payload::Json(serde_json::Value::Array(items)) => Some(items.len()),
            Payload::Json(serde_json::Value::Object(map)) => Some(map.len()),
            Payload::Json(serde_json::Value::String(s)) => Some(s.len()),
            Payload::Raw(s) => Some(s.len()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

/// How one case resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictKind {
    /// Observed payload matched the declared shape
    OutputMatched,
    /// Observed and expected payloads differ in shape
    ShapeMismatch,
    /// Expected a non-empty payload, observed an empty one
    DegenerateOutput,
    /// Command failed although an output payload was declared
    UnexpectedError,
    /// Command succeeded although marked xfail
    XfailUnexpectedPass,
    /// Known failure reproduced exactly, still broken
    XfailConfirmed,
    /// Known failure did not reproduce as declared
    XfailNotReproduced,
    /// Any-error expectation was met
    ErrorMatched,
    /// Any-error expectation was not met
    ErrorMissing,
    /// Record declares no usable expectation
    SpecError,
}

/// Outcome of evaluating one case record.
///
/// Produced per record per run; never persisted. Observed and expected
/// raw text ride along so a failure is diagnosable without a re-run.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub passed: bool,
    pub kind: VerdictKind,
    pub observed: Option<String>,
    pub expected: Option<String>,
}

impl Verdict {
    fn pass(kind: VerdictKind, observed: Option<String>, expected: Option<String>) -> Self {
        Self {
            passed: true,
            kind,
            observed,
            expected,
        }
    }

    fn fail(kind: VerdictKind, observed: Option<String>, expected: Option<String>) -> Self {
        Self {
            passed: false,
            kind,
            observed,
            expected,
        }
    }
}

/// Split a command string with shell-word semantics: whitespace separates
/// words, single or double quotes group them
pub fn split_command(command: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in command.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err(Error::UnbalancedQuote(command.to_string()));
    }
    if in_word {
        words.push(current);
    }
    if words.is_empty() {
        return Err(Error::EmptyCommand);
    }
    Ok(words)
}

pub struct Evaluator {
    runner: Arc<dyn CommandRunner>,
}

impl Evaluator {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Invoke a record's command under the context, capturing the outcome.
    ///
    /// When the context carries a data-directory override, the base config
    /// is merged with it into a temp file that lives exactly as long as
    /// the invocation.
    pub async fn invoke(&self, record: &CaseRecord, ctx: &RunContext) -> Result<CmdOutput> {
        let mut argv = vec![ctx.cli.display().to_string()];

        // held across the run; dropped (and removed) on every exit path
        let _merged: Option<NamedTempFile> = match &ctx.data_directory {
            Some(data_dir) => {
                let merged = materialize_override_config(ctx, data_dir)?;
                argv.push(format!("--config={}", merged.path().display()));
                Some(merged)
            }
            None => {
                if let Some(config) = &ctx.config_file {
                    argv.push(format!("--config={}", config.display()));
                }
                None
            }
        };

        argv.extend(split_command(&record.command)?);
        self.runner.run(&argv, &ctx.work_dir).await
    }

    /// Evaluate one record: invoke, then classify against its expectation.
    ///
    /// Pure given (record, context, dataset): re-evaluating with no state
    /// change in between yields the same verdict.
    pub async fn evaluate(&self, record: &CaseRecord, ctx: &RunContext) -> Result<Verdict> {
        let out = self.invoke(record, ctx).await?;
        Ok(classify(record, &out))
    }
}

/// Write the base config with the data-directory override into a temp file
fn materialize_override_config(
    ctx: &RunContext,
    data_dir: &std::path::Path,
) -> Result<NamedTempFile> {
    let mut config: Mapping = match &ctx.config_file {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
            serde_yaml::from_str(&content)?
        }
        _ => Mapping::new(),
    };
    config.insert(
        Value::from("data-directory"),
        Value::from(data_dir.display().to_string()),
    );

    let file = tempfile::Builder::new()
        .prefix("topoharness-")
        .suffix(".yml")
        .tempfile()?;
    std::fs::write(file.path(), serde_yaml::to_string(&config)?)?;
    Ok(file)
}

/// Classify a captured outcome against the record's declared expectation
pub fn classify(record: &CaseRecord, out: &CmdOutput) -> Verdict {
    let observed_text = out.stdout.clone();
    let error_text = out.error.as_deref().map(|bytes| {
        String::from_utf8_lossy(bytes).into_owned()
    });

    let expectation = match record.expectation() {
        Ok(expectation) => expectation,
        Err(e) => {
            return Verdict::fail(
                VerdictKind::SpecError,
                error_text.or(observed_text),
                Some(e.to_string()),
            )
        }
    };

    match expectation {
        Expectation::Output(expected_text) => {
            if let Some(error) = error_text {
                return Verdict::fail(
                    VerdictKind::UnexpectedError,
                    Some(error),
                    Some(expected_text.to_string()),
                );
            }
            let observed = Payload::parse(observed_text.as_deref().unwrap_or(""));
            let expected = Payload::parse(expected_text);

            if observed.shape() != expected.shape() {
                return Verdict::fail(
                    VerdictKind::ShapeMismatch,
                    Some(format!("{} payload: {}", observed.shape(), observed_text.unwrap_or_default())),
                    Some(format!("{} payload: {}", expected.shape(), expected_text)),
                );
            }
            if expected.len().map_or(false, |n| n > 0) && observed.is_empty() {
                return Verdict::fail(
                    VerdictKind::DegenerateOutput,
                    observed_text,
                    Some(expected_text.to_string()),
                );
            }
            Verdict::pass(VerdictKind::OutputMatched, observed_text, Some(expected_text.to_string()))
        }

        Expectation::Xfail(xfail) => match (error_text, &xfail.error) {
            // expected to fail, but came back green: flag the regression
            (None, _) => Verdict::fail(
                VerdictKind::XfailUnexpectedPass,
                observed_text,
                Some("command failure".to_string()),
            ),
            (Some(error), Some(expected_error)) => {
                if &error == expected_error {
                    Verdict::fail(
                        VerdictKind::XfailConfirmed,
                        Some(error),
                        Some(expected_error.clone()),
                    )
                } else {
                    Verdict::pass(
                        VerdictKind::XfailNotReproduced,
                        Some(error),
                        Some(expected_error.clone()),
                    )
                }
            }
            // a bare xfail cannot classify an observed failure
            (Some(error), None) => Verdict::fail(
                VerdictKind::SpecError,
                Some(error),
                Some("xfail with no declared error text".to_string()),
            ),
        },

        Expectation::Error => {
            if let Some(error) = error_text {
                Verdict::pass(VerdictKind::ErrorMatched, Some(error), None)
            } else {
                Verdict::fail(
                    VerdictKind::ErrorMissing,
                    observed_text,
                    Some("any command failure".to_string()),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::record::Xfail;

    fn output_case(command: &str, output: &str) -> CaseRecord {
        CaseRecord {
            command: command.to_string(),
            output: Some(output.to_string()),
            xfail: None,
            error: None,
        }
    }

    fn xfail_case(command: &str, error: Option<&str>) -> CaseRecord {
        CaseRecord {
            command: command.to_string(),
            output: None,
            xfail: Some(Xfail {
                error: error.map(str::to_string),
            }),
            error: None,
        }
    }

    #[test]
    fn test_split_command_respects_quotes() {
        let words = split_command("device show --hostname 'leaf 01' --columns=name").unwrap();
        assert_eq!(words, vec!["device", "show", "--hostname", "leaf 01", "--columns=name"]);
    }

    #[test]
    fn test_split_command_rejects_unbalanced_quotes() {
        assert!(matches!(
            split_command("device show 'oops"),
            Err(Error::UnbalancedQuote(_))
        ));
        assert!(matches!(split_command("   "), Err(Error::EmptyCommand)));
    }

    #[test]
    fn test_payload_falls_back_to_raw_text() {
        let payload = Payload::parse("not json at all");
        assert_eq!(payload.shape(), Shape::Text);

        let payload = Payload::parse("[1, 2, 3]");
        assert_eq!(payload.shape(), Shape::List);
        assert_eq!(payload.len(), Some(3));
    }

    #[test]
    fn test_empty_list_matches_empty_list() {
        let record = output_case("device unique --columns=namespace --namespace=foo", "[]");
        let verdict = classify(&record, &CmdOutput::success("[]\n"));
        assert!(verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::OutputMatched);
    }

    #[test]
    fn test_list_expectation_rejects_scalar_payload() {
        let record = output_case("device show", "[{\"name\": \"leaf01\"}]");
        let verdict = classify(&record, &CmdOutput::success("4"));
        assert!(!verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::ShapeMismatch);

        // and the reverse direction
        let record = output_case("device count", "4");
        let verdict = classify(&record, &CmdOutput::success("[]"));
        assert!(!verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::ShapeMismatch);
    }

    #[test]
    fn test_nonempty_expectation_rejects_empty_payload() {
        let record = output_case("device show", "[{\"name\": \"leaf01\"}]");
        let verdict = classify(&record, &CmdOutput::success("[]"));
        assert!(!verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::DegenerateOutput);
    }

    #[test]
    fn test_structural_match_ignores_content_drift() {
        let record = output_case("device show", "[{\"name\": \"leaf01\"}]");
        let verdict = classify(&record, &CmdOutput::success("[{\"name\": \"spine02\"}]"));
        assert!(verdict.passed);
    }

    #[test]
    fn test_raw_fallback_still_produces_a_verdict() {
        let record = output_case("device show --format=text", "plain text table");
        let verdict = classify(&record, &CmdOutput::success("another text table"));
        assert!(verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::OutputMatched);
    }

    #[test]
    fn test_command_failure_under_output_expectation_fails() {
        let record = output_case("device show", "[]");
        let verdict = classify(&record, &CmdOutput::failure(1, "boom"));
        assert!(!verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::UnexpectedError);
        assert_eq!(verdict.observed.as_deref(), Some("boom"));
    }

    #[test]
    fn test_xfail_confirmed_still_broken_fails() {
        let record = xfail_case("ospf show", Some("boom"));
        let verdict = classify(&record, &CmdOutput::failure(1, "boom"));
        assert!(!verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::XfailConfirmed);
    }

    #[test]
    fn test_xfail_with_different_error_passes_for_attention() {
        let record = xfail_case("ospf show", Some("boom"));
        let verdict = classify(&record, &CmdOutput::failure(1, "a different failure"));
        assert!(verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::XfailNotReproduced);
    }

    #[test]
    fn test_xfail_unexpectedly_green_fails() {
        let record = xfail_case("ospf show", Some("boom"));
        let verdict = classify(&record, &CmdOutput::success("[]"));
        assert!(!verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::XfailUnexpectedPass);
    }

    #[test]
    fn test_bare_xfail_with_an_error_is_a_spec_error() {
        let record = xfail_case("ospf show", None);
        let verdict = classify(&record, &CmdOutput::failure(1, "boom"));
        assert!(!verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::SpecError);
    }

    #[test]
    fn test_error_marker_requires_any_failure() {
        let record = CaseRecord {
            command: "bgp assert --namespace=foo".to_string(),
            output: None,
            xfail: None,
            error: Some(serde_yaml::Value::Bool(true)),
        };
        let verdict = classify(&record, &CmdOutput::failure(1, "assert failed"));
        assert!(verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::ErrorMatched);

        let verdict = classify(&record, &CmdOutput::success("all good"));
        assert!(!verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::ErrorMissing);
    }

    #[test]
    fn test_missing_expectation_is_a_distinct_kind() {
        let record = CaseRecord {
            command: "device show".to_string(),
            output: None,
            xfail: None,
            error: None,
        };
        let verdict = classify(&record, &CmdOutput::success("[]"));
        assert!(!verdict.passed);
        assert_eq!(verdict.kind, VerdictKind::SpecError);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let record = output_case("device show", "[1]");
        let out = CmdOutput::success("[2, 3]");
        let first = classify(&record, &out);
        let second = classify(&record, &out);
        assert_eq!(first.passed, second.passed);
        assert_eq!(first.kind, second.kind);
    }
}
