//! Declarative test cases
//!
//! Fixture files hold sequences of command/expectation records; the
//! evaluator replays them against a captured dataset and classifies each
//! outcome. Assertions are structural, against parsed payloads rather than
//! fragile full-text matching.

mod eval;
mod record;
mod update;

pub use eval::{classify, split_command, Evaluator, Payload, RunContext, Shape, Verdict, VerdictKind};
pub use record::{load_dir, load_fixture, CaseRecord, Expectation, Xfail};
pub use update::update_fixtures;
