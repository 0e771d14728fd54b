//! Multi-form evaluation of source text, shared by file mode, `-e` and the REPL.

use log::{debug, info};
use std::path::Path;

use crate::ast::Value;
use crate::environment::Environment;
use crate::evaluator::{EvalConfig, eval_with_config};
use crate::scheme::{read, read_all};
use crate::{Error, SyntaxErrorKind};

/// How [`run_source`] evaluates each form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub eval: EvalConfig,
    /// Sweep unreachable frames after every top-level form
    pub collect_garbage: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            eval: EvalConfig::default(),
            collect_garbage: true,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Forms that were read and evaluated
    pub forms: usize,
    /// Failed forms, a trailing syntax error included
    pub errors: usize,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }
}

/// Drop everything from `;` to the end of each line.
pub fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| line.split_once(';').map_or(line, |(code, _)| code))
        .collect::<Vec<_>>()
        .join("\n")
}

/// True when `text` is cut off inside a list, so a line-oriented reader should ask for more.
pub fn needs_more_input(text: &str) -> bool {
    matches!(
        read_all(&strip_comments(text)),
        Err(e) if e.syntax_kind() == Some(SyntaxErrorKind::UnbalancedParenthesis)
    )
}

/// Read and evaluate every form in `text`, handing each result to `sink`.
///
/// Evaluation errors are reported and the next form still runs. A syntax error is
/// reported and ends the run, since the reader cannot resynchronize.
pub fn run_source<F>(
    text: &str,
    env: &mut Environment,
    options: &RunOptions,
    mut sink: F,
) -> RunSummary
where
    F: FnMut(&Result<Value, Error>),
{
    let source = strip_comments(text);
    let mut rest = source.as_str();
    let mut summary = RunSummary::default();

    while !rest.trim_start().is_empty() {
        let (expr, next) = match read(rest) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("stopping after syntax error: {e}");
                summary.errors += 1;
                sink(&Err(e));
                break;
            }
        };
        rest = next;
        summary.forms += 1;

        debug!("form {}: {expr}", summary.forms);
        let result = eval_with_config(&expr, env, &options.eval);
        if result.is_err() {
            summary.errors += 1;
        }
        sink(&result);

        if options.collect_garbage {
            env.collect_garbage(&[]);
        }
    }

    summary
}

/// Load a file and run it with [`run_source`]. Failing to read the file is an `EvalError`.
pub fn run_file<F>(
    path: &Path,
    env: &mut Environment,
    options: &RunOptions,
    sink: F,
) -> Result<RunSummary, Error>
where
    F: FnMut(&Result<Value, Error>),
{
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::EvalError(format!("cannot read '{}': {e}", path.display())))?;
    info!("loading {} ({} bytes)", path.display(), text.len());
    Ok(run_source(&text, env, options, sink))
}
