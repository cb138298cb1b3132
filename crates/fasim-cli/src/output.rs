//! Shared output layer for pretty/text/JSON parity across all commands.
//!
//! Precedence for the output mode (highest wins):
//! 1. `--json`
//! 2. `FASIM_FORMAT` env var: `pretty` | `text` | `json`
//! 3. Pretty if stdout is a TTY, text if piped.
//!
//! Results go to stdout, errors to stderr.

use fasim_core::{ErrorCode, RepoError};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<16} {}", format!("{key}:"), value.as_ref())
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-optimized output with sections and rules.
    Pretty,
    /// Tab-separated rows for scripts and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

fn resolve_output_mode_inner(json_flag: bool, format_env: Option<&str>, is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    if let Some(val) = format_env {
        match val.trim().to_ascii_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "text" => return OutputMode::Text,
            "pretty" => return OutputMode::Pretty,
            _ => {}
        }
    }

    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from the `--json` flag, environment, and TTY.
pub fn resolve_output_mode(json_flag: bool) -> OutputMode {
    let env_val = std::env::var("FASIM_FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(json_flag, env_val.as_deref(), is_tty)
}

/// Render a serializable value with explicit pretty/text renderers.
///
/// # Errors
///
/// Returns an error if writing to stdout or JSON serialization fails.
pub fn render_mode<T: Serialize + ?Sized>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// Acknowledgement for commands that change state without returning an entity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub ok: bool,
    pub action: &'static str,
    pub entity: String,
    pub id: i64,
}

impl Ack {
    pub fn new(action: &'static str, entity: impl ToString, id: i64) -> Self {
        Self {
            ok: true,
            action,
            entity: entity.to_string(),
            id,
        }
    }
}

/// Render an [`Ack`] to stdout.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn render_ack(mode: OutputMode, ack: &Ack) -> anyhow::Result<()> {
    render_mode(
        mode,
        ack,
        |a, w| writeln!(w, "{}\t{}\t{}", a.action, a.entity, a.id),
        |a, w| writeln!(w, "✓ {} {} {}", a.action, a.entity, a.id),
    )
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (`E####`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Create an error with a suggestion and error code.
    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: Some(error_code.into()),
        }
    }

    fn from_code(message: String, code: ErrorCode) -> Self {
        Self {
            message,
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }

    /// Classify a command failure by the first recognised cause in its chain.
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        let message = format!("{error:#}");
        for cause in error.chain() {
            if let Some(cli) = cause.downcast_ref::<Self>() {
                return Self {
                    message: cli.message.clone(),
                    suggestion: cli.suggestion.clone(),
                    error_code: cli.error_code.clone(),
                };
            }
            if let Some(repo) = cause.downcast_ref::<RepoError>() {
                return Self::from_code(message, repo.error_code());
            }
            if cause.is::<toml::de::Error>() {
                return Self::from_code(message, ErrorCode::ConfigParseError);
            }
            if cause.is::<serde_json::Error>() {
                return Self::from_code(message, ErrorCode::InvalidInput);
            }
            if cause.is::<rusqlite::Error>() {
                return Self::from_code(message, ErrorCode::StorageFailure);
            }
        }

        Self {
            message,
            suggestion: None,
            error_code: None,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

impl From<&RepoError> for CliError {
    fn from(err: &RepoError) -> Self {
        Self::from_code(err.to_string(), err.error_code())
    }
}

/// Render an error to stderr in the requested format.
///
/// # Errors
///
/// Returns an error if writing to stderr fails.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}
