//! Rich rendering of emitter errors using ariadne.
//!
//! The emitter reports errors with byte spans into the original source; this
//! module turns those into annotated source snippets for terminals, logs, or
//! web UIs.

use std::io::Write;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use quartz_core::emitter::EmitError;

/// Render an error with source context to stderr.
///
/// # Example
/// ```no_run
/// use quartz::{EmitError, Span, render_error};
///
/// let source = "let x = ghost + u32:1;";
/// let error = EmitError::unresolved("ghost", &Span::new(8, 13));
/// render_error(&error, "example.qz", source);
/// ```
pub fn render_error(error: &EmitError, source_name: &str, source: &str) {
    render_error_to_writer(error, source_name, source, &mut std::io::stderr(), true).ok();
}

/// Render an error to a String (useful for tests, web UIs, etc.)
pub fn render_error_to_string(error: &EmitError, source_name: &str, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source_name, source, &mut buf, true).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Render an error to a String without color codes.
///
/// Same as [`render_error_to_string`] but without ANSI escapes, which makes
/// the output easy to compare in tests.
pub fn render_error_to_string_no_color(
    error: &EmitError,
    source_name: &str,
    source: &str,
) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source_name, source, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    error: &EmitError,
    source_name: &str,
    source: &str,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    // Internal errors carry no span; point them at the start of the source
    // so the report still renders.
    let range = error.span().map(|span| span.0.clone()).unwrap_or(0..0);
    let label_text = match error {
        EmitError::Unsupported { .. } => "this construct cannot be lowered",
        EmitError::Unresolved { .. } => "this name could not be resolved",
        EmitError::Internal(_) => "emitter invariant violated",
    };

    Report::build(ReportKind::Error, (source_name, range.clone()))
        .with_config(Config::default().with_color(use_color))
        .with_message(error.to_string())
        .with_label(
            Label::new((source_name, range))
                .with_message(label_text)
                .with_color(Color::Red),
        )
        .finish()
        .write((source_name, Source::from(source)), writer)
}
