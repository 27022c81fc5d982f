//! Ariadne-based rendering for module issues.
//!
//! Renders [`Issue`] values into formatted, labeled reports. Output is
//! colorless so test assertions and snapshots stay stable across
//! terminals.

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use aven_common::{Issue, Severity};

/// Render one issue against its source text.
pub fn render_issue(issue: &Issue, source: &str) -> String {
    let config = Config::default().with_color(false);
    let source_len = source.len();

    // ariadne needs an in-bounds, non-empty span
    let clamp = |r: std::ops::Range<usize>| -> std::ops::Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        if s == e {
            s..e.saturating_add(1).min(source_len.max(1))
        } else {
            s..e
        }
    };
    let range = clamp(issue.span.to_range());

    let (kind, color) = match issue.severity {
        Severity::Error => (ReportKind::Error, Color::Red),
        Severity::Warning => (ReportKind::Warning, Color::Yellow),
    };

    let report = Report::build(kind, range.clone())
        .with_code(issue.code)
        .with_message(&issue.message)
        .with_config(config)
        .with_label(
            Label::new(range)
                .with_message(&issue.message)
                .with_color(color),
        )
        .finish();

    let mut buf = Vec::new();
    report
        .write(Source::from(source), &mut buf)
        .expect("failed to write diagnostic");
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}

/// Render every issue, in order, separated by blank lines.
pub fn render_all<'a>(issues: impl Iterator<Item = &'a Issue>, source: &str) -> String {
    let mut out = String::new();
    for issue in issues {
        out.push_str(&render_issue(issue, source));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use aven_common::Span;

    #[test]
    fn renders_code_and_message() {
        let source = "let x = 42\nx <- 3\n";
        let issue = Issue::error("E0403", "`<-` requires a `@mut` operand", Span::new(13, 15));
        let rendered = render_issue(&issue, source);
        assert!(rendered.contains("E0403"));
        assert!(rendered.contains("`<-` requires a `@mut` operand"));
    }

    #[test]
    fn clamps_out_of_bounds_spans() {
        let issue = Issue::error("E0101", "bad", Span::new(100, 200));
        // must not panic on a span past the end of the source
        let rendered = render_issue(&issue, "short");
        assert!(rendered.contains("E0101"));
    }

    #[test]
    fn warning_renders_as_warning() {
        let issue = Issue::warning("W0201", "unknown attribute `@inline` is ignored", Span::new(0, 7));
        let rendered = render_issue(&issue, "@inline let x = 1");
        assert!(rendered.contains("Warning"));
    }
}
