//! Rendering of translation failures for the terminal.

use std::{fs, ops::Range};

use ariadne::{Label, Report, ReportKind, Source};
use gbr_errors::compile::TranslationFailure;
use tracing::error;

/// Prints `failure` to standard error.
///
/// When the failure is attributed to a line of the `source` file and that file
/// can be read, the offending line is shown along with the error.
pub fn report_failure(source: &str, failure: &TranslationFailure) {
    let line = failure.location.as_ref().and_then(|l| l.line);
    let text = fs::read_to_string(source).ok();

    let (Some(line), Some(text)) = (line, text) else {
        error!("{failure}");
        return;
    };
    let Some(span) = line_span(&text, line) else {
        error!("{failure}");
        return;
    };

    let rendered = Report::build(ReportKind::Error, source, span.start)
        .with_message(format!("Failed to translate `{}`", failure.function))
        .with_label(Label::new((source, span)).with_message(failure.error.to_string()))
        .finish()
        .eprint((source, Source::from(text)));
    if rendered.is_err() {
        error!("{failure}");
    }
}

/// Gets the byte range of the 1-based `line` in `text`, excluding its line
/// terminator.
fn line_span(text: &str, line: u32) -> Option<Range<usize>> {
    let index = usize::try_from(line.checked_sub(1)?).ok()?;
    let mut start = 0;
    for (i, content) in text.split_inclusive('\n').enumerate() {
        if i == index {
            let trimmed = content.trim_end_matches(['\n', '\r']);
            return Some(start..start + trimmed.len());
        }
        start += content.len();
    }

    None
}

#[cfg(test)]
mod test {
    use crate::report::line_span;

    #[test]
    fn finds_lines_by_number() {
        let text = "int f() {\n  return x;\n}\n";
        assert_eq!(line_span(text, 1), Some(0..9));
        assert_eq!(line_span(text, 2), Some(10..21));
        assert_eq!(line_span(text, 3), Some(22..23));
        assert_eq!(line_span(text, 4), None);
        assert_eq!(line_span(text, 0), None);
    }
}
