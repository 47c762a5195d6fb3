// src/exec/output.rs

//! Line grammar of the analysis binaries.
//!
//! A result line looks like
//!
//! ```text
//! Processing: /abs/uploads/A_G7_1.jpg - Result: 0.93*
//! ```
//!
//! Anything else a binary prints (progress, warnings, banners) is ignored.
//! This is the only place that knows the format.

use tracing::trace;

use crate::types::ExecutionRecord;

const RESULT_SEPARATOR: &str = " Result: ";
const FIELD_SEPARATOR: &str = ": ";

/// Parse one output line of `command` into a record, or `None` if the line
/// is not a result line.
pub fn parse_line(line: &str, command: &str) -> Option<ExecutionRecord> {
    let mut parts = line.split(RESULT_SEPARATOR);
    let (left, right) = match (parts.next(), parts.next(), parts.next()) {
        (Some(left), Some(right), None) => (left, right),
        _ => {
            trace!(command, line, "skipping non-result line");
            return None;
        }
    };

    let Some(path) = left.split(FIELD_SEPARATOR).nth(1) else {
        trace!(command, line, "result line without a path field");
        return None;
    };

    let image = image_name_from_path(path);
    if image.is_empty() {
        trace!(command, line, "result line with an empty image name");
        return None;
    }

    let value = right.replace('*', "");
    Some(ExecutionRecord::new(image, command, value.trim()))
}

/// Parse every line of a batch's output, dropping the ones that are not
/// result lines.
pub fn parse_output<S: AsRef<str>>(lines: &[S], command: &str) -> Vec<ExecutionRecord> {
    lines
        .iter()
        .filter_map(|line| parse_line(line.as_ref(), command))
        .collect()
}

/// Basename (either separator style), trimmed of `' '`/`'-'`, extension removed.
fn image_name_from_path(path: &str) -> &str {
    let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let base = base.trim_matches(|c| c == ' ' || c == '-');
    strip_extension(base)
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        // A leading dot is a hidden file, not an extension.
        Some(idx) if idx > 0 && !name[..idx].chars().all(|c| c == '.') => &name[..idx],
        _ => name,
    }
}
