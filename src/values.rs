//! Value mappings from the command line and from value files.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Parse one `Key=Value` assignment. Only the key is trimmed; the value is
/// taken verbatim (an empty value is a deliberate blank).
pub fn parse_assignment(s: &str) -> Result<(String, String)> {
    let Some((key, value)) = s.split_once('=') else {
        bail!("expected Key=Value, got '{}'", s);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("empty key in '{}'", s);
    }
    Ok((key.to_string(), unescape(value)))
}

/// `\n`, `\t` and `\\` escapes, so multi-line values fit on one line.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Parse value-file content: one `Key=Value` per line, `#` comments and
/// blank lines ignored. Later lines override earlier ones.
pub fn parse_value_text(content: &str) -> Result<HashMap<String, String>> {
    let mut values = HashMap::new();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let (key, value) = parse_assignment(line).with_context(|| format!("line {}", n + 1))?;
        values.insert(key, value);
    }
    Ok(values)
}

/// Load a value file from disk.
pub fn load_value_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read value file: {}", path.display()))?;
    parse_value_text(content.trim_start_matches('\u{feff}'))
        .with_context(|| format!("Invalid value file: {}", path.display()))
}
