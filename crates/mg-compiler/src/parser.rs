use thiserror::Error;

/// One entry read from a list, with the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub value: String,
    pub line: usize,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON list: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse blocklist text.
///
/// Two forms are accepted: a JSON array of strings (what the settings page
/// exports), or plain text with one entry per line or comma separated.
/// In plain text, `!` and `#` start a comment when they open a line, and
/// ` #` starts a trailing comment.
pub fn parse_list(text: &str) -> Result<Vec<ParsedEntry>, ParseError> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return parse_json_list(text);
    }

    let mut entries = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line = strip_comment(raw_line.trim());
        if line.is_empty() {
            continue;
        }
        for part in line.split(',') {
            let value = part.trim();
            if value.is_empty() {
                continue;
            }
            entries.push(ParsedEntry {
                value: value.to_string(),
                line: idx + 1,
            });
        }
    }

    Ok(entries)
}

fn parse_json_list(text: &str) -> Result<Vec<ParsedEntry>, ParseError> {
    let values: Vec<String> = serde_json::from_str(text)?;
    Ok(values
        .into_iter()
        .filter(|v| !v.trim().is_empty())
        .map(|v| ParsedEntry {
            value: v.trim().to_string(),
            line: 1,
        })
        .collect())
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('#')
}

fn strip_comment(line: &str) -> &str {
    if is_comment_line(line) {
        return "";
    }
    match line.find(" #") {
        Some(idx) => line[..idx].trim_end(),
        None => line,
    }
}
