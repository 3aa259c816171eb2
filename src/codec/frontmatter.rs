//! Splits a content file into its YAML header and body.

pub const FRONT_MATTER_DELIMITER: &str = "---";

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']) == FRONT_MATTER_DELIMITER
}

/// Returns the header text (without delimiters) and the body.
///
/// Content that does not open with a delimiter line has no header and is all body. An opening
/// delimiter without a matching closing one is an error.
pub fn split_front_matter(content: &str) -> Result<(Option<&str>, &str), String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');
    let opened = lines.next().map(is_delimiter).unwrap_or(false);
    if !opened {
        return Ok((None, content));
    }
    let header_start = content
        .find('\n')
        .map(|idx| idx + 1)
        .unwrap_or(content.len());
    let mut offset = header_start;
    for line in lines {
        if is_delimiter(line) {
            let header = content[header_start..offset].trim_end_matches(['\r', '\n']);
            let body = &content[offset + line.len()..];
            return Ok((Some(header), body));
        }
        offset += line.len();
    }
    Err(format!(
        "opening '{FRONT_MATTER_DELIMITER}' has no closing delimiter"
    ))
}
