/// Strips the line terminator (`\n` or `\r\n`) from a line read off the wire.
///
/// Everything else, including surrounding whitespace, is kept as sent.
pub fn normalize_line(raw: &str) -> &str {
    let line = raw.strip_suffix('\n').unwrap_or(raw);
    line.strip_suffix('\r').unwrap_or(line)
}
