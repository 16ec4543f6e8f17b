//! Char-safe string helpers shared by the prompt builders.

/// Truncate to at most `max_chars` chars. Returns the prefix and whether anything was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> (&str, bool) {
    match s.char_indices().nth(max_chars) {
        Some((byte, _)) => (&s[..byte], true),
        None => (s, false),
    }
}

/// Truncate to at most `max_chars` chars, ending in `...` when cut.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars < 3 {
        return ".".repeat(max_chars);
    }
    let keep = max_chars.saturating_sub(3);
    let (prefix, _) = truncate_chars(s, keep);
    format!("{}...", prefix.trim_end())
}

/// Format an integer with `,` thousands separators.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
