//! Shared utility functions used across modules.

/// Truncate a string to at most `max_len` bytes, appending "..." if
/// truncated. Cuts land on a char boundary, so the result can come out a
/// little shorter than the cap — provider error bodies carry multibyte text.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let keep = if max_len > 3 { max_len - 3 } else { max_len };
    let mut cut = keep;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    if max_len > 3 {
        format!("{}...", &s[..cut])
    } else {
        s[..cut].to_string()
    }
}

/// Format a duration as a short human-readable string, e.g. "8s" or "2m 30s".
pub fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
