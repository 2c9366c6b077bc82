//! Shared utility functions used across the codebase.

/// Truncate `s` to at most `max_chars` characters, appending `"..."` when
/// anything was cut. Operates on character boundaries so multi-byte input
/// never panics.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Convert an arbitrary string into a valid resource-name segment.
///
/// Lowercases, replaces anything outside `[a-z0-9]` with `-`, trims leading
/// and trailing `-`, and truncates to `max_len`.
pub fn sanitize_name(s: &str, max_len: usize) -> String {
    let mut b = String::with_capacity(s.len());
    for c in s.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            b.push(c);
        } else {
            b.push('-');
        }
    }
    let mut result = b.trim_matches('-').to_string();
    if result.len() > max_len {
        result.truncate(max_len);
        result = result.trim_end_matches('-').to_string();
    }
    result
}

/// Parse an environment variable into `T`, returning `default` when unset.
///
/// An unparsable value is reported to the caller rather than silently
/// replaced, so a typo in deployment config fails fast.
pub fn env_var_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("invalid value for {name}: {value:?}")),
        Err(_) => Ok(default),
    }
}

/// Parse an environment variable as a boolean, returning `default` if unset.
///
/// Recognises `1`, `true`, `yes`, `y`, `on` (case-insensitive) as `true`;
/// any other set value maps to `false`.
pub fn env_var_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_input_unchanged() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
    }

    #[test]
    fn truncate_exact_length_unchanged() {
        assert_eq!(truncate_with_ellipsis("hello", 5), "hello");
    }

    #[test]
    fn truncate_is_char_boundary_safe() {
        let out = truncate_with_ellipsis("héllo wörld", 4);
        assert_eq!(out, "héll...");
    }

    #[test]
    fn sanitize_lowercases_and_replaces() {
        assert_eq!(sanitize_name("KubePodCrashLooping", 40), "kubepodcrashlooping");
        assert_eq!(sanitize_name("Alert: CPU/Memory!", 40), "alert--cpu-memory");
    }

    #[test]
    fn sanitize_trims_dashes() {
        assert_eq!(sanitize_name("--weird--", 40), "weird");
    }

    #[test]
    fn sanitize_truncates_and_trims_trailing_dash() {
        assert_eq!(sanitize_name("abc def", 4), "abc");
    }

    #[test]
    fn sanitize_degenerate_input_is_empty() {
        assert_eq!(sanitize_name("!!!", 40), "");
    }

    #[test]
    fn env_var_bool_recognises_truthy_forms() {
        std::env::set_var("KUBESAGE_TEST_BOOL", "YES");
        assert!(env_var_bool("KUBESAGE_TEST_BOOL", false));
        std::env::set_var("KUBESAGE_TEST_BOOL", "0");
        assert!(!env_var_bool("KUBESAGE_TEST_BOOL", true));
        std::env::remove_var("KUBESAGE_TEST_BOOL");
        assert!(env_var_bool("KUBESAGE_TEST_BOOL", true));
    }
}
