/// Substituted for any name that normalizes to the empty string (§4.1).
const DEFAULT_NAME: &str = "agentcube-resource";

/// Maximum length of a DNS-1123 label.
const MAX_LEN: usize = 63;

/// Normalize an arbitrary logical id into the DNS-1123 label subset K8s
/// object names require (§4.1): lowercase alphanumeric or `-`, starting and
/// ending alphanumeric, at most 63 characters.
///
/// Steps, in order: lowercase → replace `_` and space with `-` → drop any
/// other non-conforming character → trim leading/trailing non-alphanumerics
/// → truncate to 63 → substitute [`DEFAULT_NAME`] if the result is empty.
#[must_use]
pub fn normalize(input: &str) -> String {
    let lowered = input.to_lowercase();

    let replaced: String = lowered
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();

    let trimmed = replaced.trim_matches(|c: char| !c.is_ascii_alphanumeric());

    let truncated = if trimmed.len() > MAX_LEN {
        // Truncate on a char boundary (ASCII-only alphabet here, so any byte
        // boundary is a char boundary) and re-trim in case truncation left a
        // trailing '-'.
        trimmed[..MAX_LEN].trim_end_matches(|c: char| !c.is_ascii_alphanumeric())
    } else {
        trimmed
    };

    if truncated.is_empty() {
        DEFAULT_NAME.to_owned()
    } else {
        truncated.to_owned()
    }
}

/// Validate that a string already matches the DNS-1123 label regex
/// `[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?` (§8 invariant 5), without
/// normalizing it.
#[must_use]
pub fn is_valid_dns1123_label(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_LEN {
        return false;
    }
    let bytes = s.as_bytes();
    let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !is_alnum(bytes[0]) || !is_alnum(*bytes.last().unwrap()) {
        return false;
    }
    bytes
        .iter()
        .all(|&b| is_alnum(b) || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases() {
        assert_eq!(normalize("AgentSession"), "agentsession");
    }

    #[test]
    fn replaces_underscore_and_space_with_hyphen() {
        assert_eq!(normalize("my_session name"), "my-session-name");
    }

    #[test]
    fn drops_nonconforming_chars() {
        assert_eq!(normalize("sess!@#ion$%"), "session");
    }

    #[test]
    fn trims_leading_trailing_hyphens() {
        assert_eq!(normalize("--session--"), "session");
    }

    #[test]
    fn truncates_to_63() {
        let long = "a".repeat(100);
        let result = normalize(&long);
        assert_eq!(result.len(), 63);
    }

    #[test]
    fn truncation_retrims_trailing_hyphen() {
        // 62 'a's then a '-' then more 'a's: truncating at 63 lands exactly
        // on the hyphen, which must then be trimmed.
        let input = format!("{}-{}", "a".repeat(62), "b".repeat(10));
        let result = normalize(&input);
        assert!(!result.ends_with('-'));
        assert!(result.len() <= 63);
    }

    #[test]
    fn empty_input_substitutes_default() {
        assert_eq!(normalize(""), DEFAULT_NAME);
        assert_eq!(normalize("___"), DEFAULT_NAME);
        assert_eq!(normalize("!!!"), DEFAULT_NAME);
    }

    #[test]
    fn unicode_input_is_handled() {
        // Non-ASCII characters are dropped entirely, not panicked on.
        let result = normalize("sessión-日本語-ok");
        assert!(is_valid_dns1123_label(&result));
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "AgentSession_123",
            "__weird__",
            "日本語only",
            "-leading-and-trailing-",
            &"x".repeat(200),
            "",
        ];
        for input in inputs {
            let once = normalize(input);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for input {input:?}");
        }
    }

    #[test]
    fn normalized_output_matches_dns1123_regex() {
        let inputs = [
            "AgentSession_123",
            "__weird__",
            "-leading-and-trailing-",
            &"x".repeat(200),
            "",
            "UPPER-CASE_mix 123",
        ];
        for input in inputs {
            let result = normalize(input);
            assert!(
                is_valid_dns1123_label(&result),
                "{result:?} (from {input:?}) is not a valid DNS-1123 label"
            );
        }
    }

    proptest::proptest! {
        #[test]
        fn normalize_is_always_idempotent(s in ".*") {
            let once = normalize(&s);
            let twice = normalize(&once);
            proptest::prop_assert_eq!(once, twice);
        }

        #[test]
        fn normalize_always_produces_valid_label(s in ".*") {
            let result = normalize(&s);
            proptest::prop_assert!(is_valid_dns1123_label(&result));
        }
    }
}
