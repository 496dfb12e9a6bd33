use crate::error::ApiError;

pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.len();
    if len < min || len > max {
        return Err(ApiError::Configuration(format!(
            "{field} must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

/// Validate a session/template logical name before normalization (§4.1).
/// Normalization itself tolerates anything; this check rejects empty or
/// absurdly long input up front so a typo doesn't silently become
/// `agentcube-resource`.
pub fn check_name(value: &str) -> Result<(), ApiError> {
    check_length("name", value, 1, 255)
}

pub fn check_labels(labels: &[String]) -> Result<(), ApiError> {
    if labels.len() > 50 {
        return Err(ApiError::Configuration("max 50 labels".into()));
    }
    for label in labels {
        check_length("label", label, 1, 100)?;
    }
    Ok(())
}

/// TTL bounds (§7 "bad TTL" is a `Configuration` error). One second to 24h.
pub fn check_ttl_secs(ttl_secs: i64) -> Result<(), ApiError> {
    if ttl_secs < 1 || ttl_secs > 86_400 {
        return Err(ApiError::Configuration(format!(
            "ttl must be between 1 and 86400 seconds (got {ttl_secs})"
        )));
    }
    Ok(())
}

/// Container port range (§6 workspace-metadata `port` field: 1..=65535).
pub fn check_port(port: u32) -> Result<(), ApiError> {
    if port < 1 || port > 65535 {
        return Err(ApiError::Configuration(format!(
            "port must be between 1 and 65535 (got {port})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_name() {
        assert!(check_name("foo-bar_123.baz").is_ok());
    }

    #[test]
    fn name_too_long() {
        let long = "a".repeat(256);
        assert!(check_name(&long).is_err());
    }

    #[test]
    fn name_empty() {
        assert!(check_name("").is_err());
    }

    #[test]
    fn labels_max() {
        let labels: Vec<String> = (0..51).map(|i| format!("label-{i}")).collect();
        assert!(check_labels(&labels).is_err());
        let labels: Vec<String> = (0..50).map(|i| format!("label-{i}")).collect();
        assert!(check_labels(&labels).is_ok());
    }

    #[test]
    fn ttl_bounds() {
        assert!(check_ttl_secs(0).is_err());
        assert!(check_ttl_secs(900).is_ok());
        assert!(check_ttl_secs(86_401).is_err());
    }

    #[test]
    fn port_bounds() {
        assert!(check_port(0).is_err());
        assert!(check_port(8080).is_ok());
        assert!(check_port(70_000).is_err());
    }
}
