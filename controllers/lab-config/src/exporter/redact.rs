//! Credential redaction for printed file diffs

use regex::Regex;
use std::sync::LazyLock;

/// Replacement for redacted values
pub const REDACTED: &str = "<TOKEN>";

static PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        // token: value, password=value
        (
            r"(?i)(token|password|key|secret|api_key|auth_token|bearer_token|access_token|refresh_token|client_secret|private_key|passphrase|credential)(\s*[:=]\s*)([^\s]+)",
            "${1}${2}<TOKEN>",
        ),
        // TOKEN=value
        (
            r"(?i)(TOKEN|PASSWORD|KEY|SECRET|API_KEY|AUTH_TOKEN|BEARER_TOKEN|ACCESS_TOKEN|REFRESH_TOKEN|CLIENT_SECRET|PRIVATE_KEY|PASSPHRASE|CREDENTIAL)(\s*=\s*)([^\s]+)",
            "${1}${2}<TOKEN>",
        ),
        // "token": "value"
        (
            r#"(?i)(")(token|password|key|secret|api_key|auth_token|bearer_token|access_token|refresh_token|client_secret|private_key|passphrase|credential)("\s*[:=]\s*")([^"]+)(")"#,
            "${1}${2}${3}<TOKEN>${5}",
        ),
        // 'token': 'value'
        (
            r"(?i)(')(token|password|key|secret|api_key|auth_token|bearer_token|access_token|refresh_token|client_secret|private_key|passphrase|credential)('\s*[:=]\s*')([^']+)(')",
            "${1}${2}${3}<TOKEN>${5}",
        ),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("redaction pattern is valid"), replacement))
    .collect()
});

/// Replace credential values in `text` with [`REDACTED`]
pub fn redact(text: &str) -> String {
    PATTERNS
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| {
            pattern.replace_all(&acc, *replacement).into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_values_are_redacted() {
        assert_eq!(redact("token: abc123"), "token: <TOKEN>");
        assert_eq!(redact("+  password:hunter2\n"), "+  password:<TOKEN>\n");
    }

    #[test]
    fn test_non_credentials_are_kept() {
        assert_eq!(redact("host: example.com"), "host: example.com");
        assert_eq!(redact("endpoint: grpc.lab:443\n"), "endpoint: grpc.lab:443\n");
    }

    #[test]
    fn test_env_assignments_are_redacted() {
        assert_eq!(redact("Environment=JMP_TOKEN=abc"), "Environment=JMP_TOKEN=<TOKEN>");
        assert_eq!(redact("CLIENT_SECRET = xyz"), "CLIENT_SECRET = <TOKEN>");
    }

    #[test]
    fn test_quoted_values_are_redacted() {
        assert_eq!(redact(r#""password": "s3cr3t""#), r#""password": "<TOKEN>""#);
        assert_eq!(redact("'api_key': 'xyz'"), "'api_key': '<TOKEN>'");
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(redact("Bearer_Token: t0k"), "Bearer_Token: <TOKEN>");
    }
}
