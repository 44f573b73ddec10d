//! Alias name rules

use once_cell::sync::Lazy;
use regex::Regex;

use queuetester_core::{ErrorCode, StackError};

const REQUIRED_ALIAS_PREFIX: &str = "alias/";
const DISALLOWED_PREFIX: &str = "alias/aws/";

static ALIAS_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9/_-]{1,256}$").expect("static regex"));

/// Prefix `alias/` when missing and check the result is an assignable alias
pub fn normalize_alias_name(name: &str) -> Result<String, StackError> {
    let alias = if name.starts_with(REQUIRED_ALIAS_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", REQUIRED_ALIAS_PREFIX, name)
    };

    if alias == REQUIRED_ALIAS_PREFIX {
        return Err(invalid(&alias, "Alias must include a value after \"alias/\""));
    }
    if alias.to_lowercase().starts_with(DISALLOWED_PREFIX) {
        return Err(invalid(
            &alias,
            "Alias must not start with \"alias/aws/\", that prefix is reserved for AWS managed keys",
        ));
    }
    if !ALIAS_NAME.is_match(&alias) {
        return Err(invalid(
            &alias,
            "Alias may only contain alphanumerics, '/', '_' and '-'",
        ));
    }

    Ok(alias)
}

fn invalid(alias: &str, message: &str) -> StackError {
    StackError::new(ErrorCode::InvalidProperty, format!("{}: {}", message, alias))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_prefix_added() {
        assert_eq!(
            normalize_alias_name("GoQueueTester-KMS").unwrap(),
            "alias/GoQueueTester-KMS"
        );
        assert_eq!(
            normalize_alias_name("alias/GoQueueTester-KMS").unwrap(),
            "alias/GoQueueTester-KMS"
        );
    }

    #[test]
    fn test_invalid_aliases() {
        assert!(normalize_alias_name("alias/").is_err());
        assert!(normalize_alias_name("alias/AWS/lambda").is_err());
        assert!(normalize_alias_name("alias/has space").is_err());
        assert!(normalize_alias_name("alias/queue:tester").is_err());
    }
}
