//! Logical id derivation from construct paths
//!
//! Ids are computed the same way the AWS CDK computes them so synthesized
//! templates keep stable, recognisable keys:
//! - `Default` components are dropped from the path
//! - a single remaining component is used as-is (non-alphanumerics stripped)
//! - otherwise a human readable prefix is followed by an 8 char path hash

use md5::{Digest, Md5};

use crate::error::{ErrorCode, StackError};

const HIDDEN_ID: &str = "Default";
const HIDDEN_FROM_HUMAN_ID: &str = "Resource";
const PATH_SEP: &str = "/";
const HASH_LEN: usize = 8;
const MAX_HUMAN_LEN: usize = 240;
const MAX_ID_LEN: usize = 255;

/// Compute the logical id for a construct path
pub fn make_unique_id(components: &[&str]) -> Result<String, StackError> {
    let components: Vec<&str> = components
        .iter()
        .copied()
        .filter(|c| *c != HIDDEN_ID)
        .collect();

    if components.is_empty() {
        return Err(StackError::new(
            ErrorCode::InvalidId,
            "Unable to calculate a logical id for an empty path",
        ));
    }

    if components.len() == 1 {
        let top_level = remove_non_alphanumeric(components[0]);
        if !top_level.is_empty() && top_level.len() <= MAX_ID_LEN {
            return Ok(top_level);
        }
    }

    let hash = path_hash(&components);
    let human: String = remove_dupes(&components)
        .into_iter()
        .filter(|c| *c != HIDDEN_FROM_HUMAN_ID)
        .map(remove_non_alphanumeric)
        .collect::<String>()
        .chars()
        .take(MAX_HUMAN_LEN)
        .collect();

    Ok(format!("{}{}", human, hash))
}

fn path_hash(components: &[&str]) -> String {
    let digest = Md5::digest(components.join(PATH_SEP).as_bytes());
    hex::encode(digest)[..HASH_LEN].to_uppercase()
}

/// Collapse a component when the previous one already ends with it
fn remove_dupes<'a>(components: &[&'a str]) -> Vec<&'a str> {
    let mut ret: Vec<&str> = Vec::with_capacity(components.len());
    for &component in components {
        let duplicate = ret.last().is_some_and(|prev| prev.ends_with(component));
        if !duplicate {
            ret.push(component);
        }
    }
    ret
}

fn remove_non_alphanumeric(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_id_is_kept() {
        assert_eq!(make_unique_id(&["ApiUrl"]).unwrap(), "ApiUrl");
        assert_eq!(make_unique_id(&["Api-Url"]).unwrap(), "ApiUrl");
    }

    #[test]
    fn test_resource_component_hidden_from_human_part() {
        assert_eq!(
            make_unique_id(&["MyQueue", "Resource"]).unwrap(),
            "MyQueueE6CA6235"
        );
        assert_eq!(
            make_unique_id(&["GoQueueTester-Queue", "Resource"]).unwrap(),
            "GoQueueTesterQueueEA0BDC5D"
        );
    }

    #[test]
    fn test_nested_path() {
        assert_eq!(
            make_unique_id(&["GoWriterLambda", "ServiceRole", "Resource"]).unwrap(),
            "GoWriterLambdaServiceRole090EED42"
        );
    }

    #[test]
    fn test_default_components_dropped() {
        assert_eq!(
            make_unique_id(&["Default", "MyQueue", "Resource"]).unwrap(),
            make_unique_id(&["MyQueue", "Resource"]).unwrap()
        );
    }

    #[test]
    fn test_dupes_collapsed() {
        assert_eq!(remove_dupes(&["Bucket", "Bucket"]), vec!["Bucket"]);
        assert_eq!(remove_dupes(&["MyBucket", "Bucket"]), vec!["MyBucket"]);
        assert_eq!(remove_dupes(&["Bucket", "Policy"]), vec!["Bucket", "Policy"]);
    }

    #[test]
    fn test_empty_path_fails() {
        let err = make_unique_id(&[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidId);

        let err = make_unique_id(&["Default"]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidId);
    }
}
