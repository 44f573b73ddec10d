//! CloudFormation intrinsic functions and pseudo parameters

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

/// Pseudo parameters resolved by CloudFormation at deploy time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    AccountId,
    Region,
    Partition,
    UrlSuffix,
    StackName,
}

impl Pseudo {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountId => "AWS::AccountId",
            Self::Region => "AWS::Region",
            Self::Partition => "AWS::Partition",
            Self::UrlSuffix => "AWS::URLSuffix",
            Self::StackName => "AWS::StackName",
        }
    }

    pub fn to_value(self) -> Value {
        ref_(self.as_str())
    }
}

/// `{"Ref": "<logical id>"}`
pub fn ref_(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": ["<logical id>", "<attribute>"]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Join": ["<delimiter>", [parts...]]}`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{"Fn::Sub": "<template>"}`
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

/// A resource a template value points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Ref(String),
    GetAtt { logical_id: String, attribute: String },
}

impl Reference {
    pub fn logical_id(&self) -> &str {
        match self {
            Self::Ref(id) => id,
            Self::GetAtt { logical_id, .. } => logical_id,
        }
    }
}

static SUB_VARIABLE: Lazy<Regex> = Lazy::new(|| {
    // ${Name} or ${Name.Attribute}; ${!Literal} is an escape and never a reference
    Regex::new(r"\$\{([A-Za-z0-9:]+)(?:\.([A-Za-z0-9.]+))?\}").expect("static regex")
});

/// Collect every resource reference inside a template value.
///
/// Pseudo parameters (`AWS::*`) are skipped since they are always resolvable.
pub fn collect_references(value: &Value) -> Vec<Reference> {
    let mut refs = Vec::new();
    walk(value, &mut refs);
    refs
}

fn walk(value: &Value, refs: &mut Vec<Reference>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(id)) = map.get("Ref") {
                    if !id.starts_with("AWS::") {
                        refs.push(Reference::Ref(id.clone()));
                    }
                    return;
                }
                if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                    if let [Value::String(id), Value::String(attr)] = parts.as_slice() {
                        refs.push(Reference::GetAtt {
                            logical_id: id.clone(),
                            attribute: attr.clone(),
                        });
                        return;
                    }
                }
                if let Some(sub) = map.get("Fn::Sub") {
                    collect_sub_references(sub, refs);
                    return;
                }
            }
            for nested in map.values() {
                walk(nested, refs);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, refs);
            }
        }
        _ => {}
    }
}

fn collect_sub_references(sub: &Value, refs: &mut Vec<Reference>) {
    let (template, variables) = match sub {
        Value::String(template) => (template.as_str(), None),
        Value::Array(parts) => match parts.as_slice() {
            [Value::String(template), Value::Object(vars)] => (template.as_str(), Some(vars)),
            _ => return,
        },
        _ => return,
    };

    if let Some(vars) = variables {
        for var in vars.values() {
            walk(var, refs);
        }
    }

    for captures in SUB_VARIABLE.captures_iter(template) {
        let name = &captures[1];
        if name.starts_with("AWS::") || variables.is_some_and(|v| v.contains_key(name)) {
            continue;
        }
        match captures.get(2) {
            Some(attr) => refs.push(Reference::GetAtt {
                logical_id: name.to_string(),
                attribute: attr.as_str().to_string(),
            }),
            None => refs.push(Reference::Ref(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic_shapes() {
        assert_eq!(ref_("Queue"), json!({"Ref": "Queue"}));
        assert_eq!(
            get_att("Queue", "Arn"),
            json!({"Fn::GetAtt": ["Queue", "Arn"]})
        );
        assert_eq!(
            join("", vec![json!("arn:"), Pseudo::Partition.to_value()]),
            json!({"Fn::Join": ["", ["arn:", {"Ref": "AWS::Partition"}]]})
        );
    }

    #[test]
    fn test_collect_references_skips_pseudo_parameters() {
        let value = json!({
            "Roles": [{"Ref": "Role"}],
            "Resource": {"Fn::GetAtt": ["Queue", "Arn"]},
            "Region": {"Ref": "AWS::Region"}
        });

        let refs = collect_references(&value);
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&Reference::Ref("Role".to_string())));
        assert!(refs.contains(&Reference::GetAtt {
            logical_id: "Queue".to_string(),
            attribute: "Arn".to_string(),
        }));
    }

    #[test]
    fn test_collect_sub_references() {
        let value = sub("arn:${AWS::Partition}:sqs:${Queue.Arn}/${Api}/${!Literal}");
        let refs = collect_references(&value);
        assert_eq!(
            refs,
            vec![
                Reference::GetAtt {
                    logical_id: "Queue".to_string(),
                    attribute: "Arn".to_string(),
                },
                Reference::Ref("Api".to_string()),
            ]
        );
    }

    #[test]
    fn test_sub_variables_are_local() {
        let value = json!({"Fn::Sub": ["${Bucket}/${Key}", {"Bucket": {"Ref": "Assets"}}]});
        let refs = collect_references(&value);
        assert_eq!(
            refs,
            vec![
                Reference::Ref("Assets".to_string()),
                Reference::Ref("Key".to_string()),
            ]
        );
    }
}
