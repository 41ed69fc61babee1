use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 保存在请求定义上的响应断言
///
/// `field` 可以是 `status`、`response_time`（毫秒）、`header.<Name>`，
/// 或响应体的点分路径（可带 `body.` 前缀）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub field: String,
    pub operator: AssertOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
}

impl Assertion {
    pub fn new(field: impl Into<String>, operator: AssertOperator, expected: Option<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            expected,
        }
    }

    pub fn target(&self) -> AssertTarget {
        AssertTarget::parse(&self.field)
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.operator)?;
        if let Some(expected) = &self.expected {
            write!(f, " {}", expected)?;
        }
        Ok(())
    }
}

/// 断言实际值的来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertTarget {
    Status,
    ResponseTime,
    Header(String),
    Body(String),
}

impl AssertTarget {
    pub fn parse(field: &str) -> Self {
        let field = field.trim();
        match field {
            "status" | "status_code" => Self::Status,
            "response_time" => Self::ResponseTime,
            _ => {
                if let Some(name) = field
                    .strip_prefix("header.")
                    .or_else(|| field.strip_prefix("headers."))
                {
                    Self::Header(name.to_string())
                } else {
                    let path = field.strip_prefix("body.").unwrap_or(field);
                    Self::Body(path.to_string())
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Exists,
    NotExists,
}

impl AssertOperator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "equals" | "==" => Some(Self::Equals),
            "not_equals" | "!=" => Some(Self::NotEquals),
            "contains" => Some(Self::Contains),
            "not_contains" => Some(Self::NotContains),
            "greater_than" | ">" => Some(Self::GreaterThan),
            "less_than" | "<" => Some(Self::LessThan),
            "greater_than_or_equal" | ">=" => Some(Self::GreaterThanOrEqual),
            "less_than_or_equal" | "<=" => Some(Self::LessThanOrEqual),
            "exists" => Some(Self::Exists),
            "not_exists" => Some(Self::NotExists),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::GreaterThanOrEqual => "greater_than_or_equal",
            Self::LessThanOrEqual => "less_than_or_equal",
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
        }
    }
}

impl fmt::Display for AssertOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个断言的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionResult {
    /// 原始断言
    pub raw: String,
    pub passed: bool,
    /// 实际值（找不到时为 None）
    pub actual: Option<String>,
    pub message: Option<String>,
}

impl AssertionResult {
    pub fn success(raw: String, actual: Option<String>) -> Self {
        Self {
            raw,
            passed: true,
            actual,
            message: None,
        }
    }

    pub fn failure(raw: String, actual: Option<String>, message: String) -> Self {
        Self {
            raw,
            passed: false,
            actual,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_parse() {
        assert_eq!(AssertOperator::parse("equals"), Some(AssertOperator::Equals));
        assert_eq!(AssertOperator::parse("=="), Some(AssertOperator::Equals));
        assert_eq!(AssertOperator::parse(">="), Some(AssertOperator::GreaterThanOrEqual));
        assert_eq!(AssertOperator::parse("not_exists"), Some(AssertOperator::NotExists));
        assert_eq!(AssertOperator::parse("matches"), None);
    }

    #[test]
    fn test_target_parse() {
        assert_eq!(AssertTarget::parse("status"), AssertTarget::Status);
        assert_eq!(AssertTarget::parse("response_time"), AssertTarget::ResponseTime);
        assert_eq!(
            AssertTarget::parse("header.Content-Type"),
            AssertTarget::Header("Content-Type".to_string())
        );
        assert_eq!(
            AssertTarget::parse("body.user.id"),
            AssertTarget::Body("user.id".to_string())
        );
        assert_eq!(
            AssertTarget::parse("data.0.name"),
            AssertTarget::Body("data.0.name".to_string())
        );
    }

    #[test]
    fn test_assertion_json_shape() {
        let assertion: Assertion = serde_json::from_value(json!({
            "field": "status",
            "operator": "equals",
            "expected": 200
        }))
        .unwrap();
        assert_eq!(assertion.operator, AssertOperator::Equals);
        assert_eq!(assertion.to_string(), "status equals 200");

        let exists: Assertion =
            serde_json::from_value(json!({"field": "id", "operator": "exists"})).unwrap();
        assert_eq!(exists.expected, None);
        assert_eq!(exists.to_string(), "id exists");
    }
}
