//! 从结构化响应体中按点分路径取值
//!
//! 路径如 `data.users.0.id` 按 `.` 分割，逐段作用于当前值:
//! 纯数字段作为数组下标，其他段作为对象 key。
//! 两者用错对象时返回类型不匹配错误

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("empty extraction path")]
    EmptyPath,

    #[error("response body is not a structured document")]
    NotStructured,

    #[error("path '{path}' not found: no key '{segment}'")]
    NotFound { path: String, segment: String },

    #[error("path '{path}': index {index} out of range (length {len})")]
    IndexOutOfRange { path: String, index: usize, len: usize },

    #[error("path '{path}': cannot apply '{segment}' to {found}")]
    TypeMismatch {
        path: String,
        segment: String,
        found: &'static str,
    },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 沿 `path` 在 `value` 中取值
pub fn extract<'a>(value: &'a Value, path: &str) -> Result<&'a Value, ExtractionError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(ExtractionError::EmptyPath);
    }

    let mut current = value;
    for segment in path.split('.') {
        let numeric = !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit());
        current = match current {
            Value::Object(_) if numeric => {
                return Err(ExtractionError::TypeMismatch {
                    path: path.to_string(),
                    segment: segment.to_string(),
                    found: "object",
                });
            }
            Value::Object(map) => map.get(segment).ok_or_else(|| ExtractionError::NotFound {
                path: path.to_string(),
                segment: segment.to_string(),
            })?,
            Value::Array(items) => {
                let index: usize = segment.parse().map_err(|_| ExtractionError::TypeMismatch {
                    path: path.to_string(),
                    segment: segment.to_string(),
                    found: "array",
                })?;
                items.get(index).ok_or(ExtractionError::IndexOutOfRange {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                })?
            }
            scalar => {
                return Err(ExtractionError::TypeMismatch {
                    path: path.to_string(),
                    segment: segment.to_string(),
                    found: kind_of(scalar),
                });
            }
        };
    }

    Ok(current)
}

/// 将 `body` 解析为 JSON 后按 `path` 取值
pub fn extract_from_str(body: &str, path: &str) -> Result<Value, ExtractionError> {
    let value: Value = serde_json::from_str(body).map_err(|_| ExtractionError::NotStructured)?;
    if !matches!(value, Value::Object(_) | Value::Array(_)) {
        return Err(ExtractionError::NotStructured);
    }
    extract(&value, path).cloned()
}
