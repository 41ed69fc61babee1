use serde_json::Value;

use crate::assertion::types::{AssertOperator, AssertTarget, Assertion, AssertionResult};
use crate::http::Response;
use crate::variable::{VariableResolver, extract};

/// 对响应执行单个断言
///
/// `body` 为已解析的响应体（解析失败时为 None），`elapsed_ms` 为
/// 实测请求耗时
pub fn evaluate_assertion(
    assertion: &Assertion,
    response: &Response,
    body: Option<&Value>,
    elapsed_ms: u64,
) -> AssertionResult {
    let raw = assertion.to_string();
    let actual = actual_value(&assertion.target(), response, body, elapsed_ms);
    let actual_str = actual.as_ref().map(VariableResolver::value_to_string);

    match check(assertion.operator, actual.as_ref(), assertion.expected.as_ref()) {
        Ok(true) => AssertionResult::success(raw, actual_str),
        Ok(false) => {
            let shown = actual_str.clone().unwrap_or_else(|| "nothing".to_string());
            let message = format!("Assertion failed: {} (actual: {})", raw, shown);
            AssertionResult::failure(raw, actual_str, message)
        }
        Err(reason) => AssertionResult::failure(raw, actual_str, reason),
    }
}

/// 按顺序执行所有断言
pub fn evaluate_all(
    assertions: &[Assertion],
    response: &Response,
    body: Option<&Value>,
    elapsed_ms: u64,
) -> Vec<AssertionResult> {
    assertions
        .iter()
        .map(|a| evaluate_assertion(a, response, body, elapsed_ms))
        .collect()
}

fn actual_value(
    target: &AssertTarget,
    response: &Response,
    body: Option<&Value>,
    elapsed_ms: u64,
) -> Option<Value> {
    match target {
        AssertTarget::Status => Some(Value::from(response.status.code())),
        AssertTarget::ResponseTime => Some(Value::from(elapsed_ms)),
        AssertTarget::Header(name) => response.header(name).map(|v| Value::String(v.to_string())),
        AssertTarget::Body(path) => body.and_then(|b| extract(b, path).ok()).cloned(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => s.contains(&VariableResolver::value_to_string(expected)),
        Value::Array(items) => items.iter().any(|item| loosely_equal(item, expected)),
        Value::Object(map) => expected.as_str().is_some_and(|key| map.contains_key(key)),
        _ => false,
    }
}

fn check(op: AssertOperator, actual: Option<&Value>, expected: Option<&Value>) -> Result<bool, String> {
    use AssertOperator::*;

    let expected = || expected.ok_or_else(|| format!("operator '{}' needs an expected value", op));
    let compare = |e: &Value, cmp: fn(f64, f64) -> bool| match (actual.and_then(as_number), as_number(e)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    };

    Ok(match op {
        Exists => actual.is_some(),
        NotExists => actual.is_none(),
        Equals => {
            let e = expected()?;
            actual.is_some_and(|a| loosely_equal(a, e))
        }
        NotEquals => {
            let e = expected()?;
            !actual.is_some_and(|a| loosely_equal(a, e))
        }
        Contains => {
            let e = expected()?;
            actual.is_some_and(|a| contains(a, e))
        }
        NotContains => {
            let e = expected()?;
            !actual.is_some_and(|a| contains(a, e))
        }
        GreaterThan => compare(expected()?, |a, b| a > b),
        LessThan => compare(expected()?, |a, b| a < b),
        GreaterThanOrEqual => compare(expected()?, |a, b| a >= b),
        LessThanOrEqual => compare(expected()?, |a, b| a <= b),
    })
}
