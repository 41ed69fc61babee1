use crate::variable::types::VariableContext;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

/// `{{...}}` 中变量名的语法
pub const VARIABLE_NAME_PATTERN: &str = r"[a-zA-Z_][a-zA-Z0-9_\-]*";

fn placeholder_regex() -> &'static Regex {
    static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
    VAR_REGEX.get_or_init(|| {
        Regex::new(&format!(r"\{{\{{\s*({})\s*\}}\}}", VARIABLE_NAME_PATTERN))
            .expect("placeholder regex is valid")
    })
}

fn name_regex() -> &'static Regex {
    static NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    NAME_REGEX.get_or_init(|| {
        Regex::new(&format!("^{}$", VARIABLE_NAME_PATTERN)).expect("name regex is valid")
    })
}

/// `{{variable}}` 变量替换
pub struct VariableResolver;

impl VariableResolver {
    /// 用 `context` 中的值替换所有 `{{name}}`
    ///
    /// 没有值的占位符保持原样。只扫描一遍，
    /// 值中包含的 `{{...}}` 不会被再次展开
    pub fn substitute(text: &str, context: &VariableContext) -> String {
        placeholder_regex()
            .replace_all(text, |caps: &Captures| {
                context.get(&caps[1]).unwrap_or(&caps[0]).to_string()
            })
            .into_owned()
    }

    /// `name` 能否写成 `{{name}}` 占位符
    pub fn is_valid_name(name: &str) -> bool {
        name_regex().is_match(name)
    }

    /// `text` 中所有占位符名（按出现顺序）
    pub fn placeholders(text: &str) -> Vec<String> {
        placeholder_regex()
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// `text` 中 `context` 无法填充的占位符
    pub fn unresolved(text: &str, context: &VariableContext) -> Vec<String> {
        Self::placeholders(text)
            .into_iter()
            .filter(|name| !context.contains(name))
            .collect()
    }

    /// 展开环境变量 `${VAR}`，不存在的保持原样
    pub fn resolve_env_vars(text: &str) -> String {
        static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENV_REGEX
            .get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env regex is valid"));

        re.replace_all(text, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
    }

    /// JSON 值存为变量时的字符串形式
    pub fn value_to_string(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => "null".to_string(),
            other => other.to_string(),
        }
    }
}
