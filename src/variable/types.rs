use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

/// 请求可见的变量集合，按名称索引
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableContext {
    variables: BTreeMap<String, String>,
}

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn extend(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        self.variables.extend(vars);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Self::new();
        for (k, v) in iter {
            ctx.insert(k, v);
        }
        ctx
    }
}

/// 未定义变量的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedVariablePolicy {
    /// 保留占位符原文，并输出警告
    #[default]
    Keep,
    /// 发送前直接失败
    Error,
}

/// 环境配置，例如 `[environments.dev]`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Environment {
    #[serde(flatten)]
    pub variables: HashMap<String, String>,
}

/// 配置文件中的 `[settings]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 数据目录，存放 `requests.json`、`chains.json` 和 `metrics.jsonl`
    pub data_dir: PathBuf,
    pub timeout_secs: u64,
    pub undefined_variables: UndefinedVariablePolicy,
    pub serialize_same_chain: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".apichain"),
            timeout_secs: 30,
            undefined_variables: UndefinedVariablePolicy::default(),
            serialize_same_chain: false,
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 完整的 `apichain.toml` 配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub environments: HashMap<String, Environment>,
}

impl AppConfig {
    pub fn get_environment(&self, env_name: &str) -> Option<&Environment> {
        self.environments.get(env_name)
    }
}
