use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assertion::AssertionResult;
use crate::error::ChainError;
use crate::store::Record;
use crate::variable::{ExtractionError, VariableContext, VariableResolver};

/// 链的最大步数（创建和执行时都会检查）
pub const MAX_CHAIN_STEPS: usize = 100;

/// 从第 `step` 步响应的 `path` 处提取值，绑定到 `variable`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRule {
    pub step: usize,
    pub path: String,
    pub variable: String,
}

impl ExtractRule {
    pub fn new(step: usize, path: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            step,
            path: path.into(),
            variable: variable.into(),
        }
    }
}

/// 按顺序排列的请求名，以及在请求间传递值的提取规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestChain {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub requests: Vec<String>,

    #[serde(default)]
    pub extract_rules: Vec<ExtractRule>,
}

impl RequestChain {
    pub fn new(name: impl Into<String>, requests: Vec<String>, extract_rules: Vec<ExtractRule>) -> Self {
        Self {
            name: name.into(),
            description: None,
            requests,
            extract_rules,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks the step limit, that every rule points at a step of this chain
    /// and that its variable name can appear in a placeholder.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.requests.len() > MAX_CHAIN_STEPS {
            return Err(ChainError::ChainTooLong {
                len: self.requests.len(),
                max: MAX_CHAIN_STEPS,
            });
        }

        for rule in &self.extract_rules {
            if rule.step >= self.requests.len() {
                return Err(ChainError::InvalidChain(format!(
                    "extract rule for '{}' refers to step {}, but the chain has {} steps",
                    rule.variable,
                    rule.step,
                    self.requests.len()
                )));
            }
            if !VariableResolver::is_valid_name(&rule.variable) {
                return Err(ChainError::InvalidChain(format!(
                    "extract rule at step {} has variable name '{}', which cannot be used as {{{{name}}}}",
                    rule.step, rule.variable
                )));
            }
        }

        Ok(())
    }

    pub fn rules_for_step(&self, step: usize) -> impl Iterator<Item = &ExtractRule> {
        self.extract_rules.iter().filter(move |r| r.step == step)
    }
}

impl Record for RequestChain {
    fn key(&self) -> &str {
        &self.name
    }
}

/// 一个拿到了 HTTP 响应的已执行步骤
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: usize,
    pub request_name: String,
    pub method: String,
    /// 变量替换后的 URL
    pub url: String,
    pub status_code: u16,
    pub duration: Duration,
    /// 状态码在 [200, 399] 内
    pub success: bool,
    /// 非成功状态码时的错误描述
    pub error: Option<String>,
    pub response_size: u64,
    /// 本步提取出的变量（按规则顺序）
    pub extracted: Vec<(String, String)>,
    pub assertions: Vec<AssertionResult>,
}

/// 执行过程中的非致命问题
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepWarning {
    pub step: usize,
    pub variable: Option<String>,
    pub message: String,
    /// 提取规则失败时设置
    #[serde(skip)]
    pub extraction: Option<ExtractionError>,
}

/// 执行的最终状态
#[derive(Debug, Clone, PartialEq)]
pub enum ChainStatus {
    Completed,
    /// 第 `step` 步没有拿到响应，后续步骤未执行
    FailedAtStep {
        step: usize,
        request_name: String,
        reason: ChainError,
    },
    /// 没有执行任何步骤
    Rejected { reason: ChainError },
}

impl ChainStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, ChainStatus::Completed)
    }

    pub fn reason(&self) -> Option<&ChainError> {
        match self {
            ChainStatus::Completed => None,
            ChainStatus::FailedAtStep { reason, .. } | ChainStatus::Rejected { reason } => Some(reason),
        }
    }
}

/// 一次执行的完整结果（失败时包含已完成的部分）
#[derive(Debug, Clone)]
pub struct ChainExecution {
    pub execution_id: String,
    pub chain_name: String,
    pub status: ChainStatus,
    pub step_results: Vec<StepResult>,
    /// 各步骤耗时之和
    pub total_duration: Duration,
    pub variables: VariableContext,
    pub warnings: Vec<StepWarning>,
}

impl ChainExecution {
    pub(crate) fn start(execution_id: String, chain_name: &str, variables: VariableContext) -> Self {
        Self {
            execution_id,
            chain_name: chain_name.to_string(),
            status: ChainStatus::Completed,
            step_results: Vec::new(),
            total_duration: Duration::ZERO,
            variables,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn rejected(execution_id: String, chain_name: &str, reason: ChainError) -> Self {
        let mut execution = Self::start(execution_id, chain_name, VariableContext::new());
        execution.status = ChainStatus::Rejected { reason };
        execution
    }

    pub(crate) fn push_step(&mut self, result: StepResult) {
        self.total_duration += result.duration;
        self.step_results.push(result);
    }

    pub(crate) fn warn(&mut self, step: usize, message: String) {
        self.warnings.push(StepWarning {
            step,
            variable: None,
            message,
            extraction: None,
        });
    }

    pub(crate) fn warn_extraction(&mut self, step: usize, rule: &ExtractRule, error: ExtractionError) {
        self.warnings.push(StepWarning {
            step,
            variable: Some(rule.variable.clone()),
            message: format!("could not extract '{}': {}", rule.path, error),
            extraction: Some(error),
        });
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// 状态码非成功或有断言失败的步骤
    pub fn unhealthy_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.step_results
            .iter()
            .filter(|s| !s.success || s.assertions.iter().any(|a| !a.passed))
    }
}
