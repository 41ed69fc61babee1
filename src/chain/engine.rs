use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::Result;
use crate::assertion::evaluate_all;
use crate::chain::types::{ChainExecution, ChainStatus, ExtractRule, RequestChain, StepResult};
use crate::definition::RequestDefinition;
use crate::error::{ApiChainError, ChainError};
use crate::http::{DEFAULT_TIMEOUT, HttpExecutor, Request, Response};
use crate::metrics::{MetricsSink, PerformanceMetric};
use crate::store::RecordStore;
use crate::variable::{
    ExtractionError, Settings, UndefinedVariablePolicy, VariableContext, VariableResolver,
    extract, extract_from_str,
};
use serde_json::Value;

/// [`ChainEngine`] 的运行选项，通常来自配置文件的 `[settings]`
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub timeout: Duration,
    pub undefined_variables: UndefinedVariablePolicy,
    /// 同名链的多次执行互相等待
    pub serialize_same_chain: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            undefined_variables: UndefinedVariablePolicy::default(),
            serialize_same_chain: false,
        }
    }
}

impl From<&Settings> for EngineOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            timeout: settings.timeout(),
            undefined_variables: settings.undefined_variables,
            serialize_same_chain: settings.serialize_same_chain,
        }
    }
}

/// 在链外单独执行一个已保存请求的结果
#[derive(Debug, Clone)]
pub struct RequestRun {
    pub request: Request,
    pub result: StepResult,
    pub response: Response,
}

/// 链执行器：按顺序逐步执行已保存的请求
///
/// The engine holds no per-run state: every call to
/// [`execute_chain_with`](Self::execute_chain_with) builds a fresh variable
/// context, so one engine can be shared across tasks.
pub struct ChainEngine<E: HttpExecutor> {
    requests: Arc<dyn RecordStore<RequestDefinition>>,
    chains: Arc<dyn RecordStore<RequestChain>>,
    executor: E,
    metrics: Arc<dyn MetricsSink>,
    options: EngineOptions,
    chain_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<E: HttpExecutor> ChainEngine<E> {
    pub fn new(
        requests: Arc<dyn RecordStore<RequestDefinition>>,
        chains: Arc<dyn RecordStore<RequestChain>>,
        executor: E,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            requests,
            chains,
            executor,
            metrics,
            options: EngineOptions::default(),
            chain_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// 校验并保存链，同名链会被替换
    pub fn create_chain(
        &self,
        name: &str,
        requests: Vec<String>,
        extract_rules: Vec<ExtractRule>,
        description: Option<String>,
    ) -> Result<RequestChain> {
        let mut chain = RequestChain::new(name, requests, extract_rules);
        chain.description = description;
        chain.validate()?;

        self.chains.put(chain.clone())?;
        info!(chain = %name, steps = chain.requests.len(), "chain saved");
        Ok(chain)
    }

    pub fn list_chains(&self) -> Result<Vec<RequestChain>> {
        self.chains.list()
    }

    pub fn get_chain(&self, name: &str) -> Result<Option<RequestChain>> {
        self.chains.get(name)
    }

    pub fn delete_chain(&self, name: &str) -> Result<bool> {
        let removed = self.chains.delete(name)?;
        if removed {
            info!(chain = %name, "chain deleted");
        }
        Ok(removed)
    }

    /// 以空变量上下文执行链
    pub async fn execute_chain(&self, name: &str) -> Result<ChainExecution> {
        self.execute_chain_with(name, &VariableContext::new()).await
    }

    /// 以 `seed` 作为初始变量执行链
    ///
    /// Failures of the chain itself come back inside the returned
    /// [`ChainExecution`]; only a store that cannot be read gives `Err`.
    pub async fn execute_chain_with(
        &self,
        name: &str,
        seed: &VariableContext,
    ) -> Result<ChainExecution> {
        let execution_id = Uuid::new_v4().to_string();

        let Some(chain) = self.chains.get(name)? else {
            warn!(chain = %name, "chain not found");
            return Ok(ChainExecution::rejected(
                execution_id,
                name,
                ChainError::ChainNotFound(name.to_string()),
            ));
        };

        if let Err(reason) = chain.validate() {
            warn!(chain = %name, error = %reason, "chain rejected");
            return Ok(ChainExecution::rejected(execution_id, name, reason));
        }

        let lock = self.options.serialize_same_chain.then(|| self.chain_lock(name));
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        info!(
            chain = %name,
            execution_id = %execution_id,
            steps = chain.requests.len(),
            "starting chain"
        );

        let mut execution = ChainExecution::start(execution_id, name, seed.clone());
        for (step, request_name) in chain.requests.iter().enumerate() {
            if let Err(reason) = self.run_step(&chain, step, request_name, &mut execution).await {
                warn!(chain = %name, step, request = %request_name, error = %reason, "chain stopped");
                execution.status = ChainStatus::FailedAtStep {
                    step,
                    request_name: request_name.clone(),
                    reason,
                };
                return Ok(execution);
            }
        }

        info!(
            chain = %name,
            steps = execution.step_results.len(),
            warnings = execution.warnings.len(),
            elapsed_ms = execution.total_duration.as_millis() as u64,
            "chain completed"
        );
        Ok(execution)
    }

    /// Run one saved request with `variables` substituted, recording a metric.
    ///
    /// Unlike a chain step, a missing request or failed call is an `Err`.
    pub async fn run_request(&self, name: &str, variables: &VariableContext) -> Result<RequestRun> {
        let definition = self
            .requests
            .get(name)?
            .ok_or_else(|| ChainError::RequestNotFound(name.to_string()))?;

        let request = self.prepare(&definition, variables)?;
        let (response, duration) = self
            .call(&definition.name, &request)
            .await
            .map_err(ApiChainError::from)?;

        let body = response.json().ok();
        let mut result = step_result(0, &definition, &request, &response, duration);
        result.assertions = evaluate_all(
            &definition.assertions,
            &response,
            body.as_ref(),
            duration.as_millis() as u64,
        );

        Ok(RequestRun {
            request,
            result,
            response,
        })
    }

    async fn run_step(
        &self,
        chain: &RequestChain,
        step: usize,
        request_name: &str,
        execution: &mut ChainExecution,
    ) -> std::result::Result<(), ChainError> {
        let definition = self
            .requests
            .get(request_name)
            .map_err(|e| ChainError::Storage(e.to_string()))?
            .ok_or_else(|| ChainError::RequestNotFound(request_name.to_string()))?;

        let request = self.prepare(&definition, &execution.variables)?;

        let unresolved = definition.unresolved_variables(&execution.variables);
        if !unresolved.is_empty() {
            let message = format!("undefined variables left as-is: {}", unresolved.join(", "));
            warn!(step, request = %request_name, "{}", message);
            execution.warn(step, message);
        }

        debug!(step, request = %request_name, method = %request.method, url = %request.url, "executing step");

        let (response, duration) = self.call(request_name, &request).await?;
        let mut result = step_result(step, &definition, &request, &response, duration);

        let body = response.json().ok();
        for rule in chain.rules_for_step(step) {
            match extract_rule(rule, &response, body.as_ref()) {
                Ok(value) => {
                    debug!(step, variable = %rule.variable, "extracted variable");
                    execution.variables.insert(rule.variable.clone(), value.clone());
                    result.extracted.push((rule.variable.clone(), value));
                }
                Err(e) => {
                    warn!(step, variable = %rule.variable, path = %rule.path, error = %e, "extraction failed");
                    execution.warn_extraction(step, rule, e);
                }
            }
        }

        result.assertions = evaluate_all(
            &definition.assertions,
            &response,
            body.as_ref(),
            duration.as_millis() as u64,
        );

        execution.push_step(result);
        Ok(())
    }

    fn prepare(
        &self,
        definition: &RequestDefinition,
        variables: &VariableContext,
    ) -> std::result::Result<Request, ChainError> {
        if self.options.undefined_variables == UndefinedVariablePolicy::Error {
            let names = definition.unresolved_variables(variables);
            if !names.is_empty() {
                return Err(ChainError::UnresolvedVariable {
                    request: definition.name.clone(),
                    names,
                });
            }
        }
        Ok(definition.resolve(variables))
    }

    /// 执行请求，无论是否收到响应都记录性能数据
    async fn call(
        &self,
        request_name: &str,
        request: &Request,
    ) -> std::result::Result<(Response, Duration), ChainError> {
        let start = Instant::now();
        let outcome = self.executor.execute(request, self.options.timeout).await;
        let duration = start.elapsed();

        let (status, response_size) = match &outcome {
            Ok(response) => (response.status.code(), Some(response.size())),
            Err(_) => (0, None),
        };
        self.metrics.record(
            PerformanceMetric::new(request_name, status, duration.as_secs_f64())
                .with_sizes(Some(request.size()), response_size),
        );

        let response = outcome?;
        Ok((response, duration))
    }

    fn chain_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .chain_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(name.to_string()).or_default().clone()
    }
}

fn step_result(
    step: usize,
    definition: &RequestDefinition,
    request: &Request,
    response: &Response,
    duration: Duration,
) -> StepResult {
    let success = response.status.is_ok();
    let error = (!success).then(|| {
        format!(
            "HTTP {} {}",
            response.status.code(),
            response.status.reason_phrase()
        )
    });

    StepResult {
        step,
        request_name: definition.name.clone(),
        method: request.method.to_string(),
        url: request.url.clone(),
        status_code: response.status.code(),
        duration,
        success,
        error,
        response_size: response.size(),
        extracted: Vec::new(),
        assertions: Vec::new(),
    }
}

// 响应体不是 JSON 对象或数组时返回 NotStructured
fn extract_rule(
    rule: &ExtractRule,
    response: &Response,
    body: Option<&Value>,
) -> std::result::Result<String, ExtractionError> {
    match body {
        Some(body @ (Value::Object(_) | Value::Array(_))) => {
            extract(body, &rule.path).map(VariableResolver::value_to_string)
        }
        _ => extract_from_str(&response.body, &rule.path).map(|v| VariableResolver::value_to_string(&v)),
    }
}
