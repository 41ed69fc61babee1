use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一次已执行调用的性能记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub request_name: String,

    /// 未收到响应时为 0（超时、连接失败）
    pub status_code: u16,

    /// 单位：秒
    pub response_time: f64,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_size: Option<u64>,
}

impl PerformanceMetric {
    pub fn new(request_name: impl Into<String>, status_code: u16, response_time: f64) -> Self {
        Self {
            request_name: request_name.into(),
            status_code,
            response_time,
            timestamp: Utc::now(),
            request_size: None,
            response_size: None,
        }
    }

    pub fn with_sizes(mut self, request_size: Option<u64>, response_size: Option<u64>) -> Self {
        self.request_size = request_size;
        self.response_size = response_size;
        self
    }

    /// 状态码在 [200, 399] 内
    pub fn is_success(&self) -> bool {
        (200..=399).contains(&self.status_code)
    }
}
