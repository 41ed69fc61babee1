use crate::http::Response;
use colored::*;

pub enum ResponseFormat {
    Compact,
    Verbose,
}

// 紧凑模式下，短于此长度的响应体直接输出
const COMPACT_BODY_LIMIT: usize = 200;

pub struct ResponseFormatter {
    format: ResponseFormat,
    color: bool,
}

impl ResponseFormatter {
    pub fn new(format: ResponseFormat) -> Self {
        Self {
            format,
            color: true,
        }
    }

    pub fn without_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn format(&self, response: &Response) -> String {
        let verbose = matches!(self.format, ResponseFormat::Verbose);
        let mut output = vec![self.status_line(response, verbose)];

        let timing = format!("Time: {}ms", response.duration.as_millis());
        output.push(self.paint(timing, |s| s.cyan()));

        if verbose {
            output.push(String::new());
            output.push(self.paint("Headers:".to_string(), |s| s.blue().bold()));
            for (key, value) in response.headers.iter() {
                let value = value.to_str().unwrap_or("<invalid utf-8>");
                output.push(self.paint(format!("   {}: {}", key, value), |s| s.blue()));
            }
        }

        let body = &response.body;
        if body.is_empty() {
            return output.join("\n");
        }

        if verbose {
            output.push(String::new());
            output.push(self.paint("Body:".to_string(), |s| s.blue().bold()));
            output.push(pretty_json(body).unwrap_or_else(|| body.to_string()));
        } else if body.len() < COMPACT_BODY_LIMIT {
            output.push(pretty_json(body).unwrap_or_else(|| body.to_string()));
        } else {
            output.push(format!("Body: {} bytes", body.len()));
        }

        output.join("\n")
    }

    fn status_line(&self, response: &Response, bold: bool) -> String {
        let line = format!(
            "HTTP {} {}",
            response.status.code(),
            response.status.reason_phrase()
        );
        self.paint(line, |s| {
            let s = if response.is_success() {
                s.green()
            } else if response.is_client_error() {
                s.yellow()
            } else {
                s.red()
            };
            if bold { s.bold() } else { s }
        })
    }

    fn paint(&self, text: String, style: impl FnOnce(ColoredString) -> ColoredString) -> String {
        if self.color {
            style(text.normal()).to_string()
        } else {
            text
        }
    }
}

/// 格式化 JSON，`body` 不是 JSON 时返回 None
fn pretty_json(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    serde_json::to_string_pretty(&value).ok()
}
