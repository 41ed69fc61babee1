use colored::Colorize;

use crate::chain::engine::RequestRun;
use crate::chain::types::{ChainExecution, ChainStatus, StepResult};
use crate::utils::{ResponseFormat, ResponseFormatter};

/// 链执行和单个请求执行的终端输出
pub struct ChainReporter {
    formatter: ResponseFormatter,
}

impl ChainReporter {
    pub fn new(verbose: bool) -> Self {
        let format = if verbose {
            ResponseFormat::Verbose
        } else {
            ResponseFormat::Compact
        };

        Self {
            formatter: ResponseFormatter::new(format),
        }
    }

    pub fn print_header(&self, chain_name: &str, steps: usize) {
        println!("\nRunning chain {} ({} steps)...\n", chain_name.bold(), steps);
    }

    pub fn print_execution(&self, execution: &ChainExecution) {
        for result in &execution.step_results {
            self.print_step(result);
        }

        for warning in &execution.warnings {
            println!(
                " {} step {}: {}",
                "!".yellow(),
                warning.step + 1,
                warning.message
            );
        }

        self.print_summary(execution);
    }

    pub fn print_step(&self, result: &StepResult) {
        let symbol = if result.success { "✓".green() } else { "✗".red() };
        println!(
            " {} [{}] {} - {} {} {} ({}ms)",
            symbol,
            result.step + 1,
            result.request_name,
            result.method.cyan(),
            result.url,
            result.status_code,
            result.duration.as_millis()
        );

        if let Some(error) = &result.error {
            println!("   {}: {}", "Error".red().bold(), error);
        }

        for (variable, value) in &result.extracted {
            println!("   {} {} = {}", "→".blue(), variable, value);
        }

        if !result.assertions.is_empty() {
            println!("   Assertions:");
            for assertion in &result.assertions {
                if assertion.passed {
                    println!("     {} {}", "✓".green(), assertion.raw);
                } else {
                    println!("     {} {}", "✗".red(), assertion.raw);
                    if let Some(msg) = &assertion.message {
                        println!("       {}", msg.red());
                    }
                }
            }
        }
    }

    /// 输出单个请求及其格式化后的响应
    pub fn print_request_run(&self, run: &RequestRun) {
        self.print_step(&run.result);
        for line in self.formatter.format(&run.response).lines() {
            println!("   {}", line);
        }
        println!();
    }

    pub fn print_summary(&self, execution: &ChainExecution) {
        println!("\n{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        match &execution.status {
            ChainStatus::Completed => println!("  {}: {}", "Status".bold(), "completed".green()),
            ChainStatus::FailedAtStep {
                step,
                request_name,
                reason,
            } => println!(
                "  {}: {} at step {} ({}): {} {}",
                "Status".bold(),
                "failed".red(),
                step + 1,
                request_name,
                reason.kind().red(),
                reason
            ),
            ChainStatus::Rejected { reason } => println!(
                "  {}: {}: {} {}",
                "Status".bold(),
                "rejected".red(),
                reason.kind().red(),
                reason
            ),
        }

        let total = execution.step_results.len();
        let failed = execution.step_results.iter().filter(|s| !s.success).count();
        if failed == 0 {
            println!(
                "  {}: {} succeeded, {} total",
                "Steps".bold(),
                total.to_string().green(),
                total
            );
        } else {
            println!(
                "  {}: {} succeeded, {} failed, {} total",
                "Steps".bold(),
                (total - failed).to_string().green(),
                failed.to_string().red(),
                total
            );
        }

        let (passed, all) = execution
            .step_results
            .iter()
            .flat_map(|s| &s.assertions)
            .fold((0, 0), |(p, t), a| (p + usize::from(a.passed), t + 1));
        if all > 0 {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Assertions".bold(),
                passed.to_string().green(),
                (all - passed).to_string().red(),
                all
            );
        }

        if !execution.warnings.is_empty() {
            println!(
                "  {}: {}",
                "Warnings".bold(),
                execution.warnings.len().to_string().yellow()
            );
        }

        println!(
            "  {}: {:.3}s",
            "Duration".bold(),
            execution.total_duration.as_secs_f64()
        );
        println!("  {}: {}", "Execution".bold(), execution.execution_id.dimmed());
        println!();
    }
}

impl Default for ChainReporter {
    fn default() -> Self {
        Self::new(false)
    }
}
