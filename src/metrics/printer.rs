use super::log::{MetricStats, MetricsLog};
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};

pub fn print_metrics(log: &MetricsLog, limit: usize) {
    let entries = log.tail(limit);
    if entries.is_empty() {
        println!("No metrics recorded yet");
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Request", "Status", "Time", "Req Size", "Resp Size", "Timestamp",
    ]);

    let size = |s: Option<u64>| s.map(|b| format!("{b} B")).unwrap_or_else(|| "-".to_string());

    for metric in entries.iter().rev() {
        let (status, color) = match metric.status_code {
            0 => ("ERR".to_string(), Color::Red),
            code if metric.is_success() => (code.to_string(), Color::Green),
            code => (code.to_string(), Color::Red),
        };

        table.add_row(vec![
            Cell::new(&metric.request_name),
            Cell::new(status).fg(color),
            Cell::new(format!("{:.1}ms", metric.response_time * 1000.0)),
            Cell::new(size(metric.request_size)),
            Cell::new(size(metric.response_size)),
            Cell::new(metric.timestamp.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }

    println!("{}", table);
}

pub fn print_stats(stats: &MetricStats, endpoint: Option<&str>) {
    println!("{} {}", "Endpoint:".bold(), endpoint.unwrap_or("All"));
    if stats.count == 0 {
        println!("  No metrics found");
        return;
    }

    let ms = |secs: f64| format!("{:.2}ms", secs * 1000.0);
    println!("  Total Requests:    {}", stats.count);
    println!("  Avg Response Time: {}", ms(stats.avg_response_time));
    println!("  Min Response Time: {}", ms(stats.min_response_time));
    println!("  Max Response Time: {}", ms(stats.max_response_time));
    println!("  p50 / p95:         {} / {}", ms(stats.p50_response_time), ms(stats.p95_response_time));

    let rate = format!("{:.1}%", stats.success_rate);
    let rate = if stats.success_rate >= 100.0 {
        rate.green()
    } else if stats.success_rate >= 50.0 {
        rate.yellow()
    } else {
        rate.red()
    };
    println!("  Success Rate:      {}", rate);
}
