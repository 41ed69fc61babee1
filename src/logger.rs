use tracing_subscriber::{EnvFilter, fmt};

/// 初始化全局 tracing subscriber
///
/// The level comes from `RUST_LOG` and defaults to `info`, e.g.
/// `RUST_LOG=apichain=debug apichain chain run signup`.
///
/// 日志输出到 stderr，stdout 只输出响应内容
pub fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    tracing::debug!("Logger initialized");
}
