use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// 诊断日志写入文件，终端只显示进度条和面向用户的日志行
pub fn init_logging(log_file: &Path, verbose: bool) -> Result<WorkerGuard> {
    let file = std::fs::File::create(log_file)
        .with_context(|| format!("创建日志文件 '{}' 失败", log_file.display()))?;

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file);

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("SORTER_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("sorter={default_level}")));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("设置全局日志订阅者失败")?;

    // 返回 guard，将其生命周期交给调用者管理
    Ok(guard)
}
