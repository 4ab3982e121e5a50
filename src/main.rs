mod args;
mod logging;

use anyhow::{Result, bail};
use args::{Command, get_cli_args};
use sorter::app::{App, AppEvent, EventOutcome};
use sorter::backend::{HttpBackend, UploadFile};
use sorter::config;
use sorter::guard::Operation;
use sorter::poller::JobOutcome;
use sorter::ui::TerminalPresenter;
use sorter::upload::UploadOutcome;
use std::path::PathBuf;
use std::sync::Arc;

async fn load_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(UploadFile::from_path(path).await?);
    }
    Ok(files)
}

/// 执行事件；扫描过程中按下 Ctrl-C 只停止跟踪
async fn run(app: &App, event: AppEvent) -> Result<EventOutcome> {
    let dispatch = app.dispatch(event);
    tokio::pin!(dispatch);

    tokio::select! {
        outcome = &mut dispatch => return Ok(outcome?),
        _ = tokio::signal::ctrl_c() => {}
    }

    if app.active_operation() != Some(Operation::Scan) {
        bail!("操作被中断");
    }
    app.cancel_scan();
    Ok(dispatch.await?)
}

/// 失败或被中断的操作以非零状态退出
fn check_outcome(outcome: &EventOutcome) -> Result<()> {
    match outcome {
        EventOutcome::Scan(JobOutcome::Cancelled) => {
            bail!("已停止跟踪扫描任务，服务端任务可能仍在运行")
        }
        EventOutcome::Failed
        | EventOutcome::Scan(JobOutcome::Failed(_))
        | EventOutcome::Upload(UploadOutcome::Failed(_)) => bail!("操作失败，详情见上方日志"),
        EventOutcome::Done
        | EventOutcome::Scan(JobOutcome::Completed { .. })
        | EventOutcome::Upload(UploadOutcome::Empty | UploadOutcome::Completed(_)) => Ok(()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = get_cli_args();

    let event = match cli.command {
        Command::Config => {
            let path = config::reset_config()?;
            println!("已重置配置文件 '{}'", path.display());
            return Ok(());
        }
        Command::Stats => AppEvent::RefreshStats,
        Command::ChooseSource => AppEvent::ChooseSource,
        Command::ChooseOutput => AppEvent::ChooseOutput,
        Command::OpenOutput => AppEvent::OpenOutput,
        Command::Scan => AppEvent::ProcessSource,
        Command::Upload { files } => AppEvent::UploadFiles(load_files(&files).await?),
    };

    let cfg = config::load_or_create_config()?;
    let log_file = config::config_path()?.with_file_name("sorter.log");
    let _guard = logging::init_logging(&log_file, cli.verbose)?;

    let server_url = cli.server.unwrap_or_else(|| cfg.server_url.clone());
    tracing::info!(%server_url, "客户端启动");

    let backend = Arc::new(HttpBackend::new(&server_url)?);
    let presenter = Arc::new(TerminalPresenter::new(cli.verbose));
    let app = App::new(backend, presenter.clone(), cfg.timing());

    let outcome = if matches!(event, AppEvent::RefreshStats) {
        let outcome = run(&app, event).await;
        if matches!(outcome, Ok(EventOutcome::Failed)) {
            presenter.finish();
            bail!("无法从 {server_url} 获取统计信息");
        }
        outcome
    } else {
        // 启动时先刷新一次统计
        run(&app, AppEvent::RefreshStats).await?;
        run(&app, event).await
    };
    presenter.finish();

    check_outcome(&outcome?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorter::backend::BackendError;
    use sorter::interface::Counts;

    #[test]
    fn interrupted_and_failed_runs_exit_non_zero() {
        assert!(check_outcome(&EventOutcome::Done).is_ok());
        assert!(check_outcome(&EventOutcome::Upload(UploadOutcome::Empty)).is_ok());
        assert!(
            check_outcome(&EventOutcome::Scan(JobOutcome::Completed {
                counts: Counts::default(),
                last_error: Some("permission denied".into()),
            }))
            .is_ok()
        );

        let cancelled = check_outcome(&EventOutcome::Scan(JobOutcome::Cancelled)).unwrap_err();
        assert!(cancelled.to_string().contains("停止跟踪"));
        assert!(check_outcome(&EventOutcome::Failed).is_err());
        assert!(
            check_outcome(&EventOutcome::Upload(UploadOutcome::Failed(
                BackendError::Transport("refused".into())
            )))
            .is_err()
        );
    }
}
