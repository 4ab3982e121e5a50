use std::sync::Arc;

use sorter_common::interface::StatsSnapshot;
use tracing::debug;

use crate::backend::Backend;
use crate::ui::Presenter;

/// 显示服务端当前配置与索引统计
pub struct StatsView {
    backend: Arc<dyn Backend>,
    presenter: Arc<dyn Presenter>,
}

impl StatsView {
    pub fn new(backend: Arc<dyn Backend>, presenter: Arc<dyn Presenter>) -> Self {
        Self { backend, presenter }
    }

    /// 尽力而为的刷新：任何失败都不输出日志、不向上传播
    pub async fn refresh(&self) -> Option<StatsSnapshot> {
        let stats = match self.backend.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                debug!(error = %e, "刷新统计信息失败，忽略");
                return None;
            }
        };

        self.presenter
            .set_paths(&stats.source_dir, &stats.output_dir);
        self.presenter
            .append_log_line(&format!("Indexed: {}", stats.total_indexed));
        self.presenter.append_log_line(&stats.next_ids_line());

        Some(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::test_utils::{FakeBackend, RecordingPresenter, stats_snapshot};

    #[tokio::test]
    async fn refresh_renders_paths_and_counters() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_stats(Ok(stats_snapshot(&[("PIC", 12), ("VID", 3)])));
        let presenter = Arc::new(RecordingPresenter::new());
        let view = StatsView::new(backend.clone(), presenter.clone());

        let snapshot = view.refresh().await;

        assert!(snapshot.is_some());
        assert_eq!(
            presenter.paths(),
            vec![("/media/source".to_string(), "/media/sorted".to_string())]
        );
        assert_eq!(
            presenter.lines(),
            vec!["Indexed: 7", "Next IDs: PIC=12 VID=3 GIF=?"]
        );
        assert_eq!(backend.stats_calls(), 1);
    }

    #[tokio::test]
    async fn refresh_failure_is_silent() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_stats(Err(BackendError::Transport("connection refused".into())));
        backend.push_stats(Err(BackendError::Application("index locked".into())));
        let presenter = Arc::new(RecordingPresenter::new());
        let view = StatsView::new(backend.clone(), presenter.clone());

        assert!(view.refresh().await.is_none());
        assert!(view.refresh().await.is_none());

        assert!(presenter.lines().is_empty());
        assert!(presenter.paths().is_empty());
        assert!(presenter.progress().is_empty());
        assert_eq!(backend.stats_calls(), 2);
    }
}
