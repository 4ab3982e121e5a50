use std::sync::Arc;

use sorter_common::interface::{Counts, UploadResponse};
use sorter_common::utils::UPLOAD_PLACEHOLDER_PERCENT;
use sorter_common::{format_size, percentage};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError, TransferProgress, UploadFile};
use crate::config::Timing;
use crate::stats::StatsView;
use crate::ui::Presenter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// 空批次，没有发出请求
    Empty,
    Completed(Counts),
    Failed(BackendError),
}

/// 把一批文件作为一个 multipart 请求上传，并把逐个文件的结果写入日志
pub struct UploadCoordinator {
    backend: Arc<dyn Backend>,
    presenter: Arc<dyn Presenter>,
    stats: Arc<StatsView>,
    timing: Timing,
}

impl UploadCoordinator {
    pub fn new(
        backend: Arc<dyn Backend>,
        presenter: Arc<dyn Presenter>,
        stats: Arc<StatsView>,
        timing: Timing,
    ) -> Self {
        Self {
            backend,
            presenter,
            stats,
            timing,
        }
    }

    pub async fn submit(&self, files: Vec<UploadFile>) -> UploadOutcome {
        if files.is_empty() {
            return UploadOutcome::Empty;
        }

        let total_size: u64 = files.iter().map(|f| f.size).sum();
        info!(
            files = files.len(),
            size = %format_size(total_size),
            "开始上传"
        );

        self.presenter.append_log_line("");
        self.presenter
            .append_log_line(&format!("Uploading {} file(s) to Output...", files.len()));
        self.presenter.set_progress(0, "Uploading...");

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let request = self.backend.upload(files, progress_tx);
        tokio::pin!(request);

        // 请求与进度事件在同一个任务里交替推进
        let result = loop {
            tokio::select! {
                biased;
                Some(progress) = progress_rx.recv() => self.render_transfer(progress),
                result = &mut request => break result,
            }
        };
        while let Ok(progress) = progress_rx.try_recv() {
            self.render_transfer(progress);
        }

        match result {
            Ok(response) => self.report(response).await,
            Err(e) => self.fail(e),
        }
    }

    fn render_transfer(&self, progress: TransferProgress) {
        match progress.total {
            Some(total) if total > 0 => {
                let pct = percentage(progress.loaded, total);
                self.presenter
                    .set_progress(pct, &format!("Uploading... {pct}%"));
            }
            _ => self
                .presenter
                .set_progress(UPLOAD_PLACEHOLDER_PERCENT, "Uploading..."),
        }
    }

    fn fail(&self, error: BackendError) -> UploadOutcome {
        warn!(error = %error, "上传失败");
        match &error {
            BackendError::Transport(_) => {
                self.presenter.set_progress(0, "Upload failed");
                self.presenter.append_log_line("ERROR: Upload failed");
            }
            BackendError::Status { status, body } => {
                self.presenter.set_progress(0, &format!("Error {status}"));
                self.presenter
                    .append_log_line(&format!("ERROR: Server returned {status}"));
                self.presenter.append_log_line(body);
            }
            BackendError::Decode(_) => {
                self.presenter.append_log_line("ERROR: Invalid server response");
                self.presenter.set_progress(0, "");
            }
            BackendError::Application(message) => {
                self.presenter.append_log_line(&format!("ERROR: {message}"));
                self.presenter.set_progress(0, "");
            }
        }
        UploadOutcome::Failed(error)
    }

    async fn report(&self, response: UploadResponse) -> UploadOutcome {
        for result in &response.results {
            debug!(file = %result.file, status = ?result.status, "上传结果");
            self.presenter.append_log_line(&result.log_line());
        }
        self.presenter
            .append_log_line(&format!("Done. {}", response.counts));
        info!(counts = %response.counts, "上传完成");

        self.stats.refresh().await;

        sleep(self.timing.clear_delay).await;
        self.presenter.set_progress(0, "");

        UploadOutcome::Completed(response.counts)
    }
}
