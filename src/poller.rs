use std::sync::Arc;

use sorter_common::interface::{Counts, Job, JobId};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError};
use crate::config::Timing;
use crate::stats::StatsView;
use crate::ui::Presenter;

/// 一次跟踪的最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// 任务报告 `done=true`；`last_error` 只是警告
    Completed {
        counts: Counts,
        last_error: Option<String>,
    },
    /// 状态查询失败，客户端放弃跟踪（服务端可能仍在运行）
    Failed(BackendError),
    /// 调用方取消
    Cancelled,
}

/// 以固定间隔轮询扫描任务直到结束
pub struct JobPoller {
    backend: Arc<dyn Backend>,
    presenter: Arc<dyn Presenter>,
    stats: Arc<StatsView>,
    timing: Timing,
}

impl JobPoller {
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

    /// 跟踪 `job_id` 直到任务完成、查询失败或 `cancel` 被触发
    ///
    /// 没有重试、没有退避、没有次数上限。
    pub async fn start_tracking(&self, job_id: &JobId, cancel: &CancellationToken) -> JobOutcome {
        info!(%job_id, "开始跟踪扫描任务");

        loop {
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.stopped(job_id),
                status = self.backend.job_status(job_id) => status,
            };

            let job = match status {
                Ok(job) => job,
                Err(e) => return self.abandon(job_id, e),
            };

            debug!(
                %job_id,
                current = job.current,
                total = job.total,
                current_file = job.current_file.as_deref().unwrap_or("-"),
                "任务进度"
            );
            self.presenter.set_progress(job.percentage(), &job.label());

            if job.done {
                return self.finish(job_id, job, cancel).await;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.stopped(job_id),
                _ = sleep(self.timing.poll_interval) => {}
            }
        }
    }

    fn abandon(&self, job_id: &JobId, error: BackendError) -> JobOutcome {
        warn!(%job_id, error = %error, "查询任务状态失败，停止跟踪");
        self.presenter.append_log_line("ERROR: Job status failed");
        self.presenter.set_progress(0, "");
        JobOutcome::Failed(error)
    }

    fn stopped(&self, job_id: &JobId) -> JobOutcome {
        info!(%job_id, "跟踪已取消");
        self.presenter
            .append_log_line(&format!("Stopped tracking job {job_id}"));
        self.presenter.set_progress(0, "");
        JobOutcome::Cancelled
    }

    async fn finish(&self, job_id: &JobId, job: Job, cancel: &CancellationToken) -> JobOutcome {
        let counts = job.counts();
        let last_error = job.last_error().map(str::to_string);
        info!(%job_id, %counts, "扫描任务完成");

        self.presenter.append_log_line("");
        self.presenter.append_log_line(&format!("Done. {counts}"));
        if let Some(err) = &last_error {
            self.presenter.append_log_line(&format!("Last error: {err}"));
        }

        self.stats.refresh().await;

        // 让 100% 停留片刻再清空
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = sleep(self.timing.clear_delay) => {}
        }
        self.presenter.set_progress(0, "");

        JobOutcome::Completed { counts, last_error }
    }
}
