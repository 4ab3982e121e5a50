use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::{Backend, UploadFile};
use crate::config::Timing;
use crate::guard::{GuardError, Operation, OperationGuard, OperationPermit};
use crate::poller::{JobOutcome, JobPoller};
use crate::stats::StatsView;
use crate::ui::Presenter;
use crate::upload::{UploadCoordinator, UploadOutcome};

/// 用户动作，由界面层翻译后交给 [`App::dispatch`]
#[derive(Debug)]
pub enum AppEvent {
    RefreshStats,
    ChooseSource,
    ChooseOutput,
    OpenOutput,
    /// 开始扫描源目录并跟踪任务
    ProcessSource,
    /// 拖放或选择的一批文件
    UploadFiles(Vec<UploadFile>),
}

/// 事件处理后的结果，供调用方决定退出码
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Done,
    Failed,
    Scan(JobOutcome),
    Upload(UploadOutcome),
}

pub struct App {
    backend: Arc<dyn Backend>,
    presenter: Arc<dyn Presenter>,
    stats: Arc<StatsView>,
    uploader: UploadCoordinator,
    poller: JobPoller,
    guard: OperationGuard,
    scan_cancel: Mutex<CancellationToken>,
}

impl App {
    pub fn new(backend: Arc<dyn Backend>, presenter: Arc<dyn Presenter>, timing: Timing) -> Self {
        let stats = Arc::new(StatsView::new(backend.clone(), presenter.clone()));
        let uploader =
            UploadCoordinator::new(backend.clone(), presenter.clone(), stats.clone(), timing);
        let poller = JobPoller::new(backend.clone(), presenter.clone(), stats.clone(), timing);

        Self {
            backend,
            presenter,
            stats,
            uploader,
            poller,
            guard: OperationGuard::new(),
            scan_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn active_operation(&self) -> Option<Operation> {
        self.guard.current()
    }

    /// 停止跟踪当前扫描任务；服务端任务本身不受影响
    pub fn cancel_scan(&self) {
        self.scan_token().cancel();
    }

    fn scan_token(&self) -> MutexGuard<'_, CancellationToken> {
        match self.scan_cancel.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 处理一个用户事件；同一时间只允许一个上传或扫描
    pub async fn dispatch(&self, event: AppEvent) -> Result<EventOutcome, GuardError> {
        info!(?event, "处理事件");
        match event {
            AppEvent::RefreshStats => Ok(match self.stats.refresh().await {
                Some(_) => EventOutcome::Done,
                None => EventOutcome::Failed,
            }),
            AppEvent::ChooseSource => Ok(self.choose_source().await),
            AppEvent::ChooseOutput => Ok(self.choose_output().await),
            AppEvent::OpenOutput => Ok(self.open_output().await),
            AppEvent::ProcessSource => self.process_source().await,
            AppEvent::UploadFiles(files) => {
                if files.is_empty() {
                    return Ok(EventOutcome::Upload(UploadOutcome::Empty));
                }
                let _permit = self.begin(Operation::Upload)?;
                Ok(EventOutcome::Upload(self.uploader.submit(files).await))
            }
        }
    }

    fn begin(&self, operation: Operation) -> Result<OperationPermit, GuardError> {
        self.guard.try_begin(operation).inspect_err(|e| {
            warn!(requested = %operation, "{e}");
            self.presenter.append_log_line(&format!("ERROR: {e}"));
        })
    }

    async fn choose_source(&self) -> EventOutcome {
        match self.backend.choose_source().await {
            Ok(dir) => {
                self.presenter.append_log_line("");
                self.presenter
                    .append_log_line(&format!("Source set to: {dir}"));
                self.stats.refresh().await;
                EventOutcome::Done
            }
            Err(e) => {
                info!(error = %e, "选择源目录失败");
                self.presenter
                    .append_log_line("Choose source cancelled or failed.");
                EventOutcome::Failed
            }
        }
    }

    async fn choose_output(&self) -> EventOutcome {
        match self.backend.choose_output().await {
            Ok(dir) => {
                self.presenter.append_log_line("");
                self.presenter
                    .append_log_line(&format!("Output set to: {dir}"));
                self.stats.refresh().await;
                EventOutcome::Done
            }
            Err(e) => {
                info!(error = %e, "选择输出目录失败");
                self.presenter
                    .append_log_line("Choose output cancelled or failed.");
                EventOutcome::Failed
            }
        }
    }

    async fn open_output(&self) -> EventOutcome {
        match self.backend.open_output().await {
            Ok(()) => EventOutcome::Done,
            Err(e) => {
                warn!(error = %e, "打开输出目录失败");
                self.presenter
                    .append_log_line("ERROR: Could not open output folder");
                if let Some(message) = e.server_message() {
                    self.presenter.append_log_line(&message);
                }
                EventOutcome::Failed
            }
        }
    }

    async fn process_source(&self) -> Result<EventOutcome, GuardError> {
        let _permit = self.begin(Operation::Scan)?;

        let cancel = CancellationToken::new();
        *self.scan_token() = cancel.clone();

        self.presenter.append_log_line("");
        self.presenter
            .append_log_line("Starting scan (copy mode)...");
        self.presenter.set_progress(2, "Starting...");

        let job_id = match self.backend.start_scan().await {
            Ok(job_id) => job_id,
            Err(e) => {
                warn!(error = %e, "无法启动扫描任务");
                self.presenter
                    .append_log_line("ERROR: Could not start scan job");
                self.presenter.set_progress(0, "");
                return Ok(EventOutcome::Failed);
            }
        };

        let outcome = self.poller.start_tracking(&job_id, &cancel).await;
        Ok(EventOutcome::Scan(outcome))
    }
}
