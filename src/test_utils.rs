//! 单元测试共用的脚本化服务端与记录型渲染器

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use sorter_common::interface::{Counts, Job, JobId, StatsSnapshot, UploadResponse};
use tokio::sync::mpsc;

use crate::backend::{Backend, BackendError, TransferProgress, UploadFile};
use crate::ui::Presenter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterEvent {
    Progress(u8, String),
    Line(String),
    Paths(String, String),
}

#[derive(Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PresenterEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PresenterEvent::Line(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<(u8, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PresenterEvent::Progress(pct, label) => Some((pct, label)),
                _ => None,
            })
            .collect()
    }

    pub fn paths(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PresenterEvent::Paths(source, output) => Some((source, output)),
                _ => None,
            })
            .collect()
    }

    pub fn last_progress(&self) -> Option<(u8, String)> {
        self.progress().pop()
    }
}

impl Presenter for RecordingPresenter {
    fn set_progress(&self, percentage: u8, label: &str) {
        self.events
            .lock()
            .unwrap()
            .push(PresenterEvent::Progress(percentage, label.to_string()));
    }

    fn append_log_line(&self, text: &str) {
        self.events
            .lock()
            .unwrap()
            .push(PresenterEvent::Line(text.to_string()));
    }

    fn set_paths(&self, source: &str, output: &str) {
        self.events
            .lock()
            .unwrap()
            .push(PresenterEvent::Paths(source.to_string(), output.to_string()));
    }
}

type Scripted<T> = Mutex<VecDeque<Result<T, BackendError>>>;

/// 按脚本依次返回响应的服务端，队列为空时返回传输错误
#[derive(Default)]
pub struct FakeBackend {
    stats: Scripted<StatsSnapshot>,
    choose_source: Scripted<String>,
    choose_output: Scripted<String>,
    open_output: Scripted<()>,
    start_scan: Scripted<JobId>,
    jobs: Scripted<Job>,
    uploads: Mutex<VecDeque<(Vec<TransferProgress>, Result<UploadResponse, BackendError>)>>,
    stats_calls: Mutex<usize>,
    job_requests: Mutex<Vec<JobId>>,
    uploaded: Mutex<Vec<Vec<String>>>,
}

fn next<T>(queue: &Scripted<T>) -> Result<T, BackendError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(BackendError::Transport("no scripted response".into())))
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stats(&self, r: Result<StatsSnapshot, BackendError>) {
        self.stats.lock().unwrap().push_back(r);
    }

    pub fn push_choose_source(&self, r: Result<String, BackendError>) {
        self.choose_source.lock().unwrap().push_back(r);
    }

    pub fn push_choose_output(&self, r: Result<String, BackendError>) {
        self.choose_output.lock().unwrap().push_back(r);
    }

    pub fn push_open_output(&self, r: Result<(), BackendError>) {
        self.open_output.lock().unwrap().push_back(r);
    }

    pub fn push_start_scan(&self, r: Result<JobId, BackendError>) {
        self.start_scan.lock().unwrap().push_back(r);
    }

    pub fn push_job(&self, r: Result<Job, BackendError>) {
        self.jobs.lock().unwrap().push_back(r);
    }

    pub fn push_upload(
        &self,
        progress: Vec<TransferProgress>,
        r: Result<UploadResponse, BackendError>,
    ) {
        self.uploads.lock().unwrap().push_back((progress, r));
    }

    pub fn stats_calls(&self) -> usize {
        *self.stats_calls.lock().unwrap()
    }

    pub fn job_requests(&self) -> Vec<JobId> {
        self.job_requests.lock().unwrap().clone()
    }

    /// 每次上传请求携带的文件名
    pub fn uploaded(&self) -> Vec<Vec<String>> {
        self.uploaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn stats(&self) -> Result<StatsSnapshot, BackendError> {
        *self.stats_calls.lock().unwrap() += 1;
        next(&self.stats)
    }

    async fn choose_source(&self) -> Result<String, BackendError> {
        next(&self.choose_source)
    }

    async fn choose_output(&self) -> Result<String, BackendError> {
        next(&self.choose_output)
    }

    async fn open_output(&self) -> Result<(), BackendError> {
        next(&self.open_output)
    }

    async fn start_scan(&self) -> Result<JobId, BackendError> {
        next(&self.start_scan)
    }

    async fn job_status(&self, job_id: &JobId) -> Result<Job, BackendError> {
        self.job_requests.lock().unwrap().push(job_id.clone());
        next(&self.jobs)
    }

    async fn upload(
        &self,
        files: Vec<UploadFile>,
        progress: mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<UploadResponse, BackendError> {
        self.uploaded
            .lock()
            .unwrap()
            .push(files.into_iter().map(|f| f.name).collect());

        let (events, result) = self.uploads.lock().unwrap().pop_front().unwrap_or_else(|| {
            (
                Vec::new(),
                Err(BackendError::Transport("no scripted response".into())),
            )
        });
        for event in events {
            let _ = progress.send(event);
            tokio::task::yield_now().await;
        }
        result
    }
}

pub fn stats_snapshot(next_id: &[(&str, u64)]) -> StatsSnapshot {
    StatsSnapshot {
        source_dir: "/media/source".into(),
        output_dir: "/media/sorted".into(),
        total_indexed: 7,
        next_id: next_id.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

pub fn running_job(current: u64, total: u64) -> Job {
    Job {
        current,
        total,
        ..Job::default()
    }
}

pub fn finished_job(current: u64, total: u64, counts: Counts) -> Job {
    Job {
        current,
        total,
        done: true,
        counts: Some(counts),
        ..Job::default()
    }
}
