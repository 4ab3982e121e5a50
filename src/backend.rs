use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use reqwest::{Body, Client, RequestBuilder, Url, multipart};
use serde::de::DeserializeOwned;
use sorter_common::interface::{
    Acknowledged, Envelope, Job, JobId, JobStatusResponse, OutputDirResponse, Reply, SourceDirResponse,
    StartScanResponse, StatsSnapshot, UploadResponse,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// multipart 中承载文件的字段名
pub const UPLOAD_FIELD: &str = "files";

const MEMORY_CHUNK_SIZE: usize = 64 * 1024;

/// 一次请求可能失败的方式
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// 没有收到任何响应
    #[error("请求发送失败: {0}")]
    Transport(String),
    /// HTTP 状态码不在 2xx 范围内，保留原始响应体
    #[error("服务端返回状态码 {status}")]
    Status { status: u16, body: String },
    /// 响应体不是预期的 JSON
    #[error("无法解析服务端响应: {0}")]
    Decode(String),
    /// 服务端返回 `ok=false`
    #[error("{0}")]
    Application(String),
}

impl BackendError {
    pub fn rejected(error: Option<String>) -> Self {
        BackendError::Application(error.unwrap_or_else(|| "unknown".to_string()))
    }

    /// 服务端给出的错误说明；错误状态码的响应体里也可能带有 `error`
    pub fn server_message(&self) -> Option<String> {
        match self {
            BackendError::Application(message) => Some(message.clone()),
            BackendError::Status { body, .. } => serde_json::from_str::<Envelope>(body)
                .ok()
                .and_then(|envelope| envelope.error),
            BackendError::Transport(_) | BackendError::Decode(_) => None,
        }
    }
}

/// 上传字节级进度；`total` 为 `None` 时无法计算比例
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

#[derive(Debug, Clone)]
enum FileSource {
    Memory(Bytes),
    Disk(PathBuf),
}

/// 待上传的文件，保留原始文件名
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub size: u64,
    source: FileSource,
}

impl UploadFile {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("读取文件 '{}' 的元数据失败", path.display()))?;
        if !metadata.is_file() {
            anyhow::bail!("'{}' 不是普通文件", path.display());
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("'{}' 没有文件名", path.display()))?;

        Ok(Self {
            name,
            size: metadata.len(),
            source: FileSource::Disk(path.to_path_buf()),
        })
    }

    async fn into_stream(self) -> io::Result<BoxStream<'static, io::Result<Bytes>>> {
        match self.source {
            FileSource::Memory(data) => {
                let chunks: Vec<io::Result<Bytes>> = (0..data.len())
                    .step_by(MEMORY_CHUNK_SIZE)
                    .map(|start| {
                        let end = (start + MEMORY_CHUNK_SIZE).min(data.len());
                        Ok(data.slice(start..end))
                    })
                    .collect();
                Ok(stream::iter(chunks).boxed())
            }
            FileSource::Disk(path) => {
                let file = tokio::fs::File::open(&path).await?;
                Ok(ReaderStream::new(file).boxed())
            }
        }
    }
}

/// 文件整理服务端对客户端暴露的接口
#[async_trait]
pub trait Backend: Send + Sync {
    async fn stats(&self) -> Result<StatsSnapshot, BackendError>;

    async fn choose_source(&self) -> Result<String, BackendError>;

    async fn choose_output(&self) -> Result<String, BackendError>;

    async fn open_output(&self) -> Result<(), BackendError>;

    async fn start_scan(&self) -> Result<JobId, BackendError>;

    async fn job_status(&self, job_id: &JobId) -> Result<Job, BackendError>;

    /// 一次请求上传全部文件，传输进度通过 `progress` 送出
    async fn upload(
        &self,
        files: Vec<UploadFile>,
        progress: mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<UploadResponse, BackendError>;
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("创建 reqwest 客户端失败")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// 任务标识作为单个路径段写入，`/`、`?`、`#` 等字符会被转义
    fn job_url(&self, job_id: &JobId) -> Result<Url, BackendError> {
        let mut url = Url::parse(&self.url("/api/job"))
            .map_err(|e| BackendError::Transport(format!("无效的服务端地址: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| BackendError::Transport("服务端地址不能带有路径段".to_string()))?
            .push(job_id.as_str());
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match Reply::<T>::from_json(&body).map_err(|e| BackendError::Decode(e.to_string()))? {
            Reply::Accepted(payload) => Ok(payload),
            Reply::Rejected(error) => Err(BackendError::rejected(error)),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn stats(&self) -> Result<StatsSnapshot, BackendError> {
        self.send(self.client.get(self.url("/api/stats"))).await
    }

    async fn choose_source(&self) -> Result<String, BackendError> {
        let resp: SourceDirResponse = self
            .send(self.client.get(self.url("/api/choose_source")))
            .await?;
        Ok(resp.source_dir)
    }

    async fn choose_output(&self) -> Result<String, BackendError> {
        let resp: OutputDirResponse = self
            .send(self.client.get(self.url("/api/choose_output")))
            .await?;
        Ok(resp.output_dir)
    }

    async fn open_output(&self) -> Result<(), BackendError> {
        let _: Acknowledged = self
            .send(self.client.get(self.url("/api/open_output")))
            .await?;
        Ok(())
    }

    async fn start_scan(&self) -> Result<JobId, BackendError> {
        let resp: StartScanResponse = self
            .send(self.client.post(self.url("/api/process_folder")))
            .await?;
        Ok(resp.job_id)
    }

    async fn job_status(&self, job_id: &JobId) -> Result<Job, BackendError> {
        let url = self.job_url(job_id)?;
        let resp: JobStatusResponse = self.send(self.client.get(url)).await?;
        Ok(resp.job)
    }

    async fn upload(
        &self,
        files: Vec<UploadFile>,
        progress: mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<UploadResponse, BackendError> {
        let total: u64 = files.iter().map(|f| f.size).sum();
        let total = (total > 0).then_some(total);
        let loaded = Arc::new(AtomicU64::new(0));

        debug!(files = files.len(), ?total, "构建 multipart 上传请求");
        if total.is_none() {
            let _ = progress.send(TransferProgress { loaded: 0, total });
        }

        let mut form = multipart::Form::new();
        for file in files {
            let name = file.name.clone();
            let size = file.size;
            let stream = file
                .into_stream()
                .await
                .map_err(|e| BackendError::Transport(format!("读取文件 '{name}' 失败: {e}")))?;

            let loaded = Arc::clone(&loaded);
            let tx = progress.clone();
            let counted = stream.inspect_ok(move |chunk| {
                let len = chunk.len() as u64;
                let now = loaded.fetch_add(len, Ordering::SeqCst) + len;
                // 接收端已关闭时丢弃进度即可
                let _ = tx.send(TransferProgress { loaded: now, total });
            });

            let part = multipart::Part::stream_with_length(Body::wrap_stream(counted), size)
                .file_name(name);
            form = form.part(UPLOAD_FIELD, part);
        }

        self.send(self.client.post(self.url("/api/upload")).multipart(form))
            .await
    }
}
