use crate::utils::percentage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 下一个编号的分类代码（图片、视频、动图）
pub const NEXT_ID_CATEGORIES: [&str; 3] = ["PIC", "VID", "GIF"];

/// 每个响应都带有的外层字段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 解析后的响应：服务端接受（携带负载）或拒绝（`ok=false`）
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Accepted(T),
    Rejected(Option<String>),
}

impl<T: DeserializeOwned> Reply<T> {
    /// 先读取 `ok`，只有在 `ok=true` 时才按 `T` 解析其余字段
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        let envelope = Envelope::deserialize(&value)?;
        if !envelope.ok {
            return Ok(Reply::Rejected(envelope.error));
        }
        Ok(Reply::Accepted(serde_json::from_value(value)?))
    }
}

/// 服务端分配的任务标识，可能是字符串也可能是整数
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => JobId(s),
            RawId::Number(n) => JobId(n.to_string()),
        })
    }
}

/// 处理结果计数，缺失字段按 0 处理
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub dupes: u64,
    #[serde(default)]
    pub skipped: u64,
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} dupes={} skipped={}",
            self.processed, self.dupes, self.skipped
        )
    }
}

// stats 接口
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(default)]
    pub source_dir: String,
    #[serde(default)]
    pub output_dir: String,
    #[serde(default)]
    pub total_indexed: u64,
    #[serde(default)]
    pub next_id: BTreeMap<String, u64>,
}

impl StatsSnapshot {
    /// `Next IDs: PIC=.. VID=.. GIF=..`，缺失的分类显示为 `?`
    pub fn next_ids_line(&self) -> String {
        let parts: Vec<String> = NEXT_ID_CATEGORIES
            .iter()
            .map(|category| match self.next_id.get(*category) {
                Some(n) => format!("{category}={n}"),
                None => format!("{category}=?"),
            })
            .collect();
        format!("Next IDs: {}", parts.join(" "))
    }
}

// choose_source / choose_output 接口
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDirResponse {
    pub source_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDirResponse {
    pub output_dir: String,
}

// open_output 接口只关心 ok
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Acknowledged {}

// process_folder 接口
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartScanResponse {
    pub job_id: JobId,
}

// job 接口
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job: Job,
}

/// 服务端扫描任务的快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub counts: Option<Counts>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub current_file: Option<String>,
}

impl Job {
    pub fn percentage(&self) -> u8 {
        percentage(self.current, self.total)
    }

    pub fn label(&self) -> String {
        format!("Processing {}/{}", self.current, self.total)
    }

    pub fn counts(&self) -> Counts {
        self.counts.unwrap_or_default()
    }

    /// 空字符串不算错误
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref().filter(|e| !e.is_empty())
    }
}

// upload 接口
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub counts: Counts,
    #[serde(default)]
    pub results: Vec<UploadResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Processed,
    Dupe,
    Skipped,
    #[serde(other)]
    Unknown,
}

/// 单个文件的上传结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub file: String,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copied_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UploadResult {
    pub fn log_line(&self) -> String {
        let copied_to = self.copied_to.as_deref().unwrap_or("?");
        match self.status {
            UploadStatus::Processed => format!(
                "OK   {}  ->  {}  (key={})",
                self.file,
                copied_to,
                self.key.as_deref().unwrap_or("?")
            ),
            UploadStatus::Dupe => format!(
                "DUPE {}  ->  {}  (matches={})",
                self.file,
                copied_to,
                self.matches_key.as_deref().unwrap_or("?")
            ),
            UploadStatus::Skipped | UploadStatus::Unknown => format!(
                "SKIP {}  ({})",
                self.file,
                self.reason.as_deref().unwrap_or("?")
            ),
        }
    }
}
