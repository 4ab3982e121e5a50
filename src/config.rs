use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::Path, path::PathBuf};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5050";
/// 两次任务状态查询之间的固定间隔
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// 完成后保留 100% 显示的时长
pub const DEFAULT_CLEAR_DELAY_MS: u64 = 900;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub clear_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            clear_delay_ms: DEFAULT_CLEAR_DELAY_MS,
        }
    }
}

impl Config {
    pub fn timing(&self) -> Timing {
        Timing {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            clear_delay: Duration::from_millis(self.clear_delay_ms),
        }
    }
}

/// 轮询与收尾使用的时间参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub poll_interval: Duration,
    pub clear_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Config::default().timing()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .context("无法确定配置目录")?;

    let sorter_dir = base.join("sorter");
    fs::create_dir_all(&sorter_dir).context("创建配置目录失败")?;
    Ok(sorter_dir.join("config.toml"))
}

/// 加载配置文件，不存在时写入默认配置并返回默认值
pub fn load_or_create_config() -> Result<Config> {
    load_or_create_at(&config_path()?)
}

pub fn load_or_create_at(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = fs::read_to_string(path).context("读取配置文件失败")?;
        let cfg: Config = toml::from_str(&content).context("解析配置文件失败")?;
        return Ok(cfg);
    }
    write_default_at(path)?;
    Ok(Config::default())
}

/// 重置配置文件
pub fn reset_config() -> Result<PathBuf> {
    let path = config_path()?;
    write_default_at(&path)?;
    Ok(path)
}

fn write_default_at(path: &Path) -> Result<()> {
    let default = Config::default();
    let config_content = format!(
        r#"# ================ 服务端配置 =================

# 文件整理服务端地址
server_url = "{}"

# ================ 进度显示配置 ================

# 扫描任务状态的轮询间隔 (毫秒)
poll_interval_ms = {}

# 完成后清空进度条前的停留时间 (毫秒)
clear_delay_ms = {}
"#,
        default.server_url, default.poll_interval_ms, default.clear_delay_ms
    );

    fs::write(path, config_content).context("写入默认配置失败")?;
    Ok(())
}
