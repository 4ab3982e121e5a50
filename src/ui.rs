use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// 进度条与日志的渲染出口，上传与扫描两条流程共用同一个实例
///
/// 只负责显示，不包含任何业务逻辑；后写入者覆盖先写入者。
pub trait Presenter: Send + Sync {
    /// `percentage` 取值 [0, 100]，`(0, "")` 表示清空进度条
    fn set_progress(&self, percentage: u8, label: &str);

    /// 追加一行日志
    fn append_log_line(&self, text: &str);

    /// 更新源目录与输出目录的显示
    fn set_paths(&self, source: &str, output: &str);
}

/// 进度条是否已经画到终端上；画过之后直到 `finish` 都由 MultiProgress 管理输出
#[repr(u8)]
enum BarState {
    Detached = 0,
    Attached = 1,
}

/// 终端实现：一个长度为 100 的进度条，日志打印在进度条上方
pub struct TerminalPresenter {
    mp: MultiProgress,
    bar: ProgressBar,
    state: AtomicU8,
    timestamps: bool,
    paths: Mutex<Option<(String, String)>>,
}

impl TerminalPresenter {
    pub fn new(timestamps: bool) -> Self {
        let mp = MultiProgress::new();
        let bar = mp.add(ProgressBar::new(100));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        Self {
            mp,
            bar,
            state: AtomicU8::new(BarState::Detached as u8),
            timestamps,
            paths: Mutex::new(None),
        }
    }

    fn is_attached(&self) -> bool {
        self.state.load(Ordering::SeqCst) == BarState::Attached as u8
    }

    fn println(&self, msg: &str) {
        if self.is_attached() && !self.mp.is_hidden() {
            self.mp.println(msg).unwrap_or_else(|_| {
                println!("{msg}");
            });
        } else {
            println!("{msg}");
        }
    }

    /// 退出前收起进度条
    pub fn finish(&self) {
        self.bar.finish_and_clear();
        self.state.store(BarState::Detached as u8, Ordering::SeqCst);
    }
}

impl Presenter for TerminalPresenter {
    fn set_progress(&self, percentage: u8, label: &str) {
        let percentage = percentage.min(100);
        let clearing = percentage == 0 && label.is_empty();
        // 清空只是归零，已画出的进度条仍然保留在终端上
        if clearing && !self.is_attached() {
            return;
        }
        self.state
            .store(BarState::Attached as u8, Ordering::SeqCst);
        self.bar.set_position(u64::from(percentage));
        self.bar.set_message(label.to_string());
    }

    fn append_log_line(&self, text: &str) {
        if self.timestamps && !text.is_empty() {
            let timestamp_str = chrono::Local::now().format("%H:%M:%S%.3f");
            self.println(&format!("[{timestamp_str}] {text}"));
        } else {
            self.println(text);
        }
    }

    fn set_paths(&self, source: &str, output: &str) {
        let mut paths = match self.paths.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let changed = paths
            .as_ref()
            .is_none_or(|(s, o)| s != source || o != output);
        if changed {
            self.println(&format!("Source: {source}"));
            self.println(&format!("Output: {output}"));
            *paths = Some((source.to_string(), output.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_stays_attached_after_clearing_until_finish() {
        let presenter = TerminalPresenter::new(false);

        presenter.set_progress(0, "");
        assert!(!presenter.is_attached());

        presenter.set_progress(40, "Uploading... 40%");
        assert!(presenter.is_attached());
        assert_eq!(presenter.bar.position(), 40);

        presenter.set_progress(0, "");
        assert!(presenter.is_attached());
        assert_eq!(presenter.bar.position(), 0);
        presenter.append_log_line("Done. processed=1 dupes=0 skipped=0");

        presenter.finish();
        assert!(!presenter.is_attached());
    }

    #[test]
    fn out_of_range_percentage_is_clamped() {
        let presenter = TerminalPresenter::new(true);
        presenter.set_progress(250, "Processing 9/3");
        assert_eq!(presenter.bar.position(), 100);
        assert_eq!(presenter.bar.message(), "Processing 9/3");
    }
}
