/// 传输进度无法计算时显示的占位百分比
pub const UPLOAD_PLACEHOLDER_PERCENT: u8 = 30;

/// 计算进度百分比，结果始终落在 [0, 100]
///
/// `total == 0` 表示总量未知，直接返回 0，不做除法。
pub fn percentage(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (current as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// 格式化字节大小为易读的字符串
pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{size} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}
