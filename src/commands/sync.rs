//! sync 命令

use crate::core::{SyncEngine, SyncOptions, SyncReport};
use crate::storage::RemoteStore;
use anyhow::Result;
use std::sync::Arc;

/// 运行一次同步
pub async fn run(
    store: Arc<dyn RemoteStore>,
    source: &str,
    destination: &str,
    options: SyncOptions,
) -> Result<SyncReport> {
    let mut engine = SyncEngine::new(store, options);
    Ok(engine.run_sync(source, destination).await?)
}

/// 报告的文本形式
pub fn format_report(report: &SyncReport) -> String {
    let mut out = String::new();
    let prefix = if report.dry_run { "[dry-run] " } else { "" };

    for action in &report.actions {
        out.push_str(&format!("{}{}\n", prefix, action));
    }
    for conflict in &report.conflicts {
        out.push_str(&format!("跳过类型冲突: {}\n", conflict));
    }
    for warning in &report.warnings {
        out.push_str(&format!("警告: {}\n", warning));
    }

    out.push_str(&format!(
        "{}{}: 创建目录 {}, 上传 {}, 下载 {}, 删除 {}, 未变化 {}, 共 {} 字节, 耗时 {}ms\n",
        prefix,
        report.direction,
        report.dirs_created,
        report.files_uploaded,
        report.files_downloaded,
        report.entries_deleted,
        report.files_skipped,
        report.bytes_transferred,
        report.duration_ms
    ));
    out
}

pub fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", format_report(report));
    }
    Ok(())
}
