use crate::core::comparator::{DiffEngine, SyncAction};
use crate::core::entry::{Direction, TreeMap};
use crate::core::local_walker::LocalTreeWalker;
use crate::core::remote_walker::RemoteTreeWalker;
use crate::core::transfer::{ActionOutcome, TransferExecutor};
use crate::error::{SyncError, SyncResult};
use crate::storage::{normalize_remote, RemoteStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// 远程路径前缀
pub const REMOTE_SCHEME: &str = "remote:";

/// 同步选项
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// 只计算和记录动作，不执行任何修改
    pub dry_run: bool,
    /// 删除目标端多余的条目
    pub delete: bool,
}

/// 同步阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncPhase {
    ResolveDirection,
    BuildRemoteMap,
    Reconcile,
    Delete,
    Done,
}

/// 解析后的同步目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub direction: Direction,
    pub remote_root: String,
    pub local_root: PathBuf,
}

/// 是否带远程前缀
pub fn is_remote(arg: &str) -> bool {
    arg.starts_with(REMOTE_SCHEME)
}

/// 去掉远程前缀并规范化；不带前缀的参数按远程路径原样处理
pub fn remote_path(arg: &str) -> String {
    normalize_remote(arg.strip_prefix(REMOTE_SCHEME).unwrap_or(arg))
}

impl SyncTarget {
    /// 根据两个路径参数确定同步方向，恰好一个必须是远程路径；不做任何 I/O
    pub fn resolve(source: &str, destination: &str) -> SyncResult<Self> {
        match (is_remote(source), is_remote(destination)) {
            (true, false) => Ok(Self {
                direction: Direction::Download,
                remote_root: remote_path(source),
                local_root: PathBuf::from(destination),
            }),
            (false, true) => Ok(Self {
                direction: Direction::Upload,
                remote_root: remote_path(destination),
                local_root: PathBuf::from(source),
            }),
            (true, true) => Err(SyncError::usage(format!(
                "源和目标不能都是远程路径: {} {}",
                source, destination
            ))),
            (false, false) => Err(SyncError::usage(format!(
                "源和目标必须有一个是远程路径（以 {} 开头）: {} {}",
                REMOTE_SCHEME, source, destination
            ))),
        }
    }
}

/// 本地路径规范化为绝对路径；已存在时解析为规范路径
///
/// 上传时本地根目录必须存在。
pub fn normalize_local(path: &Path, direction: Direction) -> SyncResult<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(canonical) => Ok(canonical),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && direction == Direction::Download => {
            std::path::absolute(path).map_err(|e| SyncError::filesystem(path, e))
        }
        Err(e) => Err(SyncError::filesystem(path, e)),
    }
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub direction: Direction,
    pub remote_root: String,
    pub local_root: PathBuf,
    pub dry_run: bool,
    pub dirs_created: u32,
    pub files_uploaded: u32,
    pub files_downloaded: u32,
    pub entries_deleted: u32,
    pub files_skipped: u32,
    pub conflicts: Vec<String>,
    pub bytes_transferred: u64,
    /// 已执行（或 dry-run 下将执行）的动作，按顺序
    pub actions: Vec<SyncAction>,
    /// 可恢复的问题，例如重命名失败
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

impl SyncReport {
    fn new(target: &SyncTarget, dry_run: bool) -> Self {
        Self {
            direction: target.direction,
            remote_root: target.remote_root.clone(),
            local_root: target.local_root.clone(),
            dry_run,
            dirs_created: 0,
            files_uploaded: 0,
            files_downloaded: 0,
            entries_deleted: 0,
            files_skipped: 0,
            conflicts: Vec::new(),
            bytes_transferred: 0,
            actions: Vec::new(),
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    fn record(&mut self, action: &SyncAction, outcome: &ActionOutcome) {
        self.actions.push(action.clone());
        let bytes = match outcome {
            ActionOutcome::Applied { bytes } => *bytes,
            ActionOutcome::Simulated => action.bytes(),
            ActionOutcome::RenameFailed { warning } => {
                self.warnings.push(warning.clone());
                return;
            }
        };

        match action {
            SyncAction::Mkdir { .. } => self.dirs_created += 1,
            SyncAction::Download { .. } => self.files_downloaded += 1,
            SyncAction::Upload { .. } => self.files_uploaded += 1,
            SyncAction::Delete { .. } => self.entries_deleted += 1,
        }
        self.bytes_transferred += bytes;
    }

    /// 动作总数（重命名失败的也算在内）
    pub fn total_actions(&self) -> usize {
        self.actions.len()
    }
}

/// 同步引擎：解析方向 -> 扫描远程 -> 对比执行 -> （可选）删除
pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    options: SyncOptions,
    phase: SyncPhase,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn RemoteStore>, options: SyncOptions) -> Self {
        Self {
            store,
            options,
            phase: SyncPhase::ResolveDirection,
        }
    }

    /// 当前阶段；失败时停留在出错的阶段
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    fn enter(&mut self, phase: SyncPhase) {
        debug!("同步阶段: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// 运行同步
    pub async fn run_sync(&mut self, source: &str, destination: &str) -> SyncResult<SyncReport> {
        let start = Instant::now();
        self.phase = SyncPhase::ResolveDirection;

        let mut target = SyncTarget::resolve(source, destination)?;
        target.local_root = normalize_local(&target.local_root, target.direction)?;

        info!(
            "开始同步: {} ({}: {} <-> {}){}",
            target.direction,
            self.store.name(),
            target.remote_root,
            target.local_root.display(),
            if self.options.dry_run { " [dry-run]" } else { "" }
        );

        let mut report = SyncReport::new(&target, self.options.dry_run);
        let result = self.run_phases(&target, &mut report).await;
        report.duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                self.enter(SyncPhase::Done);
                info!(
                    "同步完成: 创建目录 {}, 上传 {}, 下载 {}, 删除 {}, 跳过 {}, {} 字节, 耗时 {}ms",
                    report.dirs_created,
                    report.files_uploaded,
                    report.files_downloaded,
                    report.entries_deleted,
                    report.files_skipped,
                    report.bytes_transferred,
                    report.duration_ms
                );
                Ok(report)
            }
            Err(e) => {
                error!("同步失败 (阶段 {:?}, 已完成 {} 个动作): {}", self.phase, report.total_actions(), e);
                Err(e)
            }
        }
    }

    async fn run_phases(&mut self, target: &SyncTarget, report: &mut SyncReport) -> SyncResult<()> {
        let store = self.store.clone();

        self.enter(SyncPhase::BuildRemoteMap);
        let remote_map = RemoteTreeWalker::new(store.as_ref(), &target.remote_root)
            .collect()
            .await?;
        let local_map = LocalTreeWalker::new(&target.local_root).scan().await?;

        let (source_map, dest_map): (&TreeMap, &TreeMap) = match target.direction {
            Direction::Download => (&remote_map, &local_map),
            Direction::Upload => (&local_map, &remote_map),
        };

        let diff = DiffEngine::new(target.direction, self.options.delete);
        let executor = TransferExecutor::new(
            store.as_ref(),
            target.direction,
            &target.remote_root,
            &target.local_root,
            self.options.dry_run,
        );

        self.enter(SyncPhase::Reconcile);
        let plan = diff.plan(source_map, dest_map);
        report.files_skipped = plan.skipped as u32;
        report.conflicts = plan.conflicts.clone();
        let summary = DiffEngine::summarize_actions(&plan.actions);
        info!(
            "对比完成: {} 个目录待创建, {} 个文件待传输 ({} 字节), {} 个文件无变化",
            summary.mkdir_count, summary.transfer_count, summary.transfer_bytes, plan.skipped
        );
        execute(&executor, &plan.actions, report).await?;

        if self.options.delete {
            self.enter(SyncPhase::Delete);
            info!("删除多余条目: {} 个", plan.deletions.len());
            execute(&executor, &plan.deletions, report).await?;
        }

        Ok(())
    }
}

/// 顺序执行动作，遇到致命错误立即停止
async fn execute(
    executor: &TransferExecutor<'_>,
    actions: &[SyncAction],
    report: &mut SyncReport,
) -> SyncResult<()> {
    for action in actions {
        let outcome = executor.apply(action).await?;
        report.record(action, &outcome);
    }
    Ok(())
}
