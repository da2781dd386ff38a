use crate::core::entry::{is_within, Direction, Entry, EntryKind, TreeMap};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// 同步动作
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncAction {
    /// 在目标端创建目录
    Mkdir { path: String },
    /// 远程 -> 本地
    Download {
        path: String,
        size: u64,
        /// 远程修改时间，下载后写回本地文件
        modified_time: i64,
    },
    /// 本地 -> 远程
    Upload { path: String, size: u64 },
    /// 删除目标端多余的条目
    Delete { path: String, kind: EntryKind },
}

impl SyncAction {
    pub fn path(&self) -> &str {
        match self {
            SyncAction::Mkdir { path }
            | SyncAction::Download { path, .. }
            | SyncAction::Upload { path, .. }
            | SyncAction::Delete { path, .. } => path,
        }
    }

    /// 传输的字节数（非传输动作为 0）
    pub fn bytes(&self) -> u64 {
        match self {
            SyncAction::Download { size, .. } | SyncAction::Upload { size, .. } => *size,
            _ => 0,
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Mkdir { path } => write!(f, "mkdir {}", path),
            SyncAction::Download { path, size, .. } => write!(f, "download {} ({} 字节)", path, size),
            SyncAction::Upload { path, size } => write!(f, "upload {} ({} 字节)", path, size),
            SyncAction::Delete { path, .. } => write!(f, "delete {}", path),
        }
    }
}

/// 对比结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// 主过程的动作（创建目录、传输），前序
    pub actions: Vec<SyncAction>,
    /// 删除过程的动作，后序；未开启删除时为空
    pub deletions: Vec<SyncAction>,
    /// 无需传输的文件数
    pub skipped: usize,
    /// 两端类型不一致（一边文件一边目录）的路径，连同其下的条目一起跳过
    pub conflicts: Vec<String>,
}

/// 动作统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSummary {
    pub mkdir_count: usize,
    pub transfer_count: usize,
    pub transfer_bytes: u64,
    pub delete_count: usize,
}

impl ActionSummary {
    pub fn total_actions(&self) -> usize {
        self.mkdir_count + self.transfer_count + self.delete_count
    }
}

/// 差异引擎：比较源端和目标端，生成有序的动作列表
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    direction: Direction,
    delete: bool,
}

impl DiffEngine {
    pub fn new(direction: Direction, delete: bool) -> Self {
        Self { direction, delete }
    }

    /// 判断文件是否需要传输
    ///
    /// 下载：本地不存在、大小不同，或远程时间严格更新。
    /// 上传：远程不存在、大小不同，或远程时间严格更旧。
    /// 时间精确到秒，不设容差。
    pub fn needs_transfer(&self, source: &Entry, dest: Option<&Entry>) -> bool {
        let Some(dest) = dest else {
            return true;
        };

        let (remote, local) = match self.direction {
            Direction::Download => (source, dest),
            Direction::Upload => (dest, source),
        };

        if remote.size() != local.size() {
            return true;
        }

        match self.direction {
            Direction::Download => remote.modified_time > local.modified_time,
            Direction::Upload => remote.modified_time < local.modified_time,
        }
    }

    /// 完整计划：创建/传输（前序），开启删除时再计算删除（后序）
    ///
    /// 删除只取决于两端的映射，主过程执行后不会改变，所以可以提前算好。
    pub fn plan(&self, source: &TreeMap, dest: &TreeMap) -> SyncPlan {
        let mut plan = self.reconcile(source, dest);
        if self.delete {
            plan.deletions = self.deletions(source, dest, &plan.conflicts);
        }
        plan
    }

    /// 主对比过程，按前序遍历源端
    fn reconcile(&self, source: &TreeMap, dest: &TreeMap) -> SyncPlan {
        let mut plan = SyncPlan::default();
        // 本次已发出的 mkdir 路径
        let mut issued: Vec<&str> = Vec::new();

        for (path, entry) in source {
            if plan.conflicts.iter().any(|c| is_within(path, c)) {
                debug!("跳过冲突目录下的条目: {}", path);
                continue;
            }

            let existing = dest.get(path);
            match (entry.kind, existing.map(|e| e.kind)) {
                (EntryKind::Directory, Some(EntryKind::Directory)) => {}
                (EntryKind::Directory, None) => {
                    // 按路径有序遍历时，以 path 为前缀的路径都排在 path 之后，
                    // 这里实际上不会命中
                    if already_created(&issued, path) {
                        debug!("目录已创建，跳过: {}", path);
                        continue;
                    }
                    issued.push(path);
                    plan.actions.push(SyncAction::Mkdir { path: path.clone() });
                }
                (EntryKind::File, None) | (EntryKind::File, Some(EntryKind::File)) => {
                    if self.needs_transfer(entry, existing) {
                        plan.actions.push(self.transfer(entry));
                    } else {
                        debug!("文件未变化，跳过: {}", path);
                        plan.skipped += 1;
                    }
                }
                (kind, Some(other)) => {
                    warn!("类型冲突，跳过: {} (源 {:?}, 目标 {:?})", path, kind, other);
                    plan.conflicts.push(path.clone());
                }
            }
        }

        plan
    }

    /// 删除过程：目标端独有的条目，后序（最深的先删）
    fn deletions(&self, source: &TreeMap, dest: &TreeMap, conflicts: &[String]) -> Vec<SyncAction> {
        dest.iter()
            .rev()
            .filter(|(path, _)| !source.contains_key(*path))
            .filter(|(path, _)| !conflicts.iter().any(|c| is_within(path, c)))
            .map(|(path, entry)| SyncAction::Delete {
                path: path.clone(),
                kind: entry.kind,
            })
            .collect()
    }

    fn transfer(&self, entry: &Entry) -> SyncAction {
        match self.direction {
            Direction::Download => SyncAction::Download {
                path: entry.path.clone(),
                size: entry.size(),
                modified_time: entry.modified_time,
            },
            Direction::Upload => SyncAction::Upload {
                path: entry.path.clone(),
                size: entry.size(),
            },
        }
    }

    /// 统计同步动作
    pub fn summarize_actions(actions: &[SyncAction]) -> ActionSummary {
        let mut summary = ActionSummary::default();
        for action in actions {
            match action {
                SyncAction::Mkdir { .. } => summary.mkdir_count += 1,
                SyncAction::Download { size, .. } | SyncAction::Upload { size, .. } => {
                    summary.transfer_count += 1;
                    summary.transfer_bytes += size;
                }
                SyncAction::Delete { .. } => summary.delete_count += 1,
            }
        }
        summary
    }
}

/// 目录是否已被本次发出的 mkdir 覆盖
///
/// 纯字符串前缀比较，不按路径段：已发出 `ab` 时 `a` 也被视为已存在。
/// 映射按路径排序，任何以 `path` 为前缀的路径都排在它后面，所以单次前序遍历中
/// 这个判断不会跳过需要创建的目录。
fn already_created(issued: &[&str], path: &str) -> bool {
    issued.iter().any(|p| p.starts_with(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(entries: Vec<Entry>) -> TreeMap {
        entries.into_iter().map(|e| (e.path.clone(), e)).collect()
    }

    fn paths(actions: &[SyncAction]) -> Vec<String> {
        actions.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_download_tie_break() {
        let engine = DiffEngine::new(Direction::Download, false);
        let remote = Entry::file("a.txt", 10, 100);

        assert!(engine.needs_transfer(&remote, None));
        // 完全相同
        assert!(!engine.needs_transfer(&remote, Some(&Entry::file("a.txt", 10, 100))));
        // 远程更新
        assert!(engine.needs_transfer(&remote, Some(&Entry::file("a.txt", 10, 99))));
        // 本地更新，大小相同
        assert!(!engine.needs_transfer(&remote, Some(&Entry::file("a.txt", 10, 101))));
        // 大小不同，即使本地更新也要传
        assert!(engine.needs_transfer(&remote, Some(&Entry::file("a.txt", 11, 101))));
        assert!(engine.needs_transfer(&remote, Some(&Entry::file("a.txt", 9, 100))));
    }

    #[test]
    fn test_upload_tie_break() {
        let engine = DiffEngine::new(Direction::Upload, false);
        let local = Entry::file("a.txt", 10, 100);

        assert!(engine.needs_transfer(&local, None));
        assert!(!engine.needs_transfer(&local, Some(&Entry::file("a.txt", 10, 100))));
        // 远程更旧
        assert!(engine.needs_transfer(&local, Some(&Entry::file("a.txt", 10, 99))));
        // 远程更新
        assert!(!engine.needs_transfer(&local, Some(&Entry::file("a.txt", 10, 101))));
        // 时间相同大小不同
        assert!(engine.needs_transfer(&local, Some(&Entry::file("a.txt", 12, 100))));
    }

    #[test]
    fn test_mkdir_pre_order_and_delete_post_order() {
        let source = tree(vec![
            Entry::dir("a", 0),
            Entry::dir("a/b", 0),
            Entry::dir("a/b/c", 0),
            Entry::file("a/b/c/f.txt", 1, 0),
        ]);
        let engine = DiffEngine::new(Direction::Upload, true);

        let plan = engine.plan(&source, &TreeMap::new());
        assert_eq!(
            paths(&plan.actions),
            vec!["mkdir a", "mkdir a/b", "mkdir a/b/c", "upload a/b/c/f.txt (1 字节)"]
        );

        // 反方向：源为空，目标全部删除，最深的先删
        let plan = engine.plan(&TreeMap::new(), &source);
        assert!(plan.actions.is_empty());
        assert_eq!(
            paths(&plan.deletions),
            vec!["delete a/b/c/f.txt", "delete a/b/c", "delete a/b", "delete a"]
        );
    }

    #[test]
    fn test_existing_directories_not_recreated() {
        let source = tree(vec![Entry::dir("Public", 5), Entry::file("Public/a.txt", 10, 100)]);
        let dest = tree(vec![Entry::dir("Public", 7)]);
        let plan = DiffEngine::new(Direction::Download, false).plan(&source, &dest);
        assert_eq!(paths(&plan.actions), vec!["download Public/a.txt (10 字节)"]);
    }

    #[test]
    fn test_delete_gating() {
        let source = tree(vec![Entry::file("keep.txt", 1, 1)]);
        let dest = tree(vec![
            Entry::file("keep.txt", 1, 1),
            Entry::dir("old", 0),
            Entry::file("old/big.bin", 1 << 30, 0),
            Entry::file("stale.txt", 3, 9_999_999_999),
        ]);

        let without = DiffEngine::new(Direction::Download, false).plan(&source, &dest);
        assert!(without.actions.is_empty());
        assert!(without.deletions.is_empty());
        assert_eq!(without.skipped, 1);

        let with = DiffEngine::new(Direction::Download, true).plan(&source, &dest);
        assert!(with.actions.is_empty());
        assert_eq!(
            paths(&with.deletions),
            vec!["delete stale.txt", "delete old/big.bin", "delete old"]
        );
    }

    #[test]
    fn test_kind_conflict_is_skipped_with_descendants() {
        let source = tree(vec![Entry::dir("x", 0), Entry::file("x/inner.txt", 1, 0), Entry::file("y", 1, 0)]);
        let dest = tree(vec![Entry::file("x", 4, 0), Entry::dir("y", 0), Entry::file("y/z", 1, 0)]);

        let plan = DiffEngine::new(Direction::Upload, true).plan(&source, &dest);
        assert!(plan.actions.is_empty());
        assert!(plan.deletions.is_empty());
        assert_eq!(plan.conflicts, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_prefix_dedupe_is_not_segment_aware() {
        assert!(already_created(&["a/b"], "a"));
        assert!(already_created(&["ab"], "a"));
        assert!(!already_created(&["a"], "a/b"));
        assert!(!already_created(&[], "a"));
    }

    #[test]
    fn test_string_prefix_siblings_all_created_in_path_order() {
        let source = tree(vec![
            Entry::dir("a", 0),
            Entry::dir("a/b", 0),
            Entry::dir("ab", 0),
            Entry::dir("abc", 0),
        ]);
        let plan = DiffEngine::new(Direction::Download, false).plan(&source, &TreeMap::new());
        assert_eq!(
            paths(&plan.actions),
            vec!["mkdir a", "mkdir a/b", "mkdir ab", "mkdir abc"]
        );
    }

    #[test]
    fn test_summary() {
        let actions = vec![
            SyncAction::Mkdir { path: "a".into() },
            SyncAction::Upload { path: "a/x".into(), size: 3 },
            SyncAction::Download { path: "a/y".into(), size: 4, modified_time: 0 },
            SyncAction::Delete { path: "z".into(), kind: EntryKind::File },
        ];
        let summary = DiffEngine::summarize_actions(&actions);
        assert_eq!(summary.mkdir_count, 1);
        assert_eq!(summary.transfer_count, 2);
        assert_eq!(summary.transfer_bytes, 7);
        assert_eq!(summary.delete_count, 1);
        assert_eq!(summary.total_actions(), 4);
    }
}
