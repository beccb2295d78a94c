use crate::core::comparator::{ComparisonRecord, FileStatus, Side};
use crate::error::SyncError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// 同步方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncDirection {
    /// A -> B
    AToB,
    /// B -> A
    BToA,
    /// A + B -> C
    MergeToC,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncDirection::AToB => write!(f, "A -> B"),
            SyncDirection::BToA => write!(f, "B -> A"),
            SyncDirection::MergeToC => write!(f, "A + B -> C"),
        }
    }
}

/// 复制原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReasonTag {
    New,
    Modified,
    SizeMismatch,
    /// 强制用较旧的版本覆盖
    ForcedOlder(Side),
    /// 合并时只存在于一侧
    UniqueFrom(Side),
    /// 合并时取较新的一侧
    NewestFrom(Side),
}

impl fmt::Display for ReasonTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonTag::New => write!(f, "新文件"),
            ReasonTag::Modified => write!(f, "已修改"),
            ReasonTag::SizeMismatch => write!(f, "大小不同"),
            ReasonTag::ForcedOlder(side) => write!(f, "强制覆盖（{} 中的旧版本）", side),
            ReasonTag::UniqueFrom(side) => write!(f, "唯一文件（来自 {}）", side),
            ReasonTag::NewestFrom(side) => write!(f, "最新版本（来自 {}）", side),
        }
    }
}

/// 单个复制任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyTask {
    pub display_index: usize,
    pub relative_path: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: ReasonTag,
}

/// 同步请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub direction: SyncDirection,
    /// 为空表示全部符合条件的条目
    pub selection: BTreeSet<usize>,
    pub force_overwrite: bool,
}

impl SyncRequest {
    pub fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            selection: BTreeSet::new(),
            force_overwrite: false,
        }
    }

    pub fn with_selection(mut self, selection: BTreeSet<usize>) -> Self {
        self.selection = selection;
        self
    }

    pub fn forced(mut self, force_overwrite: bool) -> Self {
        self.force_overwrite = force_overwrite;
        self
    }
}

/// 当前配置的目录 A / B / C
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRoots {
    pub a: PathBuf,
    pub b: PathBuf,
    pub c: Option<PathBuf>,
}

impl SyncRoots {
    pub fn new(a: impl Into<PathBuf>, b: impl Into<PathBuf>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            c: None,
        }
    }

    pub fn with_merge_target(mut self, c: impl Into<PathBuf>) -> Self {
        self.c = Some(c.into());
        self
    }

    /// 检查并返回合并目标目录
    pub fn merge_target(&self) -> Result<&Path, SyncError> {
        let c = self.c.as_deref().ok_or(SyncError::MergeTargetMissing)?;
        if same_path(c, &self.a) || same_path(c, &self.b) {
            return Err(SyncError::MergeTargetConflict(c.to_path_buf()));
        }
        Ok(c)
    }
}

/// 路径相等，或两者都存在且规范化后相同
pub fn same_path(left: &Path, right: &Path) -> bool {
    if left == right {
        return true;
    }
    match (left.canonicalize(), right.canonicalize()) {
        (Ok(l), Ok(r)) => l == r,
        _ => false,
    }
}

/// 同步计划生成器
pub struct SyncPlanner<'a> {
    roots: &'a SyncRoots,
}

impl<'a> SyncPlanner<'a> {
    pub fn new(roots: &'a SyncRoots) -> Self {
        Self { roots }
    }

    /// 根据比较结果生成复制任务
    ///
    /// 合并模式下目标目录无效时直接失败，不生成任何任务。
    pub fn plan(
        &self,
        request: &SyncRequest,
        records: &[ComparisonRecord],
    ) -> Result<Vec<CopyTask>, SyncError> {
        let merge_target = match request.direction {
            SyncDirection::MergeToC => Some(self.roots.merge_target().inspect_err(|e| {
                error!("合并已中止: {}", e);
            })?),
            _ => None,
        };

        info!(
            "生成同步计划: {}{}{}",
            request.direction,
            if request.selection.is_empty() {
                " (全部符合条件的条目)".to_string()
            } else {
                format!(" (已选择: {})", request.selection.len())
            },
            if request.force_overwrite { " [强制]" } else { "" }
        );

        let tasks: Vec<CopyTask> = records
            .iter()
            .filter(|r| r.display_index > 0)
            .filter(|r| {
                request.selection.is_empty() || request.selection.contains(&r.display_index)
            })
            .filter_map(|record| {
                let (side, root, reason) = match request.direction {
                    SyncDirection::AToB => {
                        let reason =
                            one_way_reason(record.status, Side::A, request.force_overwrite)?;
                        (Side::A, self.roots.b.as_path(), reason)
                    }
                    SyncDirection::BToA => {
                        let reason =
                            one_way_reason(record.status, Side::B, request.force_overwrite)?;
                        (Side::B, self.roots.a.as_path(), reason)
                    }
                    SyncDirection::MergeToC => {
                        let (side, reason) = merge_reason(record.status)?;
                        (side, merge_target?, reason)
                    }
                };

                let source = record.path_in(side)?.to_path_buf();
                Some(CopyTask {
                    display_index: record.display_index,
                    relative_path: record.relative_path.clone(),
                    source,
                    destination: resolve_relative(root, &record.relative_path),
                    reason,
                })
            })
            .collect();

        info!("同步计划包含 {} 个复制任务", tasks.len());
        Ok(tasks)
    }
}

/// 单向同步时是否需要复制，以及原因
fn one_way_reason(status: FileStatus, from: Side, force: bool) -> Option<ReasonTag> {
    match (status, from) {
        (FileStatus::NewInA, Side::A) | (FileStatus::NewInB, Side::B) => Some(ReasonTag::New),
        (FileStatus::ModifiedNewerInA, Side::A) | (FileStatus::ModifiedNewerInB, Side::B) => {
            Some(ReasonTag::Modified)
        }
        (FileStatus::SizeMismatch, _) => Some(ReasonTag::SizeMismatch),
        (FileStatus::ModifiedNewerInB, Side::A) | (FileStatus::ModifiedNewerInA, Side::B)
            if force =>
        {
            Some(ReasonTag::ForcedOlder(from))
        }
        _ => None,
    }
}

/// 合并时的来源和原因
fn merge_reason(status: FileStatus) -> Option<(Side, ReasonTag)> {
    match status {
        FileStatus::NewInA => Some((Side::A, ReasonTag::UniqueFrom(Side::A))),
        FileStatus::NewInB => Some((Side::B, ReasonTag::UniqueFrom(Side::B))),
        FileStatus::ModifiedNewerInA | FileStatus::SizeMismatch => {
            Some((Side::A, ReasonTag::NewestFrom(Side::A)))
        }
        FileStatus::ModifiedNewerInB => Some((Side::B, ReasonTag::NewestFrom(Side::B))),
        FileStatus::Identical | FileStatus::ComparisonError => None,
    }
}

/// 将 / 分隔的相对路径拼接到根目录下
fn resolve_relative(root: &Path, relative_path: &str) -> PathBuf {
    relative_path
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}
