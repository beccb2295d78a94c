use crate::core::scanner::ScanMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// 目录标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// 文件比较状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileStatus {
    /// 两边都有，大小和修改时间都相同
    Identical,
    /// 两边都有，A 的修改时间更新
    ModifiedNewerInA,
    /// 两边都有，B 的修改时间更新
    ModifiedNewerInB,
    /// 两边都有，修改时间完全相同但大小不同
    SizeMismatch,
    /// 只有 A 有
    NewInA,
    /// 只有 B 有
    NewInB,
    /// 读取元数据失败
    ComparisonError,
}

impl FileStatus {
    pub fn is_modified(&self) -> bool {
        matches!(
            self,
            FileStatus::ModifiedNewerInA | FileStatus::ModifiedNewerInB | FileStatus::SizeMismatch
        )
    }

    /// 从某一侧看到的状态标签（另一侧较新时显示为过时）
    pub fn label_for(&self, side: Side) -> &'static str {
        match (self, side) {
            (FileStatus::ModifiedNewerInB, Side::A) => "过时（B 较新）",
            (FileStatus::ModifiedNewerInA, Side::B) => "过时（A 较新）",
            _ => self.label(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::Identical => "相同",
            FileStatus::ModifiedNewerInA => "已修改（A 较新）",
            FileStatus::ModifiedNewerInB => "已修改（B 较新）",
            FileStatus::SizeMismatch => "已修改（大小不同）",
            FileStatus::NewInA => "新文件（在 A）",
            FileStatus::NewInB => "新文件（在 B）",
            FileStatus::ComparisonError => "错误（读取失败）",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 单个相对路径的比较结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonRecord {
    pub relative_path: String,
    pub status: FileStatus,
    pub path_in_a: Option<PathBuf>,
    pub path_in_b: Option<PathBuf>,
    /// 1 开始的选择编号，0 表示尚未分配
    pub display_index: usize,
}

impl ComparisonRecord {
    pub fn path_in(&self, side: Side) -> Option<&Path> {
        match side {
            Side::A => self.path_in_a.as_deref(),
            Side::B => self.path_in_b.as_deref(),
        }
    }
}

/// 状态统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub identical: usize,
    pub newer_in_a: usize,
    pub newer_in_b: usize,
    pub size_mismatch: usize,
    pub new_in_a: usize,
    pub new_in_b: usize,
    pub errors: usize,
}

impl StatusSummary {
    pub fn from_records(records: &[ComparisonRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            match record.status {
                FileStatus::Identical => summary.identical += 1,
                FileStatus::ModifiedNewerInA => summary.newer_in_a += 1,
                FileStatus::ModifiedNewerInB => summary.newer_in_b += 1,
                FileStatus::SizeMismatch => summary.size_mismatch += 1,
                FileStatus::NewInA => summary.new_in_a += 1,
                FileStatus::NewInB => summary.new_in_b += 1,
                FileStatus::ComparisonError => summary.errors += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.identical
            + self.newer_in_a
            + self.newer_in_b
            + self.size_mismatch
            + self.new_in_a
            + self.new_in_b
            + self.errors
    }
}

/// 文件比较器（仅比较大小和修改时间）
#[derive(Debug, Clone, Copy, Default)]
pub struct FileComparator;

impl FileComparator {
    pub fn new() -> Self {
        Self
    }

    /// 比较两边都存在的文件
    pub fn compare_files(&self, path_a: &Path, path_b: &Path) -> io::Result<FileStatus> {
        let (size_a, modified_a) = size_and_mtime(path_a)?;
        let (size_b, modified_b) = size_and_mtime(path_b)?;

        if size_a == size_b && modified_a == modified_b {
            return Ok(FileStatus::Identical);
        }

        let status = if modified_a > modified_b {
            FileStatus::ModifiedNewerInA
        } else if modified_b > modified_a {
            FileStatus::ModifiedNewerInB
        } else {
            FileStatus::SizeMismatch
        };

        debug!(
            "文件不同: {} (size_a={}, size_b={}, 状态={:?})",
            path_a.display(),
            size_a,
            size_b,
            status
        );

        Ok(status)
    }

    /// 比较两次扫描结果，返回按相对路径排序并已编号的记录
    pub fn classify(&self, map_a: &ScanMap, map_b: &ScanMap) -> Vec<ComparisonRecord> {
        // BTreeSet 保证按字节序排序
        let all_paths: BTreeSet<&String> = map_a.keys().chain(map_b.keys()).collect();

        let mut records: Vec<ComparisonRecord> = all_paths
            .into_iter()
            .map(|relative_path| {
                let path_in_a = map_a.get(relative_path);
                let path_in_b = map_b.get(relative_path);

                let status = match (path_in_a, path_in_b) {
                    (Some(a), Some(b)) => match self.compare_files(a, b) {
                        Ok(status) => status,
                        Err(e) => {
                            warn!("无法比较文件: {} 错误: {}", relative_path, e);
                            FileStatus::ComparisonError
                        }
                    },
                    (Some(_), None) => FileStatus::NewInA,
                    (None, Some(_)) => FileStatus::NewInB,
                    (None, None) => unreachable!(),
                };

                ComparisonRecord {
                    relative_path: relative_path.clone(),
                    status,
                    path_in_a: path_in_a.cloned(),
                    path_in_b: path_in_b.cloned(),
                    display_index: 0,
                }
            })
            .collect();

        info!("比较完成. 唯一相对路径总数: {}", records.len());

        assign_display_indexes(&mut records);
        records
    }
}

/// 为完整列表分配 1..=N 的选择编号
pub fn assign_display_indexes(records: &mut [ComparisonRecord]) {
    for (i, record) in records.iter_mut().enumerate() {
        record.display_index = i + 1;
    }
    info!("已为 {} 个条目分配选择编号", records.len());
}

fn size_and_mtime(path: &Path) -> io::Result<(u64, SystemTime)> {
    let metadata = fs::metadata(path)?;
    Ok((metadata.len(), metadata.modified()?))
}
