//! 交互会话上下文：目录配置、日志路径和最近一次分析结果

use crate::core::planner::same_path;
use crate::core::{Analysis, SyncRoots};
use crate::error::SyncError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// 会话状态
///
/// 修改任一目录都会丢弃上一次的分析结果（以及基于它的选择编号）。
#[derive(Debug, Clone)]
pub struct Session {
    roots: SyncRoots,
    log_path: PathBuf,
    analysis: Option<Analysis>,
}

impl Session {
    pub fn new(roots: SyncRoots, log_path: impl Into<PathBuf>) -> Self {
        Self {
            roots,
            log_path: log_path.into(),
            analysis: None,
        }
    }

    pub fn roots(&self) -> &SyncRoots {
        &self.roots
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn set_log_path(&mut self, path: impl Into<PathBuf>) {
        self.log_path = path.into();
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_ref()
    }

    /// 用新的分析结果整体替换旧结果
    pub fn replace_analysis(&mut self, analysis: Analysis) -> &Analysis {
        self.analysis.insert(analysis)
    }

    pub fn invalidate(&mut self) {
        self.analysis = None;
    }

    /// 修改目录 A：必须是已存在的目录，且不能与 B / C 相同
    pub fn set_root_a(&mut self, path: PathBuf) -> Result<(), SyncError> {
        check_directory(&path)?;
        check_distinct(&path, 'A', &self.roots.b, 'B')?;
        if let Some(c) = &self.roots.c {
            check_distinct(&path, 'A', c, 'C')?;
        }
        info!("目录 A 已修改为: {}", path.display());
        self.roots = SyncRoots {
            a: path,
            ..self.roots.clone()
        };
        self.invalidate();
        Ok(())
    }

    /// 修改目录 B：必须是已存在的目录，且不能与 A / C 相同
    pub fn set_root_b(&mut self, path: PathBuf) -> Result<(), SyncError> {
        check_directory(&path)?;
        check_distinct(&path, 'B', &self.roots.a, 'A')?;
        if let Some(c) = &self.roots.c {
            check_distinct(&path, 'B', c, 'C')?;
        }
        info!("目录 B 已修改为: {}", path.display());
        self.roots = SyncRoots {
            b: path,
            ..self.roots.clone()
        };
        self.invalidate();
        Ok(())
    }

    /// 修改合并目标目录 C；不存在时自动创建，None 表示清除
    pub fn set_root_c(&mut self, path: Option<PathBuf>) -> Result<(), SyncError> {
        let Some(path) = path else {
            info!("目录 C 已清除");
            self.roots.c = None;
            return Ok(());
        };

        if same_path(&path, &self.roots.a) || same_path(&path, &self.roots.b) {
            return Err(SyncError::MergeTargetConflict(path));
        }
        if !path.exists() {
            fs::create_dir_all(&path)?;
            info!("已创建目录 C: {}", path.display());
        }
        check_directory(&path)?;

        info!("目录 C 已修改为: {}", path.display());
        self.roots.c = Some(path);
        Ok(())
    }
}

fn check_directory(path: &Path) -> Result<(), SyncError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(SyncError::NotADirectory(path.to_path_buf()))
    }
}

fn check_distinct(
    path: &Path,
    side: char,
    other_path: &Path,
    other: char,
) -> Result<(), SyncError> {
    if same_path(path, other_path) {
        return Err(SyncError::RootConflict {
            side,
            other,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
