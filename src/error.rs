//! 错误类型

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 同步操作的前置条件 / 配置错误
///
/// 这些错误只中止当前请求的操作，不会终止整个会话。
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("合并目标目录（C）未设置")]
    MergeTargetMissing,

    #[error("合并目标目录不能与目录 A 或 B 相同: {0}")]
    MergeTargetConflict(PathBuf),

    #[error("不是有效的目录: {0}")]
    NotADirectory(PathBuf),

    #[error("目录 {side} 不能与目录 {other} 相同: {path}")]
    RootConflict {
        side: char,
        other: char,
        path: PathBuf,
    },

    #[error("IO 错误: {0}")]
    Io(#[from] io::Error),
}

/// 单个文件复制失败
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("创建目录失败 {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("复制 {from} 到 {to} 失败: {source}")]
    Stream {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("后台任务异常退出: {0}")]
    Worker(String),
}
