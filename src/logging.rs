//! 日志模块 - 提供文件日志和大小管理功能

use crate::config::read_section;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

/// 默认日志文件
pub const DEFAULT_LOG_FILE: &str = "LOGS.log";

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用文件日志
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大日志文件大小（MB）
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5 // 默认 5MB
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    /// 从配置文件加载日志配置
    pub fn load(config_dir: &Path) -> Self {
        read_section(config_dir, "log").unwrap_or_default()
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }

    /// 限制范围 1-100 MB
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb.clamp(1, 100) as u64) * 1024 * 1024
    }
}

struct LogFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

/// 带大小限制、可切换路径的日志写入器
#[derive(Clone)]
pub struct SizeRotatingWriter {
    inner: Arc<Mutex<LogFile>>,
    max_size: u64,
}

impl SizeRotatingWriter {
    pub fn new(file_path: &Path, max_size: u64) -> io::Result<Self> {
        let writer = Self::open_file(file_path, max_size)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(LogFile {
                path: file_path.to_path_buf(),
                writer: Some(writer),
            })),
            max_size,
        })
    }

    fn open_file(file_path: &Path, max_size: u64) -> io::Result<BufWriter<File>> {
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // 检查现有文件大小，如果超过限制则轮转
        if let Ok(metadata) = fs::metadata(file_path) {
            if metadata.len() > max_size {
                Self::rotate_log(file_path)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(BufWriter::new(file))
    }

    /// 轮转日志文件：当前文件重命名为 <name>.old
    fn rotate_log(file_path: &Path) -> io::Result<()> {
        let mut backup = file_path.as_os_str().to_owned();
        backup.push(".old");
        let backup_path = PathBuf::from(backup);

        // 如果备份已存在，删除它
        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }

        fs::rename(file_path, &backup_path)
    }

    fn lock(inner: &Mutex<LogFile>) -> MutexGuard<'_, LogFile> {
        inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 切换到新的日志文件；打开失败时保留原文件
    pub fn reopen(&self, new_path: &Path) -> io::Result<()> {
        let new_writer = Self::open_file(new_path, self.max_size)?;

        let mut guard = Self::lock(&self.inner);
        if let Some(mut w) = guard.writer.take() {
            let _ = w.flush();
        }
        guard.writer = Some(new_writer);
        guard.path = new_path.to_path_buf();
        Ok(())
    }

    /// 当前日志文件路径
    pub fn path(&self) -> PathBuf {
        Self::lock(&self.inner).path.clone()
    }
}

/// 日志写入器包装
pub struct LogWriter {
    inner: Arc<Mutex<LogFile>>,
    max_size: u64,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = SizeRotatingWriter::lock(&self.inner);

        let written = match guard.writer.as_mut() {
            Some(writer) => {
                let n = writer.write(buf)?;
                writer.flush()?;
                n
            }
            None => return Err(io::Error::other("Writer not available")),
        };

        // 检查文件大小
        let too_large = fs::metadata(&guard.path)
            .map(|m| m.len() > self.max_size)
            .unwrap_or(false);
        if too_large {
            if let Some(mut w) = guard.writer.take() {
                let _ = w.flush();
            }
            let path = guard.path.clone();
            let _ = SizeRotatingWriter::rotate_log(&path);
            guard.writer = SizeRotatingWriter::open_file(&path, self.max_size).ok();
        }

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match SizeRotatingWriter::lock(&self.inner).writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            inner: self.inner.clone(),
            max_size: self.max_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_and_creates_parent_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/sync.log");
        let writer = SizeRotatingWriter::new(&path, 1024).unwrap();

        writer.make_writer().write_all(b"hello\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync.log");
        fs::write(&path, "old line\n").unwrap();

        let writer = SizeRotatingWriter::new(&path, 1024).unwrap();
        writer.make_writer().write_all(b"new line\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "old line\nnew line\n");
    }

    #[test]
    fn test_rotates_when_over_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync.log");
        let writer = SizeRotatingWriter::new(&path, 8).unwrap();

        writer.make_writer().write_all(b"0123456789").unwrap();
        writer.make_writer().write_all(b"next").unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("sync.log.old")).unwrap(),
            "0123456789"
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "next");
    }

    #[test]
    fn test_reopen_switches_file() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("nested/second.log");
        let writer = SizeRotatingWriter::new(&first, 1024).unwrap();

        writer.make_writer().write_all(b"one\n").unwrap();
        writer.reopen(&second).unwrap();
        writer.make_writer().write_all(b"two\n").unwrap();

        assert_eq!(writer.path(), second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "one\n");
        assert_eq!(fs::read_to_string(&second).unwrap(), "two\n");
    }

    #[test]
    fn test_reopen_failure_keeps_current_file() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.log");
        fs::write(dir.path().join("blocker"), "file").unwrap();
        let writer = SizeRotatingWriter::new(&first, 1024).unwrap();

        assert!(writer.reopen(&dir.path().join("blocker/x.log")).is_err());
        writer.make_writer().write_all(b"still here\n").unwrap();
        assert_eq!(writer.path(), first);
        assert_eq!(fs::read_to_string(&first).unwrap(), "still here\n");
    }

    #[test]
    fn test_tracing_level() {
        let config = LogConfig {
            level: "DEBUG".to_string(),
            ..Default::default()
        };
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
        assert_eq!(LogConfig::default().tracing_level(), tracing::Level::INFO);
    }
}
