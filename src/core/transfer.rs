//! 文件复制：先复制内容，再尽力同步修改时间

use crate::error::CopyError;
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// 复制结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyOutcome {
    /// 写入的字节数
    pub bytes: u64,
    /// 修改时间未能同步时的说明（不视为失败）
    pub mtime_warning: Option<String>,
}

/// 复制单个文件，目标文件被整体替换
pub fn copy_file(source: &Path, destination: &Path) -> Result<CopyOutcome, CopyError> {
    copy_file_with(source, destination, |path, mtime| {
        filetime::set_file_mtime(path, mtime)
    })
}

fn copy_file_with<F>(
    source: &Path,
    destination: &Path,
    set_mtime: F,
) -> Result<CopyOutcome, CopyError>
where
    F: FnOnce(&Path, FileTime) -> io::Result<()>,
{
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| CopyError::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let bytes = stream_bytes(source, destination).map_err(|e| CopyError::Stream {
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
        source: e,
    })?;

    let mtime_warning = copy_mtime(source, destination, set_mtime).err().map(|e| {
        debug!("无法复制文件属性: {} - {}", destination.display(), e);
        format!("{}: 修改时间未同步 ({})", destination.display(), e)
    });

    Ok(CopyOutcome {
        bytes,
        mtime_warning,
    })
}

fn stream_bytes(source: &Path, destination: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(source)?);
    let mut writer = BufWriter::new(File::create(destination)?);
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    Ok(bytes)
}

fn copy_mtime<F>(source: &Path, destination: &Path, set_mtime: F) -> io::Result<()>
where
    F: FnOnce(&Path, FileTime) -> io::Result<()>,
{
    let metadata = fs::metadata(source)?;
    set_mtime(destination, FileTime::from_last_modification_time(&metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::set_file_mtime;
    use tempfile::TempDir;

    #[test]
    fn test_copy_creates_parents_and_preserves_mtime() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src.txt");
        fs::write(&source, "payload").unwrap();
        set_file_mtime(&source, FileTime::from_unix_time(1_704_067_200, 0)).unwrap();

        let destination = dir.path().join("out/nested/dst.txt");
        let outcome = copy_file(&source, &destination).unwrap();

        assert_eq!(outcome.bytes, 7);
        assert_eq!(outcome.mtime_warning, None);
        assert_eq!(fs::read_to_string(&destination).unwrap(), "payload");
        assert_eq!(
            fs::metadata(&destination).unwrap().modified().unwrap(),
            fs::metadata(&source).unwrap().modified().unwrap()
        );
    }

    #[test]
    fn test_copy_replaces_existing_content() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("short.txt");
        let destination = dir.path().join("long.txt");
        fs::write(&source, "ab").unwrap();
        fs::write(&destination, "much longer content").unwrap();

        copy_file(&source, &destination).unwrap();
        assert_eq!(fs::read_to_string(&destination).unwrap(), "ab");
    }

    #[test]
    fn test_existing_parent_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, "x").unwrap();
        fs::create_dir_all(dir.path().join("exists")).unwrap();

        assert!(copy_file(&source, &dir.path().join("exists/a.txt")).is_ok());
    }

    #[test]
    fn test_mtime_failure_is_only_a_warning() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src.txt");
        fs::write(&source, "payload").unwrap();
        let destination = dir.path().join("dst.txt");

        let outcome = copy_file_with(&source, &destination, |_, _| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        })
        .unwrap();

        assert_eq!(outcome.bytes, 7);
        assert_eq!(fs::read_to_string(&destination).unwrap(), "payload");
        let warning = outcome.mtime_warning.unwrap();
        assert!(warning.contains("修改时间未同步"));
        assert!(warning.contains("read-only"));
    }

    #[test]
    fn test_missing_source_is_stream_error() {
        let dir = TempDir::new().unwrap();
        let result = copy_file(&dir.path().join("missing"), &dir.path().join("out.txt"));
        assert!(matches!(result, Err(CopyError::Stream { .. })));
    }

    #[test]
    fn test_parent_blocked_by_file_is_create_dir_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, "x").unwrap();
        fs::write(dir.path().join("blocker"), "not a dir").unwrap();

        let result = copy_file(&source, &dir.path().join("blocker/a.txt"));
        assert!(matches!(result, Err(CopyError::CreateDir { .. })));
    }
}
