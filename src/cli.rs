//! 命令行参数

use crate::logging::DEFAULT_LOG_FILE;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dirsync")]
#[command(about = "比较两个目录并同步或合并其中的文件")]
#[command(version)]
pub struct Cli {
    /// 目录 A
    pub dir_a: Option<PathBuf>,
    /// 目录 B
    pub dir_b: Option<PathBuf>,
    /// 合并目标目录 C
    pub dir_c: Option<PathBuf>,
    /// 日志文件路径
    #[arg(long = "log", default_value = DEFAULT_LOG_FILE)]
    pub log: PathBuf,
    /// 配置目录（存放 config.json）
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}

/// 可识别的长选项
const KNOWN_LONG_OPTIONS: &[&str] = &["--log", "--config-dir", "--help", "--version"];

impl Cli {
    /// 解析命令行参数，忽略无法识别的 `--` 选项
    ///
    /// 返回解析结果和被忽略的参数，日志初始化后再记录。
    pub fn parse_lenient<I>(args: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let program = args.next();
        let (kept, ignored): (Vec<String>, Vec<String>) =
            args.partition(|arg| !is_unknown_long_option(arg));

        (Self::parse_from(program.into_iter().chain(kept)), ignored)
    }
}

fn is_unknown_long_option(arg: &str) -> bool {
    if !arg.starts_with("--") || arg == "--" {
        return false;
    }
    let name = arg.split_once('=').map_or(arg, |(name, _)| name);
    !KNOWN_LONG_OPTIONS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_directories() {
        let cli = Cli::try_parse_from(["dirsync", "/a", "/b", "/c"]).unwrap();
        assert_eq!(cli.dir_a, Some(PathBuf::from("/a")));
        assert_eq!(cli.dir_b, Some(PathBuf::from("/b")));
        assert_eq!(cli.dir_c, Some(PathBuf::from("/c")));
        assert_eq!(cli.log, PathBuf::from("LOGS.log"));
    }

    #[test]
    fn test_log_option_is_not_merge_target() {
        let cli = Cli::try_parse_from(["dirsync", "/a", "/b", "--log=sync.log"]).unwrap();
        assert_eq!(cli.dir_c, None);
        assert_eq!(cli.log, PathBuf::from("sync.log"));
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unknown_option_is_ignored() {
        let (cli, ignored) =
            Cli::parse_lenient(args(&["dirsync", "/a", "/b", "--verbose", "--log=x.log"]));
        assert_eq!(cli.dir_a, Some(PathBuf::from("/a")));
        assert_eq!(cli.dir_b, Some(PathBuf::from("/b")));
        assert_eq!(cli.dir_c, None);
        assert_eq!(cli.log, PathBuf::from("x.log"));
        assert_eq!(ignored, vec!["--verbose"]);
    }

    #[test]
    fn test_lenient_parse_keeps_known_options() {
        let (cli, ignored) = Cli::parse_lenient(args(&[
            "dirsync",
            "--config-dir",
            "/etc/dirsync",
            "/a",
            "/b",
            "/c",
            "--dry-run=yes",
        ]));
        assert_eq!(cli.config_dir, Some(PathBuf::from("/etc/dirsync")));
        assert_eq!(cli.dir_c, Some(PathBuf::from("/c")));
        assert_eq!(ignored, vec!["--dry-run=yes"]);
    }

    #[test]
    fn test_no_arguments() {
        let cli = Cli::try_parse_from(["dirsync"]).unwrap();
        assert_eq!(cli.dir_a, None);
        assert_eq!(cli.config_dir, None);
    }

    #[test]
    fn test_config_dir() {
        let cli = Cli::try_parse_from(["dirsync", "--config-dir", "/etc/dirsync"]).unwrap();
        assert_eq!(cli.config_dir, Some(PathBuf::from("/etc/dirsync")));
    }
}
