use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// 扫描结果：相对路径（以 / 分隔） -> 绝对路径
pub type ScanMap = HashMap<String, PathBuf>;

/// 文件扫描器配置
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// 排除规则（glob patterns），默认为空，即扫描所有普通文件
    pub exclude_patterns: Vec<String>,
}

/// 文件扫描器
#[derive(Debug, Clone, Default)]
pub struct FileScanner {
    config: ScanConfig,
}

impl FileScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// 检查路径是否应该被排除
    fn should_exclude(&self, path: &str) -> bool {
        self.config
            .exclude_patterns
            .iter()
            .any(|pattern| matches_pattern(path, pattern))
    }

    /// 递归扫描目录，返回所有普通文件
    ///
    /// 单个文件的错误只记录警告并跳过；根目录不可访问时返回空结果。
    pub fn scan(&self, root: &Path) -> ScanMap {
        let mut files = ScanMap::new();
        info!("开始扫描目录: {}", root.display());

        if !root.is_dir() {
            error!("扫描目录失败 {}: 不是可访问的目录", root.display());
            return files;
        }

        let mut excluded_count = 0;

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) if e.depth() == 0 => {
                    error!("扫描目录失败 {}: {}", root.display(), e);
                    return ScanMap::new();
                }
                Err(e) => {
                    warn!("无法访问文件或目录: {}", e);
                    continue;
                }
            };

            // 目录和符号链接本身不是条目
            if !entry.file_type().is_file() {
                continue;
            }

            let relative_path = match entry
                .path()
                .strip_prefix(root)
                .ok()
                .and_then(|p| p.to_str())
            {
                Some(p) => normalize_path(p),
                None => {
                    warn!("无法处理文件: {}", entry.path().display());
                    continue;
                }
            };

            if self.should_exclude(&relative_path) {
                debug!("排除文件: {}", relative_path);
                excluded_count += 1;
                continue;
            }

            files.insert(relative_path, entry.into_path());
        }

        info!(
            "扫描完成: {} 中找到 {} 个文件, {} 个被排除",
            root.display(),
            files.len(),
            excluded_count
        );

        files
    }

    /// 并发扫描两个目录，两个扫描都完成后才返回
    pub async fn scan_pair(&self, root_a: &Path, root_b: &Path) -> (ScanMap, ScanMap) {
        let scan_a = {
            let scanner = self.clone();
            let root = root_a.to_path_buf();
            tokio::task::spawn_blocking(move || scanner.scan(&root))
        };
        let scan_b = {
            let scanner = self.clone();
            let root = root_b.to_path_buf();
            tokio::task::spawn_blocking(move || scanner.scan(&root))
        };

        let (map_a, map_b) = tokio::join!(scan_a, scan_b);

        let map_a = map_a.unwrap_or_else(|e| {
            error!("扫描任务失败 {}: {}", root_a.display(), e);
            ScanMap::new()
        });
        let map_b = map_b.unwrap_or_else(|e| {
            error!("扫描任务失败 {}: {}", root_b.display(), e);
            ScanMap::new()
        });

        (map_a, map_b)
    }
}

/// 规范化路径分隔符（统一使用 /）
fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// 简单的 glob 模式匹配（不区分大小写）
fn matches_pattern(path: &str, pattern: &str) -> bool {
    let path = path.to_lowercase();
    let pattern = pattern.to_lowercase();

    // 处理 ** 通配符
    if let Some((prefix, suffix)) = pattern.split_once("**") {
        let prefix = prefix.trim_end_matches('/');
        let suffix = suffix.trim_start_matches('/');

        if !prefix.is_empty() && !(path == prefix || path.starts_with(&format!("{}/", prefix))) {
            return false;
        }

        return suffix.is_empty() || matches_pattern(file_name(&path), suffix);
    }

    // 处理 * 通配符
    if pattern.contains('*') {
        let regex_pattern = regex::escape(&pattern).replace("\\*", "[^/]*");
        return regex::Regex::new(&format!("^{}$", regex_pattern))
            .map(|re| re.is_match(&path) || re.is_match(file_name(&path)))
            .unwrap_or(false);
    }

    // 精确匹配
    path == pattern || path.ends_with(&format!("/{}", pattern))
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
