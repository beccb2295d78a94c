use crate::core::comparator::{ComparisonRecord, FileComparator, StatusSummary};
use crate::core::planner::{CopyTask, SyncDirection, SyncPlanner, SyncRequest, SyncRoots};
use crate::core::scanner::{FileScanner, ScanConfig};
use crate::core::transfer::{copy_file, CopyOutcome};
use crate::error::{CopyError, SyncError};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, error, info, warn};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 最大并发复制数
    pub max_concurrent_copies: usize,
    /// 扫描配置
    pub scan_config: ScanConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_copies: 4,
            scan_config: ScanConfig::default(),
        }
    }
}

/// 一次分析的结果，重新分析或修改目录时整体替换
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub records: Vec<ComparisonRecord>,
    pub summary: StatusSummary,
    pub files_in_a: usize,
    pub files_in_b: usize,
    pub analyzed_at: DateTime<Local>,
}

impl Analysis {
    /// 可选择的最大编号
    pub fn max_index(&self) -> usize {
        self.records.len()
    }
}

/// 同步结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Completed,
    CompletedWithErrors,
    Cancelled,
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub direction: Option<SyncDirection>,
    pub status: SyncStatus,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub duration_ms: u64,
    pub files_planned: u32,
    pub files_copied: u32,
    pub files_failed: u32,
    pub files_skipped: u32,
    pub bytes_transferred: u64,
    /// 修改时间未能同步等次要问题
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// 传输统计
#[derive(Debug, Default)]
struct TransferStats {
    files_completed: AtomicU64,
    files_failed: AtomicU64,
    files_skipped: AtomicU64,
    bytes_transferred: AtomicU64,
}

/// 同步引擎
pub struct SyncEngine {
    config: SyncConfig,
    cancelled: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 取消同步（尚未开始的任务将被跳过）
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// 检查是否已取消
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 扫描并比较目录 A 和 B
    pub async fn analyze(&self, roots: &SyncRoots) -> Analysis {
        info!("开始分析: A={}, B={}", roots.a.display(), roots.b.display());

        let scanner = FileScanner::with_config(self.config.scan_config.clone());
        let (map_a, map_b) = scanner.scan_pair(&roots.a, &roots.b).await;

        let records = FileComparator::new().classify(&map_a, &map_b);
        let summary = StatusSummary::from_records(&records);

        info!(
            "分析完成: 共 {} 条, 相同 {}, A 较新 {}, B 较新 {}, 大小不同 {}, 仅 A {}, 仅 B {}, 错误 {}",
            summary.total(),
            summary.identical,
            summary.newer_in_a,
            summary.newer_in_b,
            summary.size_mismatch,
            summary.new_in_a,
            summary.new_in_b,
            summary.errors
        );

        Analysis {
            files_in_a: map_a.len(),
            files_in_b: map_b.len(),
            records,
            summary,
            analyzed_at: Local::now(),
        }
    }

    /// 生成计划并执行同步
    ///
    /// 前置条件不满足（如合并目标无效）时返回错误，不会复制任何文件。
    pub async fn run_sync(
        &self,
        analysis: &Analysis,
        roots: &SyncRoots,
        request: &SyncRequest,
    ) -> Result<SyncReport, SyncError> {
        // 重置取消标志
        self.cancelled.store(false, Ordering::SeqCst);

        let tasks = SyncPlanner::new(roots).plan(request, &analysis.records)?;
        let mut report = self.execute(tasks).await;
        report.direction = Some(request.direction);
        Ok(report)
    }

    /// 执行复制任务
    ///
    /// 目标路径互不嵌套的任务并行执行；目标路径互为祖先的任务（如 `x` 与 `x/y`）
    /// 按路径顺序逐个执行。单个任务失败只计入错误数，其余任务继续执行。
    pub async fn execute(&self, tasks: Vec<CopyTask>) -> SyncReport {
        let started_at = Local::now();
        let files_planned = tasks.len() as u32;

        info!("开始执行同步: {} 个任务", files_planned);

        let (parallel, serial) = split_nested_destinations(tasks);
        if !serial.is_empty() {
            warn!("{} 个任务的目标路径相互嵌套, 将按顺序执行", serial.len());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_copies.max(1)));
        let tally = Tally::default();

        let mut handles = Vec::new();

        for task in parallel {
            if self.is_cancelled() {
                tally.stats.files_skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(e) => {
                    error!("获取并发许可失败: {}", e);
                    tally.stats.files_skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            // 等待许可期间可能已被取消
            if self.is_cancelled() {
                tally.stats.files_skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let tally = tally.clone();
            let handle = tokio::spawn(async move {
                let result = run_copy(&task).await;
                tally.record(&task, result).await;
                drop(permit);
            });

            handles.push(handle);
        }

        // 等待所有任务完成
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("复制任务异常: {}", e);
                tally.stats.files_failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        for task in serial {
            if self.is_cancelled() {
                tally.stats.files_skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            let result = run_copy(&task).await;
            tally.record(&task, result).await;
        }

        let stats = &tally.stats;
        let files_copied = stats.files_completed.load(Ordering::Relaxed) as u32;
        let files_failed = stats.files_failed.load(Ordering::Relaxed) as u32;
        let files_skipped = stats.files_skipped.load(Ordering::Relaxed) as u32;

        let status = if files_skipped > 0 {
            SyncStatus::Cancelled
        } else if files_failed > 0 {
            SyncStatus::CompletedWithErrors
        } else {
            SyncStatus::Completed
        };

        let finished_at = Local::now();
        let report = SyncReport {
            direction: None,
            status,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
            files_planned,
            files_copied,
            files_failed,
            files_skipped,
            bytes_transferred: stats.bytes_transferred.load(Ordering::Relaxed),
            warnings: tally.warnings.read().await.clone(),
            errors: tally.errors.read().await.clone(),
        };

        if files_skipped > 0 {
            warn!("同步已取消, {} 个任务未执行", files_skipped);
        }
        info!(
            "同步完成. 成功: {}, 错误: {}",
            report.files_copied, report.files_failed
        );
        debug!("同步报告: {:?}", report);

        report
    }
}

/// 复制结果汇总，在并行任务之间共享
#[derive(Clone, Default)]
struct Tally {
    stats: Arc<TransferStats>,
    errors: Arc<RwLock<Vec<String>>>,
    warnings: Arc<RwLock<Vec<String>>>,
}

impl Tally {
    async fn record(&self, task: &CopyTask, result: Result<CopyOutcome, CopyError>) {
        match result {
            Ok(outcome) => {
                self.stats.files_completed.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_transferred
                    .fetch_add(outcome.bytes, Ordering::Relaxed);
                info!(
                    "[OK] 已复制 (#{}): {} (原因: {})",
                    task.display_index, task.relative_path, task.reason
                );
                if let Some(warning) = outcome.mtime_warning {
                    warn!("{}", warning);
                    self.warnings.write().await.push(warning);
                }
            }
            Err(e) => {
                self.stats.files_failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    "[失败] 复制出错 (#{}): {} -> {}: {}",
                    task.display_index,
                    task.source.display(),
                    task.destination.display(),
                    e
                );
                self.errors
                    .write()
                    .await
                    .push(format!("{}: {}", task.relative_path, e));
            }
        }
    }
}

/// 拆分出目标路径与其他任务互为祖先的任务
///
/// 返回 (可并行的任务, 需按路径顺序执行的任务)。
fn split_nested_destinations(tasks: Vec<CopyTask>) -> (Vec<CopyTask>, Vec<CopyTask>) {
    let destinations: HashSet<PathBuf> = tasks.iter().map(|t| t.destination.clone()).collect();

    let mut nested = HashSet::new();
    for task in &tasks {
        for ancestor in task.destination.ancestors().skip(1) {
            if destinations.contains(ancestor) {
                nested.insert(ancestor.to_path_buf());
                nested.insert(task.destination.clone());
            }
        }
    }

    let (mut serial, parallel): (Vec<_>, Vec<_>) = tasks
        .into_iter()
        .partition(|t| nested.contains(&t.destination));
    serial.sort_by(|a, b| a.destination.cmp(&b.destination));
    (parallel, serial)
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 在阻塞线程中执行单个复制
async fn run_copy(task: &CopyTask) -> Result<CopyOutcome, CopyError> {
    let source = task.source.clone();
    let destination = task.destination.clone();
    tokio::task::spawn_blocking(move || copy_file(&source, &destination))
        .await
        .map_err(|e| CopyError::Worker(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comparator::FileStatus;
    use crate::core::planner::ReasonTag;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn write_with_mtime(path: &Path, content: &str, secs: i64) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    fn task(index: usize, source: PathBuf, destination: PathBuf) -> CopyTask {
        CopyTask {
            display_index: index,
            relative_path: format!("file{}", index),
            source,
            destination,
            reason: ReasonTag::New,
        }
    }

    #[tokio::test]
    async fn test_analyze_two_roots() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write_with_mtime(&a.path().join("foo.txt"), "foo", 100);
        write_with_mtime(&a.path().join("sub/bar.txt"), "bar", 100);
        write_with_mtime(&b.path().join("sub/bar.txt"), "bar", 100);

        let roots = SyncRoots::new(a.path(), b.path());
        let analysis = SyncEngine::new().analyze(&roots).await;

        assert_eq!(analysis.files_in_a, 2);
        assert_eq!(analysis.files_in_b, 1);
        assert_eq!(analysis.max_index(), 2);
        assert_eq!(analysis.records[0].relative_path, "foo.txt");
        assert_eq!(analysis.records[0].status, FileStatus::NewInA);
        assert_eq!(analysis.records[1].status, FileStatus::Identical);
        assert_eq!(analysis.summary.identical, 1);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort_batch() {
        let dir = TempDir::new().unwrap();
        let ok_source = dir.path().join("ok.txt");
        fs::write(&ok_source, "ok").unwrap();

        let tasks = vec![
            task(1, dir.path().join("missing.txt"), dir.path().join("out/missing.txt")),
            task(2, ok_source, dir.path().join("out/ok.txt")),
        ];

        let report = SyncEngine::new().execute(tasks).await;

        assert_eq!(report.files_planned, 2);
        assert_eq!(report.files_copied, 1);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.bytes_transferred, 2);
        assert_eq!(report.status, SyncStatus::CompletedWithErrors);
        assert!(dir.path().join("out/ok.txt").exists());
    }

    #[tokio::test]
    async fn test_run_sync_merge_with_invalid_target() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write_with_mtime(&a.path().join("foo.txt"), "foo", 100);

        let roots = SyncRoots::new(a.path(), b.path()).with_merge_target(a.path());
        let engine = SyncEngine::new();
        let analysis = engine.analyze(&roots).await;

        let result = engine
            .run_sync(&analysis, &roots, &SyncRequest::new(SyncDirection::MergeToC))
            .await;
        assert!(matches!(result, Err(SyncError::MergeTargetConflict(_))));
    }

    #[tokio::test]
    async fn test_run_sync_merge_into_c() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let c = TempDir::new().unwrap();
        write_with_mtime(&a.path().join("shared.txt"), "older", 100);
        write_with_mtime(&b.path().join("shared.txt"), "newer!", 200);
        write_with_mtime(&b.path().join("qux.txt"), "qux", 100);
        write_with_mtime(&a.path().join("docs/only_a.md"), "a", 100);

        let roots = SyncRoots::new(a.path(), b.path()).with_merge_target(c.path());
        let engine = SyncEngine::new();
        let analysis = engine.analyze(&roots).await;
        let report = engine
            .run_sync(&analysis, &roots, &SyncRequest::new(SyncDirection::MergeToC))
            .await
            .unwrap();

        assert_eq!(report.direction, Some(SyncDirection::MergeToC));
        assert_eq!(report.files_copied, 3);
        assert_eq!(report.status, SyncStatus::Completed);
        assert_eq!(fs::read_to_string(c.path().join("shared.txt")).unwrap(), "newer!");
        assert_eq!(fs::read_to_string(c.path().join("qux.txt")).unwrap(), "qux");
        assert!(c.path().join("docs/only_a.md").exists());
        // 源目录不受影响
        assert!(!b.path().join("docs").exists());
    }

    #[tokio::test]
    async fn test_cancelled_engine_skips_remaining_tasks() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, "a").unwrap();

        let engine = SyncEngine::new();
        engine.cancel();
        let report = engine
            .execute(vec![
                task(1, source.clone(), dir.path().join("out/1.txt")),
                task(2, source, dir.path().join("out/2.txt")),
            ])
            .await;

        assert_eq!(report.status, SyncStatus::Cancelled);
        assert_eq!(report.files_skipped, 2);
        assert_eq!(report.files_copied, 0);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_split_nested_destinations() {
        let tasks = vec![
            task(1, PathBuf::from("/a/x/y"), PathBuf::from("/c/x/y")),
            task(2, PathBuf::from("/a/other"), PathBuf::from("/c/other")),
            task(3, PathBuf::from("/b/x"), PathBuf::from("/c/x")),
            task(4, PathBuf::from("/a/x-1"), PathBuf::from("/c/x-1")),
        ];

        let (parallel, serial) = split_nested_destinations(tasks);

        let parallel: Vec<usize> = parallel.iter().map(|t| t.display_index).collect();
        let serial: Vec<usize> = serial.iter().map(|t| t.display_index).collect();
        assert_eq!(parallel, vec![2, 4]);
        assert_eq!(serial, vec![3, 1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_merge_file_and_nested_path_is_deterministic() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write_with_mtime(&a.path().join("x"), "file from a", 100);
        write_with_mtime(&b.path().join("x/y"), "nested in b", 100);

        for round in 0..20 {
            let c = TempDir::new().unwrap();
            let roots = SyncRoots::new(a.path(), b.path()).with_merge_target(c.path());
            let engine = SyncEngine::new();
            let analysis = engine.analyze(&roots).await;
            let report = engine
                .run_sync(&analysis, &roots, &SyncRequest::new(SyncDirection::MergeToC))
                .await
                .unwrap();

            assert!(c.path().join("x").is_file(), "round {}", round);
            assert_eq!(fs::read_to_string(c.path().join("x")).unwrap(), "file from a");
            assert_eq!(report.files_copied, 1);
            assert_eq!(report.files_failed, 1);
            assert!(report.errors[0].starts_with("x/y"));
        }
    }

    #[tokio::test]
    async fn test_mtime_warning_reaches_report_list() {
        let tally = Tally::default();
        let outcome = CopyOutcome {
            bytes: 3,
            mtime_warning: Some("out/foo.txt: 修改时间未同步".to_string()),
        };

        let copied = task(1, PathBuf::from("foo.txt"), PathBuf::from("out/foo.txt"));
        tally.record(&copied, Ok(outcome)).await;

        assert_eq!(tally.stats.files_completed.load(Ordering::Relaxed), 1);
        assert_eq!(tally.stats.files_failed.load(Ordering::Relaxed), 0);
        assert_eq!(tally.stats.bytes_transferred.load(Ordering::Relaxed), 3);
        assert_eq!(tally.warnings.read().await.len(), 1);
        assert!(tally.errors.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_plan() {
        let report = SyncEngine::new().execute(Vec::new()).await;
        assert_eq!(report.files_planned, 0);
        assert_eq!(report.status, SyncStatus::Completed);
    }
}
