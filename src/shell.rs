//! 交互式菜单

use crate::core::{
    parse_selection, ComparisonRecord, FileStatus, Side, SyncDirection, SyncEngine, SyncReport,
    SyncRequest,
};
use crate::error::SyncError;
use crate::logging::{SizeRotatingWriter, DEFAULT_LOG_FILE};
use crate::session::Session;
use anyhow::Result;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{error, info, warn};

/// 菜单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Main,
    Sync,
    Paths,
    Exit,
}

/// 目录树显示过滤条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeFilter {
    pub modified_and_new: bool,
    pub identical: bool,
}

impl TreeFilter {
    pub const ALL: TreeFilter = TreeFilter {
        modified_and_new: true,
        identical: true,
    };

    fn accepts(&self, status: FileStatus) -> bool {
        match status {
            FileStatus::Identical => self.identical,
            // 读取失败的条目只在完整分析中显示
            FileStatus::ComparisonError => self.modified_and_new && self.identical,
            _ => self.modified_and_new,
        }
    }
}

/// 渲染某一侧的目录树
///
/// 显示该侧存在的文件，以及两侧都有的已修改 / 相同文件。
pub fn render_tree(records: &[ComparisonRecord], side: Side, filter: TreeFilter) -> Vec<String> {
    let mut lines = Vec::new();
    let mut printed_dirs = HashSet::new();

    for record in records {
        if !filter.accepts(record.status) {
            continue;
        }

        let exists_here = record.path_in(side).is_some();
        if !exists_here && !record.status.is_modified() && record.status != FileStatus::Identical {
            continue;
        }

        let parts: Vec<&str> = record.relative_path.split('/').collect();
        let (file_name, dirs) = match parts.split_last() {
            Some((name, dirs)) => (*name, dirs),
            None => continue,
        };

        for depth in 0..dirs.len() {
            let prefix = dirs[..=depth].join("/");
            if printed_dirs.insert(prefix) {
                lines.push(format!("{}+ {}", "  ".repeat(depth), dirs[depth]));
            }
        }

        let index = if record.display_index > 0 {
            format!(" (№{})", record.display_index)
        } else {
            String::new()
        };

        lines.push(format!(
            "{}- {} [{}{}]",
            "  ".repeat(dirs.len()),
            file_name,
            record.status.label_for(side),
            index
        ));
    }

    if lines.is_empty() {
        lines.push("(没有符合该筛选条件的文件)".to_string());
    }
    lines
}

/// 交互式命令行外壳
pub struct Shell<R, W> {
    session: Session,
    engine: Arc<SyncEngine>,
    log_writer: Option<SizeRotatingWriter>,
    input: Lines<R>,
    out: W,
}

impl<R, W> Shell<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        session: Session,
        engine: Arc<SyncEngine>,
        log_writer: Option<SizeRotatingWriter>,
        input: R,
        out: W,
    ) -> Self {
        Self {
            session,
            engine,
            log_writer,
            input: input.lines(),
            out,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// 运行菜单循环直到退出或输入结束
    pub async fn run(&mut self) -> Result<()> {
        if !self.ensure_roots().await? {
            info!("输入结束, 退出程序");
            return Ok(());
        }

        let mut state = MenuState::Main;
        loop {
            state = match state {
                MenuState::Main => self.main_menu().await?,
                MenuState::Sync => self.sync_menu().await?,
                MenuState::Paths => self.paths_menu().await?,
                MenuState::Exit => break,
            };
        }

        info!("退出程序");
        Ok(())
    }

    /// 显示提示并读取一行，输入结束时返回 None
    async fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.out, "{}", text)?;
        self.out.flush()?;
        Ok(self
            .input
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    async fn pause(&mut self) -> Result<MenuState> {
        Ok(match self.prompt("\n按 Enter 返回菜单...").await? {
            Some(_) => MenuState::Main,
            None => MenuState::Exit,
        })
    }

    /// 启动时确保目录 A 和 B 有效
    async fn ensure_roots(&mut self) -> Result<bool> {
        for side in [Side::A, Side::B] {
            loop {
                let current = match side {
                    Side::A => &self.session.roots().a,
                    Side::B => &self.session.roots().b,
                };
                if current.is_dir() {
                    break;
                }

                let Some(input) = self
                    .prompt(&format!("请输入目录 {} 的完整路径: ", side))
                    .await?
                else {
                    return Ok(false);
                };
                if input.is_empty() {
                    continue;
                }

                let result = match side {
                    Side::A => self.session.set_root_a(PathBuf::from(input)),
                    Side::B => self.session.set_root_b(PathBuf::from(input)),
                };
                if let Err(e) = result {
                    writeln!(self.out, "错误: {}", e)?;
                }
            }
        }
        Ok(true)
    }

    fn print_main_menu(&mut self) -> Result<()> {
        let roots = self.session.roots().clone();
        writeln!(self.out, "\n===== 主菜单 =====")?;
        writeln!(self.out, "当前配置:")?;
        writeln!(self.out, "  目录 A: {}", absolute(&roots.a).display())?;
        writeln!(self.out, "  目录 B: {}", absolute(&roots.b).display())?;
        writeln!(
            self.out,
            "  目录 C (合并目标): {}",
            roots
                .c
                .as_deref()
                .map(|c| absolute(c).display().to_string())
                .unwrap_or_else(|| "未设置".to_string())
        )?;
        writeln!(
            self.out,
            "  日志文件: {}",
            absolute(self.session.log_path()).display()
        )?;
        writeln!(self.out, "操作:")?;
        writeln!(self.out, "  1. 分析已修改 / 新文件")?;
        writeln!(self.out, "  2. 分析相同文件")?;
        writeln!(self.out, "  3. 完整分析")?;
        writeln!(self.out, "  4. 同步")?;
        writeln!(self.out, "  5. 修改目录 / 日志文件路径")?;
        writeln!(self.out, "  6. 退出")?;
        writeln!(self.out, "==================")?;
        Ok(())
    }

    async fn main_menu(&mut self) -> Result<MenuState> {
        self.print_main_menu()?;

        let Some(choice) = self.prompt("请选择操作: ").await? else {
            return Ok(MenuState::Exit);
        };

        match choice.parse::<u32>() {
            Ok(1) => self.analyze_and_display(TreeFilter {
                modified_and_new: true,
                identical: false,
            })
            .await?,
            Ok(2) => self.analyze_and_display(TreeFilter {
                modified_and_new: false,
                identical: true,
            })
            .await?,
            Ok(3) => self.analyze_and_display(TreeFilter::ALL).await?,
            Ok(4) => return Ok(MenuState::Sync),
            Ok(5) => return Ok(MenuState::Paths),
            Ok(6) => return Ok(MenuState::Exit),
            _ => {
                writeln!(self.out, "无效的选择。请输入 1 到 6 之间的数字。")?;
                warn!("输入了无效的菜单项: {}", choice);
            }
        }

        self.pause().await
    }

    /// 重新扫描比较并显示两侧目录树
    async fn analyze_and_display(&mut self, filter: TreeFilter) -> Result<()> {
        let roots = self.session.roots().clone();
        let analysis = self.engine.analyze(&roots).await;
        let analysis = self.session.replace_analysis(analysis);

        let summary = analysis.summary.clone();
        let analyzed_at = analysis.analyzed_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let tree_a = render_tree(&analysis.records, Side::A, filter);
        let tree_b = render_tree(&analysis.records, Side::B, filter);

        writeln!(self.out, "\n===== 分析结果 =====")?;
        writeln!(self.out, "分析时间: {}", analyzed_at)?;
        writeln!(self.out, "\n--- 目录 A 内容 ({}) ---", absolute(&roots.a).display())?;
        for line in tree_a {
            writeln!(self.out, "{}", line)?;
        }
        writeln!(self.out, "\n--- 目录 B 内容 ({}) ---", absolute(&roots.b).display())?;
        for line in tree_b {
            writeln!(self.out, "{}", line)?;
        }
        writeln!(
            self.out,
            "\n共 {} 条: 相同 {}, 已修改 {}, 仅 A {}, 仅 B {}, 错误 {}",
            summary.total(),
            summary.identical,
            summary.newer_in_a + summary.newer_in_b + summary.size_mismatch,
            summary.new_in_a,
            summary.new_in_b,
            summary.errors
        )?;
        writeln!(self.out, "====================")?;

        info!("分析结果显示完成");
        Ok(())
    }

    async fn sync_menu(&mut self) -> Result<MenuState> {
        self.analyze_and_display(TreeFilter::ALL).await?;

        writeln!(self.out, "\n===== 同步菜单 =====")?;
        writeln!(self.out, "1. 同步 A -> B (将新文件 / 已修改文件从 A 复制到 B)")?;
        writeln!(self.out, "2. 同步 B -> A (将新文件 / 已修改文件从 B 复制到 A)")?;
        writeln!(self.out, "3. 合并 A + B -> C (将唯一文件 / 最新文件复制到 C)")?;
        writeln!(self.out, "4. 选择性同步 A -> B")?;
        writeln!(self.out, "5. 选择性同步 B -> A")?;
        writeln!(self.out, "6. 选择性合并 A + B -> C")?;
        writeln!(self.out, "7. 返回")?;
        writeln!(self.out, "====================")?;

        let Some(choice) = self.prompt("请选择操作: ").await? else {
            return Ok(MenuState::Exit);
        };

        let (direction, selective) = match choice.parse::<u32>() {
            Ok(1) => (SyncDirection::AToB, false),
            Ok(2) => (SyncDirection::BToA, false),
            Ok(3) => (SyncDirection::MergeToC, false),
            Ok(4) => (SyncDirection::AToB, true),
            Ok(5) => (SyncDirection::BToA, true),
            Ok(6) => (SyncDirection::MergeToC, true),
            Ok(7) => return Ok(MenuState::Main),
            _ => {
                writeln!(self.out, "无效的选择。")?;
                return self.pause().await;
            }
        };

        if direction == SyncDirection::MergeToC && self.session.roots().c.is_none() {
            let Some(input) = self.prompt("请输入合并目标目录 C 的完整路径: ").await? else {
                return Ok(MenuState::Exit);
            };
            if input.is_empty() {
                writeln!(self.out, "合并已取消，需要目录 C 的路径。")?;
                return self.pause().await;
            }
            if let Err(e) = self.session.set_root_c(Some(PathBuf::from(input))) {
                writeln!(self.out, "错误: {}", e)?;
                error!("无法设置目录 C: {}", e);
                return self.pause().await;
            }
        }

        let mut request = SyncRequest::new(direction);

        if direction != SyncDirection::MergeToC {
            let Some(answer) = self
                .prompt("是否强制用旧文件覆盖目标中较新的文件? (y/N): ")
                .await?
            else {
                return Ok(MenuState::Exit);
            };
            request = request.forced(matches!(answer.to_lowercase().as_str(), "y" | "yes"));
        }

        if selective {
            let max_index = self.session.analysis().map_or(0, |a| a.max_index());
            let Some(input) = self
                .prompt(&format!(
                    "请输入要同步的文件编号（例如: 1, 3-5, 8），最大编号 #{}: ",
                    max_index
                ))
                .await?
            else {
                return Ok(MenuState::Exit);
            };

            let selection = parse_selection(&input, max_index);
            if selection.is_empty() {
                writeln!(self.out, "未选择任何有效文件。同步已取消。")?;
                return self.pause().await;
            }
            writeln!(self.out, "已选择的编号: {:?}", selection)?;
            request = request.with_selection(selection);
        }

        self.synchronize(&request).await?;
        self.pause().await
    }

    async fn synchronize(&mut self, request: &SyncRequest) -> Result<()> {
        let Some(analysis) = self.session.analysis() else {
            writeln!(self.out, "错误: 请先执行分析。")?;
            return Ok(());
        };

        let result = self
            .engine
            .run_sync(analysis, self.session.roots(), request)
            .await;

        match result {
            Ok(report) => {
                self.print_report(&report)?;
                // 文件已变化，旧编号不再有效
                self.session.invalidate();
            }
            Err(e) => {
                writeln!(self.out, "错误: {}", e)?;
                error!("同步已中止: {}", e);
                if matches!(e, SyncError::MergeTargetConflict(_)) {
                    self.session.set_root_c(None)?;
                }
            }
        }
        Ok(())
    }

    fn print_report(&mut self, report: &SyncReport) -> Result<()> {
        writeln!(self.out, "\n--- 同步报告 ---")?;
        if let Some(direction) = report.direction {
            writeln!(self.out, "方向: {}", direction)?;
        }
        writeln!(self.out, "成功复制: {}", report.files_copied)?;
        writeln!(self.out, "错误: {}", report.files_failed)?;
        if report.files_skipped > 0 {
            writeln!(self.out, "已跳过: {}", report.files_skipped)?;
        }
        if !report.warnings.is_empty() {
            writeln!(self.out, "警告: {}", report.warnings.len())?;
        }
        writeln!(self.out, "耗时: {} ms", report.duration_ms)?;
        writeln!(self.out, "----------------")?;
        Ok(())
    }

    async fn paths_menu(&mut self) -> Result<MenuState> {
        let roots = self.session.roots().clone();
        writeln!(self.out, "\n===== 修改目录 / 日志文件 =====")?;
        writeln!(self.out, "1. 修改目录 A (当前: {})", roots.a.display())?;
        writeln!(self.out, "2. 修改目录 B (当前: {})", roots.b.display())?;
        writeln!(
            self.out,
            "3. 修改目录 C (当前: {})",
            roots
                .c
                .as_deref()
                .map(|c| c.display().to_string())
                .unwrap_or_else(|| "未设置".to_string())
        )?;
        writeln!(
            self.out,
            "4. 修改日志文件路径 (当前: {})",
            self.session.log_path().display()
        )?;
        writeln!(self.out, "5. 返回")?;
        writeln!(self.out, "===============================")?;

        let Some(choice) = self.prompt("请选择操作: ").await? else {
            return Ok(MenuState::Exit);
        };

        let option = choice.parse::<u32>().unwrap_or(0);
        let label = match option {
            1 => "目录 A 的新路径: ",
            2 => "目录 B 的新路径: ",
            3 => "目录 C 的新路径（留空则清除）: ",
            4 => "日志文件的新路径: ",
            5 => return Ok(MenuState::Main),
            _ => {
                writeln!(self.out, "无效的选择。")?;
                return Ok(MenuState::Paths);
            }
        };

        let Some(input) = self.prompt(label).await? else {
            return Ok(MenuState::Exit);
        };

        match option {
            3 => {
                let target = (!input.is_empty()).then(|| PathBuf::from(&input));
                let cleared = target.is_none();
                match self.session.set_root_c(target) {
                    Ok(()) if cleared => writeln!(self.out, "目录 C 已清除。")?,
                    Ok(()) => writeln!(self.out, "目录 C 已修改。")?,
                    Err(e) => writeln!(self.out, "错误: {}", e)?,
                }
            }
            _ if input.is_empty() => writeln!(self.out, "路径未修改。")?,
            1 | 2 => {
                let result = if option == 1 {
                    self.session.set_root_a(PathBuf::from(&input))
                } else {
                    self.session.set_root_b(PathBuf::from(&input))
                };
                match result {
                    Ok(()) => writeln!(self.out, "目录已修改。")?,
                    Err(e) => writeln!(self.out, "错误: {}", e)?,
                }
            }
            _ => self.change_log_path(PathBuf::from(&input))?,
        }

        Ok(MenuState::Paths)
    }

    /// 切换日志文件，失败时回退到默认路径
    fn change_log_path(&mut self, path: PathBuf) -> Result<()> {
        let Some(writer) = &self.log_writer else {
            self.session.set_log_path(path);
            writeln!(self.out, "文件日志已禁用，仅记录新路径。")?;
            return Ok(());
        };

        match writer.reopen(&path) {
            Ok(()) => {
                info!("日志文件已切换为: {}", path.display());
                self.session.set_log_path(path);
                writeln!(self.out, "日志文件路径已修改。")?;
            }
            Err(e) => {
                writeln!(self.out, "设置新日志文件出错: {}", e)?;
                let default = PathBuf::from(DEFAULT_LOG_FILE);
                if let Err(e) = writer.reopen(&default) {
                    error!("无法打开默认日志文件: {}", e);
                }
                self.session.set_log_path(default);
                writeln!(self.out, "日志文件路径未修改，使用默认路径。")?;
            }
        }
        Ok(())
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
