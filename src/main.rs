use dirsync_lib::cli::Cli;
use dirsync_lib::logging::{LogConfig, SizeRotatingWriter};
use dirsync_lib::{default_config_dir, AppConfig, Session, Shell, SyncEngine, SyncRoots};
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 初始化日志系统
///
/// 文件日志启用时返回写入器，供运行时切换日志路径。
fn init_logging(log_path: &Path, config: &LogConfig) -> io::Result<Option<SizeRotatingWriter>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.tracing_level().into())
        .from_env_lossy();

    if !config.enabled {
        // 日志已禁用，只初始化一个空的 subscriber
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return Ok(None);
    }

    let file_writer = SizeRotatingWriter::new(log_path, config.max_size_bytes())?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer.clone())
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    // 在 debug 模式下也输出到控制台
    #[cfg(debug_assertions)]
    {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer);

        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    // 在 release 模式下只输出到文件
    #[cfg(not(debug_assertions))]
    {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer);

        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    Ok(Some(file_writer))
}

#[tokio::main]
async fn main() -> ExitCode {
    let (cli, ignored_args) = Cli::parse_lenient(std::env::args());

    let config_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    let config = AppConfig::load(&config_dir);

    let log_writer = match init_logging(&cli.log, &config.log) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!(
                "严重错误: 无法创建日志文件! {}: {}",
                cli.log.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    info!("程序启动");
    for arg in &ignored_args {
        warn!("忽略无法识别的参数: {}", arg);
    }

    let roots = SyncRoots::new(
        cli.dir_a.unwrap_or_default(),
        cli.dir_b.unwrap_or_default(),
    );
    let mut session = Session::new(roots, &cli.log);
    if let Some(c) = cli.dir_c {
        if let Err(e) = session.set_root_c(Some(c)) {
            eprintln!("错误: {}", e);
            warn!("忽略命令行中的目录 C: {}", e);
        }
    }

    let engine = Arc::new(SyncEngine::with_config(config.sync.to_sync_config()));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut shell = Shell::new(session, engine, log_writer, stdin, io::stdout());

    if let Err(e) = shell.run().await {
        eprintln!("错误: {:#}", e);
        tracing::error!("程序异常退出: {:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
