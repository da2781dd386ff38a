use clap::Parser;
use mirrorsync_lib::cli::Cli;
use mirrorsync_lib::commands;
use mirrorsync_lib::config::AppConfig;
use mirrorsync_lib::logging::{log_dir, LogConfig, SizeRotatingWriter};
use std::path::Path;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 初始化日志系统：控制台（stderr）+ 可选的文件日志
fn init_logging(config: &LogConfig, verbose: bool, debug: bool, log_dir: &Path) {
    let level = config.tracing_level(verbose, debug);
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        .add_directive("hyper=warn".parse().unwrap_or_else(|_| level.into()))
        .add_directive("reqwest=warn".parse().unwrap_or_else(|_| level.into()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = if config.enabled {
        match SizeRotatingWriter::new(log_dir, config.max_size_mb) {
            Ok(writer) => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false),
            ),
            Err(e) => {
                eprintln!("无法创建日志文件 {}: {}", log_dir.display(), e);
                None
            }
        }
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);

    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("错误: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log, cli.verbose, cli.debug, &log_dir(&config_path));
    tracing::debug!("使用配置文件: {}", config_path.display());

    if let Err(e) = commands::execute(cli.command, config, &config_path).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
