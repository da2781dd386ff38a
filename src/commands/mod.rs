//! 子命令实现

pub mod files;
pub mod setup;
pub mod sync;

use crate::cli::Commands;
use crate::config::AppConfig;
use crate::core::{SyncOptions, SyncTarget};
use crate::storage::{create_store, RemoteStore};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// 根据配置创建远程存储
fn open_store(config: &AppConfig) -> Result<Arc<dyn RemoteStore>> {
    Ok(create_store(&config.remote)?)
}

/// 执行子命令
pub async fn execute(command: Commands, config: AppConfig, config_path: &Path) -> Result<()> {
    match command {
        Commands::Setup => setup::run(config, config_path),
        Commands::Sync {
            source,
            destination,
            dry_run,
            delete,
            json,
        } => {
            // 方向无效时在读取远程配置之前报错
            SyncTarget::resolve(&source, &destination)?;
            let store = open_store(&config)?;
            let options = SyncOptions { dry_run, delete };
            let report = sync::run(store, &source, &destination, options).await?;
            sync::print_report(&report, json)
        }
        Commands::Ls { path, long } => {
            let store = open_store(&config)?;
            files::ls(store.as_ref(), &path, long).await
        }
        Commands::Mkdir { path } => {
            let store = open_store(&config)?;
            files::mkdir(store.as_ref(), &path).await
        }
        Commands::Rm { path } => {
            let store = open_store(&config)?;
            files::rm(store.as_ref(), &path).await
        }
        Commands::Get { remote, local } => {
            let store = open_store(&config)?;
            files::get(store.as_ref(), &remote, local.as_deref()).await
        }
        Commands::Put {
            local,
            remote_dir,
            name,
        } => {
            let store = open_store(&config)?;
            files::put(store.as_ref(), &local, &remote_dir, name.as_deref()).await
        }
    }
}
