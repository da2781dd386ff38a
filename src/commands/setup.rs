//! setup 命令 - 交互式配置远程存储

use crate::config::{AppConfig, BackendType, RemoteConfig};
use anyhow::Result;
use dialoguer::{Confirm, Input, Password, Select};
use std::path::Path;

const BACKENDS: &[&str] = &["http", "webdav", "s3"];

fn prompt(label: &str, current: Option<&str>) -> Result<String> {
    let mut input = Input::<String>::new().with_prompt(label);
    if let Some(value) = current.filter(|v| !v.is_empty()) {
        input = input.default(value.to_string());
    }
    Ok(input.interact_text()?.trim().to_string())
}

fn prompt_optional(label: &str, current: Option<&str>) -> Result<Option<String>> {
    let value: String = Input::new()
        .with_prompt(label)
        .default(current.unwrap_or_default().to_string())
        .allow_empty(true)
        .interact_text()?;
    Ok(non_empty(value))
}

fn prompt_secret(label: &str) -> Result<String> {
    Ok(Password::new().with_prompt(label).interact()?)
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn setup_http(remote: &mut RemoteConfig) -> Result<()> {
    let api_url = prompt("API 地址", remote.api_url.as_deref())?;
    remote.content_url = prompt_optional("文件内容地址（留空同 API 地址）", remote.content_url.as_deref())?;
    remote.access_root = prompt("访问根", Some(&remote.access_root))?;
    remote.access_token = non_empty(prompt_secret("访问令牌")?);
    remote.escape_paths = Confirm::new()
        .with_prompt("对路径做百分号编码?")
        .default(remote.escape_paths)
        .interact()?;
    remote.api_url = Some(api_url);
    Ok(())
}

fn setup_webdav(remote: &mut RemoteConfig) -> Result<()> {
    remote.webdav_endpoint = Some(prompt("WebDAV 地址", remote.webdav_endpoint.as_deref())?);
    remote.username = Some(prompt("用户名", remote.username.as_deref())?);
    remote.password = non_empty(prompt_secret("密码")?);
    remote.root = prompt_optional("根目录（可选）", remote.root.as_deref())?;
    Ok(())
}

fn setup_s3(remote: &mut RemoteConfig) -> Result<()> {
    remote.bucket = Some(prompt("Bucket", remote.bucket.as_deref())?);
    remote.region = Some(prompt("Region", remote.region.as_deref())?);
    remote.access_key = Some(prompt("Access Key", remote.access_key.as_deref())?);
    remote.secret_key = non_empty(prompt_secret("Secret Key")?);
    remote.endpoint = prompt_optional("Endpoint（可选，兼容 S3 的服务）", remote.endpoint.as_deref())?;
    remote.prefix = prompt_optional("路径前缀（可选）", remote.prefix.as_deref())?;
    Ok(())
}

pub fn run(mut config: AppConfig, config_path: &Path) -> Result<()> {
    println!();
    let current = match config.remote.backend {
        BackendType::Http => 0,
        BackendType::WebDav => 1,
        BackendType::S3 => 2,
    };
    let choice = Select::new()
        .with_prompt("远程存储类型")
        .items(BACKENDS)
        .default(current)
        .interact()?;

    let remote = &mut config.remote;
    match choice {
        0 => {
            remote.backend = BackendType::Http;
            setup_http(remote)?;
        }
        1 => {
            remote.backend = BackendType::WebDav;
            setup_webdav(remote)?;
        }
        _ => {
            remote.backend = BackendType::S3;
            setup_s3(remote)?;
        }
    }

    config.save(config_path)?;
    tracing::info!("配置已保存: {}", config_path.display());
    println!("配置已保存到 {}", config_path.display());
    Ok(())
}
