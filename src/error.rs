//! 启动流程中的错误类型

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    /// 环境激活失败，此时绝不能启动子进程
    #[error("无法激活环境 {name}: {reason}")]
    ActivationFailed { name: String, reason: String },

    #[error("未找到应用脚本: {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("无法启动子进程 {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置文件解析失败: {0}")]
    Toml(#[from] toml::de::Error),
}

impl LaunchError {
    pub fn activation(name: &str, reason: impl Into<String>) -> Self {
        LaunchError::ActivationFailed {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;
