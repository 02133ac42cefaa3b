//! 启动器配置，读取可执行文件旁的 illutag_launcher.toml

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{LaunchError, Result};
use crate::provision::ProvisionerKind;

pub const DEFAULT_CONFIG_FILE: &str = "illutag_launcher.toml";
pub const CONFIG_ENV_KEY: &str = "ILLUTAG_LAUNCHER_CONFIG";
pub const MAX_RETENTION_DAYS: i64 = 3650;

/// 配置的实际来源，日志初始化后再记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// 默认位置没有配置文件，使用内置默认值
    Defaults(PathBuf),
    File(PathBuf),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    pub env_name: String,
    pub provisioner: ProvisionerKind,
    pub conda: String,
    pub python: String,
    pub script: String,
    /// 相对路径以可执行文件目录为基准
    pub working_dir: PathBuf,
    pub pause: bool,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub level: String,
    pub retention_days: i64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        LauncherConfig {
            env_name: "illuTag_env".to_string(),
            provisioner: ProvisionerKind::Conda,
            conda: "conda".to_string(),
            python: "python".to_string(),
            script: "app.py".to_string(),
            working_dir: PathBuf::from("."),
            pause: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            dir: PathBuf::from("logs"),
            level: "info".to_string(),
            retention_days: 30,
        }
    }
}

impl LauncherConfig {
    /// 按 命令行 > 环境变量 > 默认位置 的顺序查找配置文件。
    /// 默认位置的文件不存在时使用内置默认值，显式指定的文件必须存在。
    pub fn load(explicit: Option<&Path>, exe_dir: &Path) -> Result<(Self, ConfigSource)> {
        let (path, required) = resolve_path(explicit, env::var(CONFIG_ENV_KEY).ok(), exe_dir);
        if !path.exists() {
            if required {
                return Err(LaunchError::Config(format!("配置文件不存在: {:?}", path)));
            }
            return Ok((LauncherConfig::default(), ConfigSource::Defaults(path)));
        }

        let config = Self::from_toml(&fs::read_to_string(&path)?)?;
        config.validate()?;
        Ok((config, ConfigSource::File(path)))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.env_name.trim().is_empty() && self.provisioner != ProvisionerKind::None {
            return Err(LaunchError::Config("env_name 不能为空".to_string()));
        }
        if self.script.trim().is_empty() {
            return Err(LaunchError::Config("script 不能为空".to_string()));
        }
        if self.python.trim().is_empty() {
            return Err(LaunchError::Config("python 不能为空".to_string()));
        }
        if !(1..=MAX_RETENTION_DAYS).contains(&self.logging.retention_days) {
            return Err(LaunchError::Config(format!(
                "logging.retention_days 必须在 1 到 {} 之间",
                MAX_RETENTION_DAYS
            )));
        }
        Ok(())
    }

    pub fn working_dir(&self, exe_dir: &Path) -> PathBuf {
        exe_dir.join(&self.working_dir)
    }

    pub fn logs_dir(&self, exe_dir: &Path) -> PathBuf {
        exe_dir.join(&self.logging.dir)
    }
}

fn resolve_path(explicit: Option<&Path>, from_env: Option<String>, exe_dir: &Path) -> (PathBuf, bool) {
    if let Some(path) = explicit {
        return (path.to_path_buf(), true);
    }
    match from_env {
        Some(value) if !value.trim().is_empty() => (PathBuf::from(value), true),
        _ => (exe_dir.join(DEFAULT_CONFIG_FILE), false),
    }
}
