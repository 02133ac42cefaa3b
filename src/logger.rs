//! 日志配置与清理，按天存储日志并清理过期日志

use log4rs::{
    append::file::FileAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use chrono::{Local, NaiveDate, TimeDelta};
use fs_extra::dir::{ls, DirEntryAttr, DirEntryValue};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use log::LevelFilter;
use anyhow::{Result, Context};

use crate::config::LoggingConfig;

pub fn init_logging(logs_dir: &Path, config: &LoggingConfig) -> Result<log4rs::Handle> {
    fs::create_dir_all(logs_dir).context("无法创建日志目录")?;

    let level = LevelFilter::from_str(config.level.trim())
        .with_context(|| format!("无效的日志级别: {}", config.level))?;

    // 按天生成日志文件
    let today = Local::now().format("%Y-%m-%d").to_string();
    let log_file = logs_dir.join(format!("{}.log", today));
    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} [{l}] {m}{n}")))
        .build(log_file)
        .context("无法创建日志文件")?;

    let log_config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(Root::builder().appender("logfile").build(level))
        .context("无法构建日志配置")?;

    let handle = log4rs::init_config(log_config).context("无法初始化日志")?;

    let cutoff = retention_cutoff(Local::now().date_naive(), config.retention_days)?;
    clean_old_logs(logs_dir, cutoff)?;

    Ok(handle)
}

/// 保留期的起始日期，早于该日期的日志将被清理
fn retention_cutoff(today: NaiveDate, retention_days: i64) -> Result<NaiveDate> {
    TimeDelta::try_days(retention_days)
        .and_then(|days| today.checked_sub_signed(days))
        .with_context(|| format!("日志保留天数超出范围: {}", retention_days))
}

/// 删除日期早于 `cutoff` 的日志文件 (文件名格式：YYYY-MM-DD.log)
fn clean_old_logs(logs_dir: &Path, cutoff: NaiveDate) -> Result<Vec<PathBuf>> {
    let mut entries = HashSet::new();
    entries.insert(DirEntryAttr::Path);
    let log_files = ls(logs_dir, &entries)
        .context("无法列出日志文件")?
        .items
        .into_iter()
        .filter_map(|item| match item.get(&DirEntryAttr::Path) {
            Some(DirEntryValue::String(s)) => Some(PathBuf::from(s)),
            _ => None,
        })
        .filter(|path| path.is_file());

    let mut removed = Vec::new();
    for path in log_files {
        let Some(date_str) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".log"))
        else {
            continue;
        };
        if let Ok(file_date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
            if file_date < cutoff {
                fs::remove_file(&path).context(format!("无法删除旧日志: {:?}", path))?;
                log::info!("已删除旧日志: {:?}", path);
                removed.push(path);
            }
        }
    }

    Ok(removed)
}
