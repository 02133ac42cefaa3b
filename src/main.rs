//! 程序入口：选择运行模式，激活环境后启动 illuTag

mod app;
mod cli;
mod config;
mod console;
mod error;
mod launcher;
mod logger;
mod provision;
mod selection;

use std::env;
use std::path::PathBuf;
use anyhow::{Result, Context};
use clap::Parser;

use crate::app::ProcessRunner;
use crate::cli::CliArgs;
use crate::config::{ConfigSource, LauncherConfig};
use crate::console::Console;
use crate::launcher::{LaunchSettings, Launcher};
use crate::logger::init_logging;
use crate::provision::{
    CondaProvisioner, EnvironmentProvisioner, NoopProvisioner, ProvisionerKind, VenvProvisioner,
};

fn main() -> Result<()> {
    let utf8 = console::enable_utf8();
    let args = CliArgs::parse();
    let exe_dir = exe_dir()?;

    let (mut config, source) =
        LauncherConfig::load(args.config.as_deref(), &exe_dir).context("无法加载配置")?;
    args.apply(&mut config);
    config.validate().context("配置无效")?;

    // 日志依赖配置中的目录与级别，之前的结果在这里补记
    init_logging(&config.logs_dir(&exe_dir), &config.logging).context("无法初始化日志")?;
    log::info!("illuTag 启动器启动，可执行文件目录: {:?}", exe_dir);
    if let Err(e) = utf8 {
        log::warn!("{:#}", e);
    }
    match &source {
        ConfigSource::Defaults(path) => log::info!("未找到配置文件 {:?}，使用默认配置", path),
        ConfigSource::File(path) => log::info!("读取配置文件: {:?}", path),
    }
    log::info!("当前配置: {:?}", config);

    let working_dir = config.working_dir(&exe_dir);
    let provisioner: Box<dyn EnvironmentProvisioner> = match config.provisioner {
        ProvisionerKind::Conda => Box::new(CondaProvisioner::new(&config.conda)),
        ProvisionerKind::Venv => Box::new(VenvProvisioner::new(&working_dir)),
        ProvisionerKind::None => Box::new(NoopProvisioner),
    };

    let settings = LaunchSettings {
        env_name: config.env_name.clone(),
        python: config.python.clone(),
        script: config.script.clone(),
        working_dir,
        preset_mode: args.mode,
        pause: config.pause,
    };

    let launcher = Launcher::new(provisioner.as_ref(), &ProcessRunner, settings);
    let outcome = launcher.run(&mut Console::stdio()).context("启动流程异常中断")?;
    log::info!("启动器退出: {:?}", outcome);

    Ok(())
}

/// 可执行文件所在目录，配置、日志与应用脚本均以此为基准
fn exe_dir() -> Result<PathBuf> {
    let exe_path = env::current_exe().context("无法获取可执行文件路径")?;
    let dir = exe_path.parent().context("无法获取可执行文件目录")?;
    Ok(dir.to_path_buf())
}
