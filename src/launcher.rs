//! 启动流程：选择模式 -> 激活环境 -> 启动应用 -> 等待退出

use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::app::{ChildRunner, LaunchCommand};
use crate::console::Console;
use crate::error::Result;
use crate::provision::EnvironmentProvisioner;
use crate::selection::{LaunchSelection, RunMode};

#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub env_name: String,
    pub python: String,
    pub script: String,
    pub working_dir: PathBuf,
    /// 跳过菜单直接使用的模式
    pub preset_mode: Option<RunMode>,
    pub pause: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    ActivationFailed,
    SpawnFailed,
    /// 子进程退出码，仅记录，不作为启动器自身的退出码
    Exited(Option<i32>),
}

pub struct Launcher<'a> {
    provisioner: &'a dyn EnvironmentProvisioner,
    runner: &'a dyn ChildRunner,
    settings: LaunchSettings,
}

impl<'a> Launcher<'a> {
    pub fn new(
        provisioner: &'a dyn EnvironmentProvisioner,
        runner: &'a dyn ChildRunner,
        settings: LaunchSettings,
    ) -> Self {
        Launcher { provisioner, runner, settings }
    }

    pub fn run<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> Result<LaunchOutcome> {
        let selection = match self.settings.preset_mode {
            Some(mode) => LaunchSelection::new(mode),
            None => console.prompt_selection()?,
        };
        log::info!("启动模式: {:?}，参数: {:?}", selection.mode, selection.flag);

        let outcome = self.launch(console, &selection)?;
        log::info!("启动流程结束: {:?}", outcome);

        if outcome != LaunchOutcome::ActivationFailed {
            console.print("")?;
            console.print("illuTag 已关闭。")?;
        }
        if self.settings.pause {
            console.pause()?;
        }
        Ok(outcome)
    }

    fn launch<R: BufRead, W: Write>(
        &self,
        console: &mut Console<R, W>,
        selection: &LaunchSelection,
    ) -> Result<LaunchOutcome> {
        let name = &self.settings.env_name;
        console.print(&format!("正在激活环境 {} ...", name))?;

        let command = match self.provisioner.activate(name).and_then(|activation| {
            log::info!("环境已激活: {} ({:?})", activation.env_name, activation.prefix);
            LaunchCommand::build(
                &self.settings.python,
                &self.settings.script,
                &self.settings.working_dir,
                selection,
                &activation,
            )
        }) {
            Ok(command) => command,
            Err(e) => {
                log::error!("环境激活失败: {}", e);
                console.print_activation_failure(name, self.provisioner.manager())?;
                return Ok(LaunchOutcome::ActivationFailed);
            }
        };

        console.print(&format!("正在以{}启动 illuTag: {}", selection.mode.label(), command.display()))?;
        log::info!("启动命令: {} (工作目录 {:?})", command.display(), command.working_dir);

        match self.runner.run(&command) {
            Ok(code) => {
                log::info!("illuTag 退出码: {:?}", code);
                Ok(LaunchOutcome::Exited(code))
            }
            Err(e) => {
                log::error!("illuTag 启动失败: {}", e);
                console.print(&format!("[错误] {}", e))?;
                Ok(LaunchOutcome::SpawnFailed)
            }
        }
    }
}
