//! illuTag 应用进程管理，负责组装命令行并启动 app.py

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{LaunchError, Result};
use crate::provision::Activation;
use crate::selection::LaunchSelection;

/// 完整解析后的子进程调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    /// 脚本路径在前，模式参数在后
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, OsString)>,
}

impl LaunchCommand {
    pub fn build(
        python: &str,
        script: &str,
        working_dir: &Path,
        selection: &LaunchSelection,
        activation: &Activation,
    ) -> Result<Self> {
        let mut args = vec![script.to_string()];
        args.extend(selection.args());

        let mut env = activation.vars.clone();
        if let Some(path) = activation.path_value(env::var_os("PATH"))? {
            env.push(("PATH".to_string(), path));
        }

        Ok(LaunchCommand {
            program: activation.resolve_program(python),
            args,
            working_dir: working_dir.to_path_buf(),
            env,
        })
    }

    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// 子进程启动方式。`run` 阻塞到子进程退出并返回退出码。
pub trait ChildRunner {
    fn run(&self, command: &LaunchCommand) -> Result<Option<i32>>;
}

/// 直接继承控制台的标准输入输出，用户可与应用交互
pub struct ProcessRunner;

impl ChildRunner for ProcessRunner {
    fn run(&self, command: &LaunchCommand) -> Result<Option<i32>> {
        let script = command
            .args
            .first()
            .map(|s| command.working_dir.join(s))
            .ok_or_else(|| LaunchError::Config("未指定应用脚本".to_string()))?;
        if !script.is_file() {
            log::error!("未找到应用脚本: {:?}", script);
            return Err(LaunchError::ScriptNotFound(script));
        }
        log::info!("找到应用脚本: {:?}", script);

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: command.program.display().to_string(),
                source,
            })?;
        log::info!("应用进程启动成功，PID: {}", child.id());

        let status = child.wait()?;
        log::info!("应用进程已退出: {}", status);
        Ok(status.code())
    }
}
