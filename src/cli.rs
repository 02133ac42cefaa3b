//! 命令行参数，均为对配置文件的覆盖

use std::path::PathBuf;

use clap::Parser;

use crate::config::LauncherConfig;
use crate::provision::ProvisionerKind;
use crate::selection::RunMode;

#[derive(Debug, Clone, Parser)]
#[command(name = "illutag-launcher", version, about = "illuTag 启动器", long_about = None)]
pub struct CliArgs {
    /// 配置文件路径 (TOML)，默认读取可执行文件旁的 illutag_launcher.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// 直接以指定模式启动，不显示菜单
    #[arg(long, value_enum)]
    pub mode: Option<RunMode>,

    /// 要激活的环境名称
    #[arg(long = "env", value_name = "NAME")]
    pub env_name: Option<String>,

    #[arg(long, value_enum)]
    pub provisioner: Option<ProvisionerKind>,

    /// 结束时不等待按键
    #[arg(long)]
    pub no_pause: bool,
}

impl CliArgs {
    pub fn apply(&self, config: &mut LauncherConfig) {
        if let Some(name) = &self.env_name {
            config.env_name = name.clone();
        }
        if let Some(kind) = self.provisioner {
            config.provisioner = kind;
        }
        if self.no_pause {
            config.pause = false;
        }
    }
}
