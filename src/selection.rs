//! 运行模式选择：把菜单输入映射为启动参数

use clap::ValueEnum;

pub const SEARCH_ONLY_FLAG: &str = "--search-only";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// 完整模式，加载 AI 模型
    Full,
    /// 搜索专用模式，不加载模型
    SearchOnly,
}

impl RunMode {
    pub fn label(self) -> &'static str {
        match self {
            RunMode::Full => "完整模式",
            RunMode::SearchOnly => "搜索专用模式",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchSelection {
    pub mode: RunMode,
    pub flag: Option<&'static str>,
}

impl LaunchSelection {
    pub fn new(mode: RunMode) -> Self {
        let flag = match mode {
            RunMode::Full => None,
            RunMode::SearchOnly => Some(SEARCH_ONLY_FLAG),
        };
        LaunchSelection { mode, flag }
    }

    /// 解析菜单输入。"1" 为完整模式，"2" 为搜索专用模式，其余输入一律回落到完整模式。
    pub fn from_input(input: &str) -> Self {
        match input.trim() {
            "2" => Self::new(RunMode::SearchOnly),
            _ => Self::new(RunMode::Full),
        }
    }

    /// 追加到脚本路径之后的命令行参数
    pub fn args(&self) -> Vec<String> {
        self.flag.iter().map(|f| f.to_string()).collect()
    }
}
