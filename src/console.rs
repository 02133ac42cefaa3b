//! 控制台交互：UTF-8 代码页、菜单、读取输入与按键暂停

use std::io::{self, BufRead, Write};

use crate::selection::LaunchSelection;

#[cfg(windows)]
const UTF8_CODE_PAGE: u32 = 65001;

/// 将控制台输入输出代码页设置为 UTF-8。失败不致命，由调用方在日志就绪后记录。
#[cfg(windows)]
pub fn enable_utf8() -> anyhow::Result<()> {
    use anyhow::Context;
    use windows::Win32::System::Console::{SetConsoleCP, SetConsoleOutputCP};

    unsafe {
        SetConsoleOutputCP(UTF8_CODE_PAGE)
            .with_context(|| format!("无法设置控制台输出代码页为 {}", UTF8_CODE_PAGE))?;
        SetConsoleCP(UTF8_CODE_PAGE)
            .with_context(|| format!("无法设置控制台输入代码页为 {}", UTF8_CODE_PAGE))?;
    }
    Ok(())
}

#[cfg(not(windows))]
pub fn enable_utf8() -> anyhow::Result<()> {
    Ok(())
}

pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Console::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Console { input, output }
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn show_menu(&mut self) -> io::Result<()> {
        writeln!(self.output, "========================================")?;
        writeln!(self.output, "            illuTag 启动器")?;
        writeln!(self.output, "========================================")?;
        writeln!(self.output)?;
        writeln!(self.output, "  1. 完整模式 (加载 AI 模型，支持扫描与搜索)")?;
        writeln!(self.output, "  2. 搜索专用模式 (不加载 AI 模型，仅支持搜索)")?;
        writeln!(self.output)?;
        write!(self.output, "请选择启动模式 (1/2，默认 1): ")?;
        self.output.flush()
    }

    /// 读取一行输入，输入流结束时返回空串。
    /// 非 UTF-8 字节 (如代码页未切换时的 GBK 输入) 按替换字符解码，不报错。
    pub fn read_line(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        self.input.read_until(b'\n', &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn prompt_selection(&mut self) -> io::Result<LaunchSelection> {
        self.show_menu()?;
        let line = self.read_line()?;
        let selection = LaunchSelection::from_input(&line);
        writeln!(self.output, "已选择: {}", selection.mode.label())?;
        Ok(selection)
    }

    pub fn print(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{}", message)
    }

    pub fn print_activation_failure(&mut self, env_name: &str, manager: &str) -> io::Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "[错误] 无法激活环境 \"{}\"。", env_name)?;
        writeln!(self.output, "请检查：")?;
        writeln!(self.output, "  1. 是否已安装 {} 并可在命令行中使用；", manager)?;
        writeln!(self.output, "  2. 环境 \"{}\" 是否已创建；", env_name)?;
        writeln!(
            self.output,
            "  3. 是否在支持 {} 的终端 (如 Anaconda Prompt) 中运行本程序。",
            manager
        )?;
        Ok(())
    }

    /// 等待用户确认。输入流结束也视为确认。
    pub fn pause(&mut self) -> io::Result<()> {
        write!(self.output, "按回车键退出...")?;
        self.output.flush()?;
        self.read_line()?;
        Ok(())
    }
}
