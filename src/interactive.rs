//! Terminal prompts for the interactive generator.
//!
//! Readers and writers are generic so the prompts can be driven by scripted
//! input in tests. End of input while a prompt is waiting is reported as
//! [`io::ErrorKind::UnexpectedEof`].

use crate::prompt::{numbered_list, SUPPORTED_AUTHORS};
use crate::sink::TextStats;
use std::io::{self, BufRead, Write};

pub const GREETING: &str = "欢迎使用名家风格小说生成器！";
pub const FAREWELL: &str = "\n感谢使用！";
pub const MENU_HEADER: &str = "\n请选择一位作家的风格来生成小说：";
pub const CHOICE_PROMPT: &str = "请输入选项数字：";
pub const INVALID_CHOICE: &str = "无效的选项，请输入列表中的数字。";
pub const NOT_A_NUMBER: &str = "请输入一个有效的数字。";
pub const THEME_HEADER: &str = "\n请输入您希望生成的小说的主题或梗概：";
pub const THEME_PROMPT: &str = "> ";
pub const EMPTY_THEME: &str = "主题不能为空，请重新输入：";
pub const STORY_HEADER: &str = "\n--- 生成的小说片段 ---";
pub const STORY_FOOTER: &str = "\n--- 小说片段结束 ---";
pub const SHORT_OUTPUT_NOTICE: &str =
    "注意：生成的内容可能未达到期望的1000字以上，您可以尝试调整主题或重新运行。";
pub const FAILURE_HINT: &str = "请检查您的网络连接以及API密钥和URL是否正确配置。";

/// Show the author menu and read choices until a valid one is entered.
///
/// Returns the chosen author's display name.
pub fn choose_author<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<&'static str> {
    writeln!(out, "{}", MENU_HEADER)?;
    writeln!(out, "{}", numbered_list(&SUPPORTED_AUTHORS))?;

    loop {
        let line = prompt_line(input, out, CHOICE_PROMPT)?;
        match line.trim().parse::<usize>() {
            Ok(choice) => match author_by_number(choice) {
                Some(author) => return Ok(author),
                None => writeln!(out, "{}", INVALID_CHOICE)?,
            },
            Err(_) => writeln!(out, "{}", NOT_A_NUMBER)?,
        }
    }
}

/// Read a non-blank story theme, re-prompting on blank lines.
pub fn read_theme<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<String> {
    writeln!(out, "{}", THEME_HEADER)?;
    let mut theme = prompt_line(input, out, THEME_PROMPT)?;
    while theme.trim().is_empty() {
        writeln!(out, "{}", EMPTY_THEME)?;
        theme = prompt_line(input, out, THEME_PROMPT)?;
    }
    Ok(theme)
}

/// Look up an author by its 1-based menu number.
pub fn author_by_number(choice: usize) -> Option<&'static str> {
    choice
        .checked_sub(1)
        .and_then(|i| SUPPORTED_AUTHORS.get(i))
        .copied()
}

/// Line announcing which author and theme are being generated.
pub fn progress_message(author: &str, theme: &str) -> String {
    format!(
        "\n正在以 {} 的风格，围绕主题 “{}” 生成小说，请稍候...\n这可能需要几分钟的时间，具体取决于模型的响应速度和生成内容的长度。",
        author, theme
    )
}

/// End-of-stream statistics, plus the short-output notice when applicable.
pub fn summary(stats: &TextStats) -> String {
    let mut text = format!(
        "\n生成内容统计：约 {} 个词，{} 个字符。",
        stats.words, stats.chars
    );
    if stats.is_short() {
        text.push('\n');
        text.push_str(SHORT_OUTPUT_NOTICE);
    }
    text
}

/// Message shown when generation fails.
pub fn failure_message(error: &dyn std::fmt::Display) -> String {
    format!("\n调用AI模型生成小说时发生错误：{}\n{}", error, FAILURE_HINT)
}

fn prompt_line<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> io::Result<String> {
    write!(out, "{}", prompt)?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
