use std::io;

use crate::shell::executor::Jobs;

/// AI 自然语言请求的结果
#[derive(Debug, PartialEq)]
pub enum AiOutcome {
    /// AI 功能不可用
    Disabled,
    /// 模型回复不是命令，原样展示
    Reply(String),
    /// 提取到命令但没通过安全校验
    Unsafe { command: String, reason: String },
    /// 提取到可执行的候选命令
    Command(String),
}

/// 各子系统回访 shell 的窄接口。
/// builtins / executor / ai 只拿到各自需要的操作，不持有整个 Shell
pub trait Context {
    fn lookup_env(&self, name: &str) -> Option<String>;
    fn set_env(&mut self, name: &str, value: &str) -> Result<(), String>;
    fn unset_env(&mut self, name: &str);

    fn cwd(&self) -> String;
    /// 切换工作目录并维护 OLDPWD / PWD
    fn set_cwd(&mut self, path: &str) -> io::Result<()>;

    fn history(&self) -> &[String];

    fn request_exit(&mut self, code: i32);

    /// 把一行输入当作新命令递归执行，返回退出码
    fn execute_line(&mut self, line: &str) -> i32;

    fn jobs(&mut self) -> &mut Jobs;

    fn ai_enabled(&self) -> bool;
    fn ai_model(&self) -> String;
    fn ai_explain(&mut self, command: &str) -> String;
    fn ai_suggest(&mut self, task: &str) -> Vec<String>;
    fn ai_natural(&mut self, input: &str) -> AiOutcome;
}
