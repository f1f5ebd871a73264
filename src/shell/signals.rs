use std::sync::Mutex;

use lazy_static::lazy_static;
use log::debug;
use nix::sys::signal::{signal, SigHandler, Signal};

lazy_static! {
    // 信号处理函数要用的提示符字节，handler 里只 try_lock
    static ref PROMPT: Mutex<Vec<u8>> = Mutex::new(Vec::new());
}

/// 更新 Ctrl-C 后重绘的提示符
pub fn set_prompt(prompt: &str) {
    if let Ok(mut stored) = PROMPT.lock() {
        *stored = prompt.as_bytes().to_vec();
    }
}

// 信号处理函数里只允许 async-signal-safe 的调用，所以直接 write(2)
extern "C" fn handle_sigint(_signal: libc::c_int) {
    let _ = unsafe { libc::write(libc::STDOUT_FILENO, b"\n".as_ptr().cast(), 1) };
    if let Ok(stored) = PROMPT.try_lock() {
        if !stored.is_empty() {
            let _ = unsafe {
                libc::write(libc::STDOUT_FILENO, stored.as_ptr().cast(), stored.len())
            };
        }
    }
}

extern "C" fn handle_sigtstp(_signal: libc::c_int) {
    let msg = b"\nnexsh: suspending the shell is not supported\n";
    let _ = unsafe { libc::write(libc::STDOUT_FILENO, msg.as_ptr().cast(), msg.len()) };
}

/// Ctrl-C 重绘提示符而不是杀掉 shell，Ctrl-Z 只提示不挂起。
/// 子进程 exec 时处理函数自动还原为默认，前台作业仍能被打断
pub fn install() {
    unsafe {
        if let Err(e) = signal(Signal::SIGINT, SigHandler::Handler(handle_sigint)) {
            debug!("注册 SIGINT 处理失败: {}", e);
        }
        if let Err(e) = signal(Signal::SIGTSTP, SigHandler::Handler(handle_sigtstp)) {
            debug!("注册 SIGTSTP 处理失败: {}", e);
        }
    }
}

/// 退出交互模式前还原默认行为
pub fn uninstall() {
    unsafe {
        let _ = signal(Signal::SIGINT, SigHandler::SigDfl);
        let _ = signal(Signal::SIGTSTP, SigHandler::SigDfl);
    }
}
