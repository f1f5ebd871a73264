use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use log::{debug, error};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, execvp, fork, pipe, ForkResult, Pid};

use crate::shell::builtins;
use crate::shell::context::Context;
use crate::shell::parser::{Command, Pipeline};
use crate::utils::path::find_executable;

/// 执行一条管道，返回退出码。
/// 单命令的内建直接在 shell 进程里跑；其余走 fork + execvp，
/// 多命令用匿名管道串联
pub fn run(ctx: &mut dyn Context, pipeline: &Pipeline) -> i32 {
    if pipeline.is_empty() {
        return 0;
    }
    debug!("执行管道: {}", pipeline);

    if pipeline.commands.len() == 1 {
        run_single(ctx, pipeline)
    } else {
        run_multi(ctx, pipeline)
    }
}

fn run_single(ctx: &mut dyn Context, pipeline: &Pipeline) -> i32 {
    let command = &pipeline.commands[0];
    let is_builtin = builtins::contains(&command.program);

    if is_builtin {
        let plain = command.input_file.is_none()
            && command.output_file.is_none()
            && !pipeline.background;
        // 改状态的内建必须留在 shell 进程里。普通内建带重定向
        // 或后台标志时走下面的辅助子进程，stdio 才接得上文件
        if plain || builtins::mutates_shell_state(&command.program) {
            debug!("执行内建命令: {}", command.program);
            return builtins::invoke(ctx, &command.program, &command.arguments);
        }
    }

    // 重定向文件在父进程打开，失败就不 fork
    let input = match open_input(command) {
        Ok(f) => f,
        Err(code) => return code,
    };
    let output = match open_output(command) {
        Ok(f) => f,
        Err(code) => return code,
    };

    if !is_builtin && !command.program.contains('/') && find_executable(&command.program).is_none()
    {
        eprintln!("{}: command not found", command.program);
        return 127;
    }

    let in_fd = input.as_ref().map(|f| f.as_raw_fd());
    let out_fd = output.as_ref().map(|f| f.as_raw_fd());
    let mut inherited = Vec::new();
    inherited.extend(in_fd);
    inherited.extend(out_fd);

    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            if is_builtin {
                builtin_child(ctx, command, in_fd, out_fd, &inherited)
            } else {
                exec_child(command, in_fd, out_fd, &inherited)
            }
        }
        Ok(ForkResult::Parent { child }) => {
            // 关闭父进程的重定向描述符
            drop(input);
            drop(output);

            if pipeline.background {
                let index = ctx.jobs().register(child.as_raw(), pipeline.to_string());
                println!("[{}] {}", index, child);
                0
            } else {
                wait_for(child)
            }
        }
        Err(e) => {
            eprintln!("nexsh: fork: {}", e);
            1
        }
    }
}

fn run_multi(ctx: &mut dyn Context, pipeline: &Pipeline) -> i32 {
    let n = pipeline.commands.len();

    // 改变 shell 状态的内建不能进多级管道
    for cmd in &pipeline.commands {
        if builtins::contains(&cmd.program) && builtins::mutates_shell_state(&cmd.program) {
            eprintln!(
                "nexsh: {}: builtin cannot be part of a pipeline",
                cmd.program
            );
            return 1;
        }
    }

    // 首尾重定向先打开，失败就整条放弃
    let input = match open_input(&pipeline.commands[0]) {
        Ok(f) => f,
        Err(code) => return code,
    };
    let output = match open_output(&pipeline.commands[n - 1]) {
        Ok(f) => f,
        Err(code) => return code,
    };

    let mut pipes: Vec<(RawFd, RawFd)> = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        match pipe() {
            Ok((r, w)) => pipes.push((r.into_raw_fd(), w.into_raw_fd())),
            Err(e) => {
                eprintln!("nexsh: pipe: {}", e);
                close_all(&pipes);
                return 1;
            }
        }
    }

    let mut inherited: Vec<RawFd> = Vec::new();
    for (r, w) in &pipes {
        inherited.push(*r);
        inherited.push(*w);
    }
    inherited.extend(input.as_ref().map(|f| f.as_raw_fd()));
    inherited.extend(output.as_ref().map(|f| f.as_raw_fd()));

    let mut pids: Vec<Pid> = Vec::with_capacity(n);
    let mut fork_failed = false;

    for (i, cmd) in pipeline.commands.iter().enumerate() {
        let in_fd = if i == 0 {
            input.as_ref().map(|f| f.as_raw_fd())
        } else {
            Some(pipes[i - 1].0)
        };
        let out_fd = if i == n - 1 {
            output.as_ref().map(|f| f.as_raw_fd())
        } else {
            Some(pipes[i].1)
        };

        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                if builtins::contains(&cmd.program) {
                    builtin_child(ctx, cmd, in_fd, out_fd, &inherited);
                } else {
                    exec_child(cmd, in_fd, out_fd, &inherited);
                }
            }
            Ok(ForkResult::Parent { child }) => pids.push(child),
            Err(e) => {
                eprintln!("nexsh: fork: {}", e);
                fork_failed = true;
                break;
            }
        }
    }

    // 父进程必须关掉所有管道端，否则下游读端等不到 EOF
    close_all(&pipes);
    drop(input);
    drop(output);

    if pipeline.background && !fork_failed {
        let text = pipeline.to_string();
        let mut index = 0;
        for pid in &pids {
            index = ctx.jobs().register(pid.as_raw(), text.clone());
        }
        if let Some(pid) = pids.last() {
            println!("[{}] {}", index, pid);
        }
        return 0;
    }

    // 按创建顺序等待，只保留最后一个子进程的退出码
    let mut status = 1;
    for pid in pids {
        status = wait_for(pid);
    }
    if fork_failed {
        return 1;
    }
    status
}

fn close_all(pipes: &[(RawFd, RawFd)]) {
    for (r, w) in pipes {
        let _ = close(*r);
        let _ = close(*w);
    }
}

fn open_input(command: &Command) -> Result<Option<File>, i32> {
    match &command.input_file {
        None => Ok(None),
        Some(path) => match File::open(path) {
            Ok(f) => Ok(Some(f)),
            Err(e) => {
                eprintln!("nexsh: {}: {}", path, e);
                Err(1)
            }
        },
    }
}

fn open_output(command: &Command) -> Result<Option<File>, i32> {
    match &command.output_file {
        None => Ok(None),
        Some(path) => {
            let mut opts = OpenOptions::new();
            opts.write(true).create(true).mode(0o644);
            if command.append_output {
                opts.append(true);
            } else {
                opts.truncate(true);
            }
            match opts.open(path) {
                Ok(f) => Ok(Some(f)),
                Err(e) => {
                    eprintln!("nexsh: {}: {}", path, e);
                    Err(1)
                }
            }
        }
    }
}

// 子进程侧：装好 stdin/stdout，再关掉继承来的所有描述符。
// 重复 close 返回 EBADF，忽略即可
fn install_stdio(in_fd: Option<RawFd>, out_fd: Option<RawFd>, inherited: &[RawFd]) {
    if let Some(fd) = in_fd {
        if dup2(fd, libc::STDIN_FILENO).is_err() {
            eprintln!("nexsh: dup2 stdin failed");
            unsafe { libc::_exit(1) };
        }
    }
    if let Some(fd) = out_fd {
        if dup2(fd, libc::STDOUT_FILENO).is_err() {
            eprintln!("nexsh: dup2 stdout failed");
            unsafe { libc::_exit(1) };
        }
    }
    for fd in inherited {
        let _ = close(*fd);
    }
}

fn exec_child(
    command: &Command,
    in_fd: Option<RawFd>,
    out_fd: Option<RawFd>,
    inherited: &[RawFd],
) -> ! {
    install_stdio(in_fd, out_fd, inherited);

    let mut argv: Vec<CString> = Vec::with_capacity(command.arguments.len() + 1);
    for text in std::iter::once(&command.program).chain(command.arguments.iter()) {
        match CString::new(text.as_str()) {
            Ok(c) => argv.push(c),
            Err(_) => {
                eprintln!("nexsh: {}: invalid argument", command.program);
                unsafe { libc::_exit(1) };
            }
        }
    }

    let err = match execvp(argv[0].as_c_str(), &argv) {
        Err(e) => e,
        // execvp 成功不会返回
        Ok(_) => Errno::EINVAL,
    };
    if err == Errno::ENOENT {
        eprintln!("{}: command not found", command.program);
    } else {
        eprintln!("nexsh: {}: {}", command.program, err);
    }
    unsafe { libc::_exit(127) }
}

// 纯内建命令在辅助子进程里跑完管道这一级
fn builtin_child(
    ctx: &mut dyn Context,
    command: &Command,
    in_fd: Option<RawFd>,
    out_fd: Option<RawFd>,
    inherited: &[RawFd],
) -> ! {
    install_stdio(in_fd, out_fd, inherited);
    let code = builtins::invoke(ctx, &command.program, &command.arguments);
    let _ = std::io::stdout().flush();
    unsafe { libc::_exit(code) }
}

/// 等待一个子进程：正常退出取退出码，被信号杀死取 128+信号值
fn wait_for(pid: Pid) -> i32 {
    match waitpid(pid, None) {
        Ok(WaitStatus::Exited(_, code)) => code,
        Ok(WaitStatus::Signaled(_, signal, _)) => 128 + signal as i32,
        Ok(status) => {
            debug!("未预期的等待状态: {:?}", status);
            1
        }
        Err(e) => {
            error!("waitpid {} 失败: {}", pid, e);
            1
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shell::context::AiOutcome;
    use crate::shell::env::EnvStore;
    use crate::shell::executor::Jobs;
    use std::io;

    struct TestCtx {
        env: EnvStore,
        jobs: Jobs,
        history: Vec<String>,
    }

    impl TestCtx {
        fn new() -> Self {
            Self {
                env: EnvStore::from_process_env(),
                jobs: Jobs::new(),
                history: Vec::new(),
            }
        }
    }

    impl Context for TestCtx {
        fn lookup_env(&self, name: &str) -> Option<String> {
            self.env.get(name)
        }
        fn set_env(&mut self, name: &str, value: &str) -> Result<(), String> {
            self.env.set(name, value)
        }
        fn unset_env(&mut self, name: &str) {
            self.env.unset(name);
        }
        fn cwd(&self) -> String {
            crate::utils::path::current_dir()
        }
        fn set_cwd(&mut self, path: &str) -> io::Result<()> {
            std::env::set_current_dir(path)
        }
        fn history(&self) -> &[String] {
            &self.history
        }
        fn request_exit(&mut self, _code: i32) {}
        fn execute_line(&mut self, _line: &str) -> i32 {
            0
        }
        fn jobs(&mut self) -> &mut Jobs {
            &mut self.jobs
        }
        fn ai_enabled(&self) -> bool {
            false
        }
        fn ai_model(&self) -> String {
            String::new()
        }
        fn ai_explain(&mut self, _command: &str) -> String {
            String::new()
        }
        fn ai_suggest(&mut self, _task: &str) -> Vec<String> {
            Vec::new()
        }
        fn ai_natural(&mut self, _input: &str) -> AiOutcome {
            AiOutcome::Disabled
        }
    }

    fn external(program: &str, args: &[&str]) -> Command {
        Command {
            program: program.to_string(),
            arguments: args.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn foreground(commands: Vec<Command>) -> Pipeline {
        Pipeline {
            commands,
            background: false,
        }
    }

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("nexsh_test_{}_{}", tag, std::process::id()))
    }

    #[test]
    fn test_single_command_exit_code() {
        let mut ctx = TestCtx::new();
        let pipeline = foreground(vec![external("sh", &["-c", "exit 7"])]);
        assert_eq!(run(&mut ctx, &pipeline), 7);
        let pipeline = foreground(vec![external("true", &[])]);
        assert_eq!(run(&mut ctx, &pipeline), 0);
    }

    #[test]
    fn test_command_not_found_is_127() {
        let mut ctx = TestCtx::new();
        let pipeline = foreground(vec![external("no_such_prog_xyz", &[])]);
        assert_eq!(run(&mut ctx, &pipeline), 127);
    }

    #[test]
    fn test_pipeline_status_is_last_command() {
        let mut ctx = TestCtx::new();
        let pipeline = foreground(vec![
            external("sh", &["-c", "exit 3"]),
            external("sh", &["-c", "exit 5"]),
        ]);
        assert_eq!(run(&mut ctx, &pipeline), 5);

        let pipeline = foreground(vec![
            external("sh", &["-c", "exit 3"]),
            external("true", &[]),
        ]);
        assert_eq!(run(&mut ctx, &pipeline), 0);
    }

    #[test]
    fn test_output_redirection_truncate_and_append() {
        let mut ctx = TestCtx::new();
        let path = temp_path("redir");
        let path_str = path.to_string_lossy().to_string();

        let mut cmd = external("sh", &["-c", "printf 'a\\n'"]);
        cmd.output_file = Some(path_str.clone());
        assert_eq!(run(&mut ctx, &foreground(vec![cmd])), 0);

        let mut cmd = external("sh", &["-c", "printf 'b\\n'"]);
        cmd.output_file = Some(path_str.clone());
        cmd.append_output = true;
        assert_eq!(run(&mut ctx, &foreground(vec![cmd])), 0);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_input_redirection_through_pipeline() {
        let mut ctx = TestCtx::new();
        let in_path = temp_path("pipe_in");
        let out_path = temp_path("pipe_out");
        std::fs::write(&in_path, "one two\n").unwrap();

        let mut first = external("cat", &[]);
        first.input_file = Some(in_path.to_string_lossy().to_string());
        let mut last = external("wc", &["-w"]);
        last.output_file = Some(out_path.to_string_lossy().to_string());

        assert_eq!(run(&mut ctx, &foreground(vec![first, last])), 0);
        let counted = std::fs::read_to_string(&out_path).unwrap();
        assert_eq!(counted.trim(), "2");

        let _ = std::fs::remove_file(&in_path);
        let _ = std::fs::remove_file(&out_path);
    }

    #[test]
    fn test_builtin_output_redirection() {
        let mut ctx = TestCtx::new();
        let path = temp_path("builtin_redir");
        let path_str = path.to_string_lossy().to_string();

        let mut cmd = external("echo", &["hi"]);
        cmd.output_file = Some(path_str.clone());
        assert_eq!(run(&mut ctx, &foreground(vec![cmd])), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hi\n");

        let mut cmd = external("echo", &["again"]);
        cmd.output_file = Some(path_str);
        cmd.append_output = true;
        assert_eq!(run(&mut ctx, &foreground(vec![cmd])), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hi\nagain\n");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_builtin_background_runs_in_child() {
        let mut ctx = TestCtx::new();
        let path = temp_path("builtin_bg");

        let mut cmd = external("echo", &["done"]);
        cmd.output_file = Some(path.to_string_lossy().to_string());
        let pipeline = Pipeline {
            commands: vec![cmd],
            background: true,
        };
        assert_eq!(run(&mut ctx, &pipeline), 0);
        assert!(!ctx.jobs.is_empty());
        ctx.jobs.wait_all();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "done\n");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_input_file_aborts_without_spawn() {
        let mut ctx = TestCtx::new();
        let mut cmd = external("cat", &[]);
        cmd.input_file = Some("/nonexistent/nexsh/input".to_string());
        assert_eq!(run(&mut ctx, &foreground(vec![cmd])), 1);
    }

    #[test]
    fn test_background_returns_immediately() {
        let mut ctx = TestCtx::new();
        let pipeline = Pipeline {
            commands: vec![external("sleep", &["0.2"])],
            background: true,
        };
        let started = std::time::Instant::now();
        assert_eq!(run(&mut ctx, &pipeline), 0);
        assert!(started.elapsed().as_millis() < 150);
        assert!(!ctx.jobs.is_empty());
        ctx.jobs.wait_all();
        assert!(ctx.jobs.is_empty());
    }

    #[test]
    fn test_mutating_builtin_refused_in_pipeline() {
        let mut ctx = TestCtx::new();
        let pipeline = foreground(vec![external("cd", &["/tmp"]), external("cat", &[])]);
        assert_eq!(run(&mut ctx, &pipeline), 1);
    }

    #[test]
    fn test_no_descriptor_leak() {
        let mut ctx = TestCtx::new();
        let count_fds = || std::fs::read_dir("/proc/self/fd").map(|d| d.count()).unwrap_or(0);

        let before = count_fds();
        for _ in 0..5 {
            let pipeline = foreground(vec![
                external("sh", &["-c", "printf x"]),
                external("cat", &[]),
                external("wc", &["-c"]),
            ]);
            let mut cmd_pipeline = pipeline;
            cmd_pipeline.commands[2].output_file = Some("/dev/null".to_string());
            assert_eq!(run(&mut ctx, &cmd_pipeline), 0);
        }
        let after = count_fds();
        // 泄漏会随轮次单调增长，并发测试的瞬时抖动不会
        assert!(
            after <= before + 3,
            "descriptor count grew from {} to {}",
            before,
            after
        );
    }
}
