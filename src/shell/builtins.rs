use std::io::{self, BufRead, Write};

use log::debug;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

use crate::shell::context::{AiOutcome, Context};

const BUILTINS: &[&str] = &[
    "ai", "bg", "cd", "echo", "exit", "export", "fg", "help", "history", "jobs", "pwd", "unset",
];

pub fn contains(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// 会改变 shell 自身状态的内建，不能放进多级管道
pub fn mutates_shell_state(name: &str) -> bool {
    matches!(name, "cd" | "exit" | "export" | "unset")
}

pub fn invoke(ctx: &mut dyn Context, name: &str, args: &[String]) -> i32 {
    debug!("内建命令: {} {:?}", name, args);
    match name {
        "ai" => builtin_ai(ctx, args),
        "bg" => builtin_bg(ctx),
        "cd" => builtin_cd(ctx, args),
        "echo" => builtin_echo(args),
        "exit" => builtin_exit(ctx, args),
        "export" => builtin_export(ctx, args),
        "fg" => builtin_fg(ctx),
        "help" => builtin_help(),
        "history" => builtin_history(ctx),
        "jobs" => builtin_jobs(ctx),
        "pwd" => builtin_pwd(ctx),
        "unset" => builtin_unset(ctx, args),
        _ => {
            eprintln!("nexsh: {}: not a builtin", name);
            1
        }
    }
}

fn builtin_cd(ctx: &mut dyn Context, args: &[String]) -> i32 {
    let target = if args.is_empty() {
        match ctx.lookup_env("HOME") {
            Some(home) => home,
            None => {
                eprintln!("cd: HOME not set");
                return 1;
            }
        }
    } else if args[0] == "-" {
        match ctx.lookup_env("OLDPWD") {
            Some(previous) => {
                println!("{}", previous);
                previous
            }
            None => {
                eprintln!("cd: OLDPWD not set");
                return 1;
            }
        }
    } else {
        shellexpand::tilde(args[0].as_str()).into_owned()
    };

    match ctx.set_cwd(&target) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("cd: {}: {}", target, e);
            1
        }
    }
}

fn builtin_pwd(ctx: &mut dyn Context) -> i32 {
    println!("{}", ctx.cwd());
    0
}

fn builtin_exit(ctx: &mut dyn Context, args: &[String]) -> i32 {
    // 非法参数按 0 处理
    let code = args
        .first()
        .and_then(|arg| arg.parse::<i32>().ok())
        .unwrap_or(0);
    ctx.request_exit(code);
    code
}

fn builtin_echo(args: &[String]) -> i32 {
    println!("{}", args.join(" "));
    0
}

fn builtin_history(ctx: &mut dyn Context) -> i32 {
    for (i, line) in ctx.history().iter().enumerate() {
        println!("  {}  {}", i + 1, line);
    }
    0
}

fn builtin_export(ctx: &mut dyn Context, args: &[String]) -> i32 {
    if args.is_empty() {
        eprintln!("export: usage: export NAME=VALUE");
        return 1;
    }
    for arg in args {
        let Some((name, value)) = arg.split_once('=') else {
            eprintln!("export: invalid format: {}", arg);
            return 1;
        };
        if let Err(e) = ctx.set_env(name, value) {
            eprintln!("export: {}", e);
            return 1;
        }
    }
    0
}

fn builtin_unset(ctx: &mut dyn Context, args: &[String]) -> i32 {
    if args.is_empty() {
        eprintln!("unset: usage: unset NAME...");
        return 1;
    }
    for name in args {
        ctx.unset_env(name);
    }
    0
}

fn builtin_jobs(ctx: &mut dyn Context) -> i32 {
    let jobs = ctx.jobs();
    if jobs.is_empty() {
        println!("No active jobs");
        return 0;
    }
    for job in jobs.jobs() {
        println!("{}", job);
    }
    0
}

fn builtin_fg(ctx: &mut dyn Context) -> i32 {
    let Some(job) = ctx.jobs().take_last() else {
        eprintln!("fg: no current job");
        return 1;
    };
    println!("{}", job.command);
    match waitpid(Pid::from_raw(job.pid), None) {
        Ok(WaitStatus::Exited(_, code)) => code,
        Ok(WaitStatus::Signaled(_, signal, _)) => 128 + signal as i32,
        _ => 1,
    }
}

fn builtin_bg(ctx: &mut dyn Context) -> i32 {
    if ctx.jobs().is_empty() {
        eprintln!("bg: no current job");
        return 1;
    }
    // 没实现作业暂停，后台任务本来就在跑
    println!("bg: job is already running in the background");
    0
}

fn builtin_help() -> i32 {
    println!("NeXShell - a Unix shell with an AI assistant");
    println!();
    println!("Built-in commands:");
    println!("  cd [DIR]          change directory (cd - returns to previous)");
    println!("  pwd               print working directory");
    println!("  echo [ARGS...]    print arguments");
    println!("  export NAME=VALUE set an environment variable");
    println!("  unset NAME...     remove environment variables");
    println!("  history           show command history");
    println!("  jobs              list background jobs");
    println!("  fg                wait for the most recent background job");
    println!("  bg                background job status");
    println!("  ai ...            AI assistant (try: ai)");
    println!("  exit [N]          leave the shell");
    println!();
    println!("Pipelines (|), redirections (<, >, >>) and background jobs (&)");
    println!("work as in other shells. $NAME expands outside single quotes.");
    0
}

fn builtin_ai(ctx: &mut dyn Context, args: &[String]) -> i32 {
    if args.is_empty() {
        println!("Usage:");
        println!("  ai status             show assistant availability");
        println!("  ai explain COMMAND    explain what a command does");
        println!("  ai suggest TASK       suggest commands for a task");
        println!("  ai QUESTION           ask in natural language");
        println!();
        println!("Examples:");
        println!("  ai explain tar -xzf archive.tar.gz");
        println!("  ai suggest find large files");
        println!("  ai show me the five biggest files here");
        return 0;
    }

    match args[0].as_str() {
        "status" => {
            if ctx.ai_enabled() {
                println!("AI assistant: enabled (model: {})", ctx.ai_model());
            } else {
                println!("AI assistant: disabled (is Ollama running?)");
            }
            0
        }
        "explain" => {
            if args.len() < 2 {
                eprintln!("ai: usage: ai explain COMMAND");
                return 1;
            }
            let command = args[1..].join(" ");
            let answer = ctx.ai_explain(&command);
            if answer.is_empty() {
                eprintln!("ai: no response from the assistant");
                return 1;
            }
            println!("{}", answer);
            0
        }
        "suggest" => {
            if args.len() < 2 {
                eprintln!("ai: usage: ai suggest TASK");
                return 1;
            }
            let task = args[1..].join(" ");
            let suggestions = ctx.ai_suggest(&task);
            if suggestions.is_empty() {
                println!("No suggestions available.");
                return 1;
            }
            for (i, suggestion) in suggestions.iter().enumerate() {
                println!("  {}. {}", i + 1, suggestion);
            }
            0
        }
        _ => run_natural(ctx, &args.join(" ")),
    }
}

fn run_natural(ctx: &mut dyn Context, input: &str) -> i32 {
    match ctx.ai_natural(input) {
        AiOutcome::Disabled => {
            eprintln!("AI assistant is not available. Is Ollama running?");
            1
        }
        AiOutcome::Reply(text) => {
            println!("AI Response: {}", text);
            1
        }
        AiOutcome::Unsafe { command, reason } => {
            eprintln!("Refusing to run suggested command: {}", command);
            eprintln!("Reason: {}", reason);
            1
        }
        AiOutcome::Command(command) => {
            println!("AI suggests: {}", command);
            print!("Execute this command? [y/N]: ");
            let _ = io::stdout().flush();

            let mut answer = String::new();
            if io::stdin().lock().read_line(&mut answer).is_err() {
                println!("Command not executed.");
                return 0;
            }
            let answer = answer.trim();
            if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
                ctx.execute_line(&command)
            } else {
                println!("Command not executed.");
                0
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shell::executor::Jobs;
    use std::collections::HashMap;

    struct MockCtx {
        env: HashMap<String, String>,
        cwd: String,
        set_cwd_calls: Vec<String>,
        exit_code: Option<i32>,
        executed: Vec<String>,
        history: Vec<String>,
        jobs: Jobs,
        ai_result: Option<AiOutcome>,
    }

    impl MockCtx {
        fn new() -> Self {
            Self {
                env: HashMap::new(),
                cwd: "/home/user".to_string(),
                set_cwd_calls: Vec::new(),
                exit_code: None,
                executed: Vec::new(),
                history: Vec::new(),
                jobs: Jobs::new(),
                ai_result: None,
            }
        }
    }

    impl Context for MockCtx {
        fn lookup_env(&self, name: &str) -> Option<String> {
            self.env.get(name).cloned()
        }
        fn set_env(&mut self, name: &str, value: &str) -> Result<(), String> {
            if name.is_empty() {
                return Err(format!("invalid variable name: {}", name));
            }
            self.env.insert(name.to_string(), value.to_string());
            Ok(())
        }
        fn unset_env(&mut self, name: &str) {
            self.env.remove(name);
        }
        fn cwd(&self) -> String {
            self.cwd.clone()
        }
        fn set_cwd(&mut self, path: &str) -> io::Result<()> {
            self.set_cwd_calls.push(path.to_string());
            self.cwd = path.to_string();
            Ok(())
        }
        fn history(&self) -> &[String] {
            &self.history
        }
        fn request_exit(&mut self, code: i32) {
            self.exit_code = Some(code);
        }
        fn execute_line(&mut self, line: &str) -> i32 {
            self.executed.push(line.to_string());
            0
        }
        fn jobs(&mut self) -> &mut Jobs {
            &mut self.jobs
        }
        fn ai_enabled(&self) -> bool {
            false
        }
        fn ai_model(&self) -> String {
            "test".to_string()
        }
        fn ai_explain(&mut self, _command: &str) -> String {
            "an explanation".to_string()
        }
        fn ai_suggest(&mut self, _task: &str) -> Vec<String> {
            vec!["ls -la".to_string()]
        }
        fn ai_natural(&mut self, _input: &str) -> AiOutcome {
            self.ai_result.take().unwrap_or(AiOutcome::Disabled)
        }
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_registry() {
        for name in ["cd", "pwd", "exit", "ai", "jobs", "echo"] {
            assert!(contains(name), "{} should be a builtin", name);
        }
        assert!(!contains("ls"));
        assert!(mutates_shell_state("cd"));
        assert!(mutates_shell_state("export"));
        assert!(!mutates_shell_state("echo"));
        assert!(!mutates_shell_state("pwd"));
    }

    #[test]
    fn test_cd_defaults_to_home() {
        let mut ctx = MockCtx::new();
        ctx.env.insert("HOME".to_string(), "/home/user".to_string());
        assert_eq!(invoke(&mut ctx, "cd", &[]), 0);
        assert_eq!(ctx.set_cwd_calls, vec!["/home/user"]);
    }

    #[test]
    fn test_cd_without_home_fails() {
        let mut ctx = MockCtx::new();
        assert_eq!(invoke(&mut ctx, "cd", &[]), 1);
        assert!(ctx.set_cwd_calls.is_empty());
    }

    #[test]
    fn test_cd_dash_uses_oldpwd() {
        let mut ctx = MockCtx::new();
        assert_eq!(invoke(&mut ctx, "cd", &strings(&["-"])), 1);

        ctx.env.insert("OLDPWD".to_string(), "/var/tmp".to_string());
        assert_eq!(invoke(&mut ctx, "cd", &strings(&["-"])), 0);
        assert_eq!(ctx.set_cwd_calls, vec!["/var/tmp"]);
    }

    #[test]
    fn test_exit_parses_code() {
        let mut ctx = MockCtx::new();
        assert_eq!(invoke(&mut ctx, "exit", &strings(&["42"])), 42);
        assert_eq!(ctx.exit_code, Some(42));

        // 非数字参数按 0 处理
        let mut ctx = MockCtx::new();
        assert_eq!(invoke(&mut ctx, "exit", &strings(&["abc"])), 0);
        assert_eq!(ctx.exit_code, Some(0));
    }

    #[test]
    fn test_export_and_unset() {
        let mut ctx = MockCtx::new();
        assert_eq!(invoke(&mut ctx, "export", &strings(&["FOO=bar"])), 0);
        assert_eq!(ctx.env.get("FOO").map(String::as_str), Some("bar"));

        // 值里允许再出现等号
        assert_eq!(invoke(&mut ctx, "export", &strings(&["EQ=a=b"])), 0);
        assert_eq!(ctx.env.get("EQ").map(String::as_str), Some("a=b"));

        assert_eq!(invoke(&mut ctx, "export", &strings(&["NOEQUALS"])), 1);
        assert_eq!(invoke(&mut ctx, "export", &[]), 1);

        assert_eq!(invoke(&mut ctx, "unset", &strings(&["FOO"])), 0);
        assert!(!ctx.env.contains_key("FOO"));
        assert_eq!(invoke(&mut ctx, "unset", &[]), 1);
    }

    #[test]
    fn test_ai_natural_outcomes() {
        let mut ctx = MockCtx::new();
        ctx.ai_result = Some(AiOutcome::Disabled);
        assert_eq!(invoke(&mut ctx, "ai", &strings(&["list", "files"])), 1);

        ctx.ai_result = Some(AiOutcome::Reply("just an answer".to_string()));
        assert_eq!(invoke(&mut ctx, "ai", &strings(&["what", "is", "this"])), 1);

        ctx.ai_result = Some(AiOutcome::Unsafe {
            command: "rm -rf /".to_string(),
            reason: "deletes everything".to_string(),
        });
        assert_eq!(invoke(&mut ctx, "ai", &strings(&["clean", "up"])), 1);
        assert!(ctx.executed.is_empty());
    }

    #[test]
    fn test_ai_subcommands() {
        let mut ctx = MockCtx::new();
        assert_eq!(invoke(&mut ctx, "ai", &[]), 0);
        assert_eq!(invoke(&mut ctx, "ai", &strings(&["status"])), 0);
        assert_eq!(invoke(&mut ctx, "ai", &strings(&["explain", "ls"])), 0);
        assert_eq!(invoke(&mut ctx, "ai", &strings(&["explain"])), 1);
        assert_eq!(invoke(&mut ctx, "ai", &strings(&["suggest", "x"])), 0);
        assert_eq!(invoke(&mut ctx, "ai", &strings(&["suggest"])), 1);
    }

    #[test]
    fn test_fg_without_jobs() {
        let mut ctx = MockCtx::new();
        assert_eq!(invoke(&mut ctx, "fg", &[]), 1);
        assert_eq!(invoke(&mut ctx, "bg", &[]), 1);
    }
}
