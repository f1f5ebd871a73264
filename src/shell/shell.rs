use std::io;

use log::{debug, warn};
use rustyline::error::ReadlineError;

use crate::shell::ai::AiAssistant;
use crate::shell::context::{AiOutcome, Context};
use crate::shell::env::EnvStore;
use crate::shell::executor::{self, Jobs};
use crate::shell::parser::Parser;
use crate::shell::readline::ReadlineManager;
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::path;
use crate::utils::theme::{load_theme, Theme};

// 内部历史上限，和 history 内建共用
const HISTORY_LIMIT: usize = 1000;

pub struct Shell {
    config: Config,
    theme: Theme,
    env: EnvStore,
    jobs: Jobs,
    ai: AiAssistant,
    history: Vec<String>,
    cwd: String,
    exit_requested: bool,
    exit_code: i32,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        let theme = load_theme(&config.theme);
        let ai = AiAssistant::new(&config.ollama_url, &config.model);
        Self {
            theme,
            env: EnvStore::from_process_env(),
            jobs: Jobs::new(),
            ai,
            history: Vec::new(),
            cwd: path::current_dir(),
            exit_requested: false,
            exit_code: 0,
            config,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// 交互主循环
    pub fn run(&mut self) -> io::Result<()> {
        signals::install();
        println!("{}", self.theme.welcome_message);
        println!("Type 'help' for built-in commands, 'ai' for the assistant.");
        if !self.ai.enabled() {
            let notice = "AI assistant is disabled. Start Ollama to enable it.".to_string();
            println!("{}", (self.theme.notice_style)(notice));
        }

        let mut readline = ReadlineManager::new(&self.config).map_err(io::Error::other)?;

        loop {
            if self.exit_requested {
                break;
            }
            // 每次提示符之间回收后台任务
            self.jobs.reap_finished();

            let prompt = (self.theme.prompt_style)(self.prompt_text());
            signals::set_prompt(&prompt);

            match readline.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    readline.add_history(&line);
                    let status = self.execute(&line);
                    debug!("命令退出码: {}", status);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => self.exit_requested = true,
                Err(e) => {
                    warn!("读取输入失败: {}", e);
                    eprintln!("nexsh: {}", e);
                    break;
                }
            }
        }

        readline.save_history();
        if !self.jobs.is_empty() {
            println!("Waiting for background jobs...");
            self.jobs.wait_all();
        }
        signals::uninstall();
        println!("{}", self.theme.exit_message);
        Ok(())
    }

    /// 执行一行输入，返回退出码。ai 内建确认后也走这里递归执行
    pub fn execute(&mut self, line: &str) -> i32 {
        let line = line.trim();
        if line.is_empty() {
            return 0;
        }

        self.history.push(line.to_string());
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }

        let pipeline = {
            let lookup = |name: &str| self.env.get(name);
            Parser::new(line).parse(&lookup)
        };
        if pipeline.is_empty() {
            return 0;
        }
        executor::run(self, &pipeline)
    }

    fn prompt_text(&self) -> String {
        let user = self.env.get("USER").unwrap_or_else(|| "user".to_string());
        let host = self
            .env
            .get("HOSTNAME")
            .unwrap_or_else(|| "localhost".to_string());
        format_prompt(&user, &host, &self.cwd, self.env.get("HOME").as_deref())
    }
}

// USER@HOST:CWD$ ，家目录折叠成 ~
fn format_prompt(user: &str, host: &str, cwd: &str, home: Option<&str>) -> String {
    let mut cwd = cwd.to_string();
    if let Some(home) = home {
        if !home.is_empty() {
            if cwd == home {
                cwd = "~".to_string();
            } else if let Some(rest) = cwd.strip_prefix(&format!("{}/", home)) {
                cwd = format!("~/{}", rest);
            }
        }
    }
    format!("{}@{}:{}$ ", user, host, cwd)
}

impl Context for Shell {
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
        self.cwd.clone()
    }

    fn set_cwd(&mut self, path: &str) -> io::Result<()> {
        std::env::set_current_dir(path)?;
        let previous = std::mem::replace(&mut self.cwd, path::current_dir());
        // 变量名固定合法，set 不会失败
        let _ = self.env.set("OLDPWD", &previous);
        let _ = self.env.set("PWD", &self.cwd.clone());
        Ok(())
    }

    fn history(&self) -> &[String] {
        &self.history
    }

    fn request_exit(&mut self, code: i32) {
        self.exit_requested = true;
        self.exit_code = code;
    }

    fn execute_line(&mut self, line: &str) -> i32 {
        self.execute(line)
    }

    fn jobs(&mut self) -> &mut Jobs {
        &mut self.jobs
    }

    fn ai_enabled(&self) -> bool {
        self.ai.enabled()
    }

    fn ai_model(&self) -> String {
        self.ai.model().to_string()
    }

    fn ai_explain(&mut self, command: &str) -> String {
        self.ai.explain(command)
    }

    fn ai_suggest(&mut self, task: &str) -> Vec<String> {
        self.ai.suggest(task)
    }

    fn ai_natural(&mut self, input: &str) -> AiOutcome {
        let cwd = self.cwd.clone();
        self.ai.process_natural(input, &cwd)
    }
}
