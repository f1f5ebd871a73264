use log::{debug, info, warn};

use crate::shell::ai::ollama::OllamaConnector;
use crate::shell::ai::validator::CommandValidator;
use crate::shell::context::AiOutcome;

// 对话记忆上限
const HISTORY_LIMIT: usize = 10;

// 响应首词命中这些才当作候选命令
const COMMON_COMMANDS: &[&str] = &[
    "ls", "cd", "pwd", "cat", "grep", "find", "mkdir", "rmdir", "rm", "cp", "mv", "touch", "echo",
    "tar", "gzip", "gunzip", "zip", "unzip", "du", "df", "ps", "kill", "chmod", "chown", "head",
    "tail", "wc", "sort", "uniq", "cut", "awk", "sed", "tr", "xargs", "which", "file", "stat",
    "ln", "date", "uptime", "whoami", "hostname", "uname", "env", "export", "history", "man",
    "curl", "wget", "git", "ssh", "scp", "top", "free", "ping",
];

pub struct AiAssistant {
    connector: OllamaConnector,
    validator: CommandValidator,
    model: String,
    enabled: bool,
    history: Vec<(String, String)>,
}

impl AiAssistant {
    /// 启动时探测一次 Ollama；不在线就整体禁用，
    /// 配置的模型没装则退回第一个可用的
    pub fn new(ollama_url: &str, preferred_model: &str) -> Self {
        let connector = OllamaConnector::new(ollama_url);
        let mut model = preferred_model.to_string();
        let enabled = if connector.is_available() {
            let models = connector.list_models();
            let found = models
                .iter()
                .any(|name| name == &model || name.starts_with(&format!("{}:", model)));
            if !found {
                if let Some(first) = models.first() {
                    warn!("模型 {} 未安装，改用 {}", model, first);
                    model = first.clone();
                } else {
                    warn!("Ollama 在线但没有任何模型");
                }
            }
            info!("AI 助手已启用，模型: {}", model);
            true
        } else {
            debug!("Ollama 不在线，AI 助手禁用");
            false
        };
        Self {
            connector,
            validator: CommandValidator::new(),
            model,
            enabled,
            history: Vec::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn explain(&mut self, command: &str) -> String {
        if !self.enabled {
            return String::new();
        }
        let prompt = format!(
            "Explain what this Linux command does in simple terms:\n{}",
            command
        );
        match self.connector.generate(&self.model, &prompt) {
            Ok(text) => text,
            Err(e) => {
                warn!("explain 请求失败: {}", e);
                String::new()
            }
        }
    }

    pub fn suggest(&mut self, task: &str) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        let prompt = format!(
            "Suggest up to 3 Linux shell commands for this task. \
             Output only the commands, one per line, no commentary:\n{}",
            task
        );
        match self.connector.generate(&self.model, &prompt) {
            Ok(text) => parse_suggestions(&text),
            Err(e) => {
                warn!("suggest 请求失败: {}", e);
                Vec::new()
            }
        }
    }

    /// 自然语言转命令，带安全校验
    pub fn process_natural(&mut self, input: &str, cwd: &str) -> AiOutcome {
        if !self.enabled {
            return AiOutcome::Disabled;
        }
        let prompt = build_natural_prompt(input, cwd, &self.history);
        let text = match self.connector.generate(&self.model, &prompt) {
            Ok(text) => text,
            Err(e) => {
                warn!("自然语言请求失败: {}", e);
                return AiOutcome::Disabled;
            }
        };

        let Some(command) = extract_command(&text) else {
            return AiOutcome::Reply(text);
        };

        if let Some(reason) = self.validator.danger_reason(&command) {
            let reason = match self.validator.safer_alternative(&command) {
                Some(alternative) => format!("{}. Safer: {}", reason, alternative),
                None => reason,
            };
            return AiOutcome::Unsafe { command, reason };
        }

        self.remember(input, &command);
        AiOutcome::Command(command)
    }

    fn remember(&mut self, input: &str, command: &str) {
        self.history.push((input.to_string(), command.to_string()));
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }
    }
}

fn build_natural_prompt(input: &str, cwd: &str, history: &[(String, String)]) -> String {
    let mut prompt = String::from(
        "You are a shell assistant. Translate the user's request into a single \
         Linux command. Reply with the command only, no explanation, no markdown. \
         If the request is not about running a command, answer in one short sentence.\n",
    );
    prompt.push_str(&format!("Current directory: {}\n", cwd));
    if !history.is_empty() {
        prompt.push_str("Recent interactions:\n");
        for (question, command) in history {
            prompt.push_str(&format!("User: {}\nCommand: {}\n", question, command));
        }
    }
    prompt.push_str(&format!("User: {}\nCommand:", input));
    prompt
}

/// 从模型回复里捞出候选命令。
/// 去掉代码围栏和 "$ " 前缀，首词是常见命令的短行才算数
fn extract_command(response: &str) -> Option<String> {
    for line in response.lines() {
        let mut line = line.trim();
        if line.is_empty() || line.starts_with("```") || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("$ ") {
            line = rest.trim();
        }
        if let Some(rest) = line.strip_prefix("Command:") {
            line = rest.trim();
        }
        if line.is_empty() || line.len() > 200 {
            continue;
        }
        let first = line.split_whitespace().next().unwrap_or_default();
        if COMMON_COMMANDS.contains(&first) {
            return Some(line.to_string());
        }
    }
    None
}

fn parse_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let line = line.trim();
            // 去掉 "1." / "-" 这类列表前缀
            let line = line
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(['.', ')', '-', '*'])
                .trim();
            line.trim_start_matches("$ ").trim()
        })
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("```"))
        .map(str::to_string)
        .take(3)
        .collect()
}
