use std::collections::HashMap;
use std::env;

/// 环境变量存储。本地镜像 + 进程环境双写，
/// 这样 fork 出来的子进程自然继承所有修改
pub struct EnvStore {
    vars: HashMap<String, String>,
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl EnvStore {
    /// 启动时快照进程环境
    pub fn from_process_env() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(value) = self.vars.get(name) {
            return Some(value.clone());
        }
        env::var(name).ok()
    }

    pub fn set(&mut self, name: &str, value: &str) -> Result<(), String> {
        if !is_valid_name(name) {
            return Err(format!("invalid variable name: {}", name));
        }
        self.vars.insert(name.to_string(), value.to_string());
        env::set_var(name, value);
        Ok(())
    }

    pub fn unset(&mut self, name: &str) {
        self.vars.remove(name);
        env::remove_var(name);
    }
}
