use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::path::PathBuf;

pub struct Config {
    pub name: String,
    pub config_dir: PathBuf,
    pub theme: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub model: String,
    pub ollama_url: String,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/nexsh")
        } else {
            PathBuf::from("/tmp/nexsh")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from("nexsh"),
            theme: String::from("default"),
            history_file: config_dir.join("history"),
            editor_mode: String::from("emacs"),
            logger_level: String::from("warn"),
            logger_dir: config_dir.join("logs"),
            model: String::from("llama3.2"),
            ollama_url: String::from("http://localhost:11434"),
            config_dir,
        }
    }

    pub fn new() -> Self {
        // 优先加载环境变量文件，NEXSH_* 覆盖默认配置
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(theme) = env::var("NEXSH_THEME") {
            config.theme = theme;
        }
        if let Ok(editor) = env::var("NEXSH_EDITOR") {
            config.editor_mode = editor;
        }
        if let Ok(history) = env::var("NEXSH_HISTORY") {
            config.history_file = PathBuf::from(history);
        }
        if let Ok(level) = env::var("NEXSH_LOG_LEVEL") {
            config.logger_level = level;
        }
        if let Ok(dir) = env::var("NEXSH_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }
        if let Ok(model) = env::var("NEXSH_MODEL") {
            config.model = model;
        }
        if let Ok(url) = env::var("NEXSH_OLLAMA_URL") {
            config.ollama_url = url;
        }

        if let Some(parent) = config.history_file.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("nexsh: cannot create config directory: {}", e);
            }
        }

        config
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }
}
