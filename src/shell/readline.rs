use std::path::PathBuf;

use log::{debug, warn};
use rustyline::config::Config as LineConfig;
use rustyline::history::FileHistory;
use rustyline::Editor;

use crate::utils::config::Config;

/// rustyline 封装：编辑模式、历史加载与保存
pub struct ReadlineManager {
    editor: Editor<(), FileHistory>,
    history_file: PathBuf,
}

impl ReadlineManager {
    pub fn new(config: &Config) -> rustyline::Result<Self> {
        let line_config = LineConfig::builder()
            .history_ignore_space(true)
            .auto_add_history(false)
            .edit_mode(config.get_edit_mode())
            .build();
        let mut editor = Editor::with_config(line_config)?;

        let history_file = config.history_file.clone();
        if editor.load_history(&history_file).is_err() {
            debug!("历史文件不存在或无法读取: {}", history_file.display());
        }

        Ok(Self {
            editor,
            history_file,
        })
    }

    pub fn readline(&mut self, prompt: &str) -> rustyline::Result<String> {
        self.editor.readline(prompt)
    }

    pub fn add_history(&mut self, line: &str) {
        let _ = self.editor.add_history_entry(line);
    }

    /// 退出时落盘
    pub fn save_history(&mut self) {
        if let Err(e) = self.editor.save_history(&self.history_file) {
            warn!("保存历史失败 {}: {}", self.history_file.display(), e);
        }
    }
}
