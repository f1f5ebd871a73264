use std::fmt;

/// 单词里每一段文本的引号来源
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Quoting {
    Bare,
    Single,
    Double,
}

/// 词法阶段产出的单词：按引号上下文切成若干段，
/// 展开阶段据此决定哪些段做变量替换
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Word {
    pub segments: Vec<(String, Quoting)>,
}

impl Word {
    pub fn push(&mut self, c: char, quoting: Quoting) {
        match self.segments.last_mut() {
            Some((text, q)) if *q == quoting => text.push(c),
            _ => self.segments.push((c.to_string(), quoting)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|(text, _)| text.is_empty())
    }

    /// 未展开的原始文本，仅用于日志
    pub fn raw(&self) -> String {
        self.segments.iter().map(|(text, _)| text.as_str()).collect()
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Command {
    pub program: String,
    pub arguments: Vec<String>,
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    pub append_output: bool,
    pub background: bool,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub background: bool,
}

impl Pipeline {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

// 展开后的词再序列化时需要保护空白、操作符和 $。
// 单引号本身没法出现在单引号段里，拼成双引号段 "'" 接回去
fn quote_word(word: &str) -> String {
    if word.is_empty() {
        return String::from("''");
    }
    if !word
        .chars()
        .any(|c| c.is_whitespace() || "|><&\"'$".contains(c))
    {
        return word.to_string();
    }

    let mut result = String::new();
    let mut chunk = String::new();
    for c in word.chars() {
        if c == '\'' {
            if !chunk.is_empty() {
                result.push_str(&format!("'{}'", chunk));
                chunk.clear();
            }
            result.push_str("\"'\"");
        } else {
            chunk.push(c);
        }
    }
    if !chunk.is_empty() {
        result.push_str(&format!("'{}'", chunk));
    }
    result
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote_word(&self.program))?;
        for arg in &self.arguments {
            write!(f, " {}", quote_word(arg))?;
        }
        if let Some(input) = &self.input_file {
            write!(f, " < {}", quote_word(input))?;
        }
        if let Some(output) = &self.output_file {
            let op = if self.append_output { ">>" } else { ">" };
            write!(f, " {} {}", op, quote_word(output))?;
        }
        if self.background {
            write!(f, " &")?;
        }
        Ok(())
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for cmd in &self.commands {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{}", cmd)?;
            first = false;
        }
        if self.background {
            write!(f, " &")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_segments_merge() {
        let mut word = Word::default();
        word.push('a', Quoting::Bare);
        word.push('b', Quoting::Bare);
        word.push('c', Quoting::Single);
        assert_eq!(
            word.segments,
            vec![
                ("ab".to_string(), Quoting::Bare),
                ("c".to_string(), Quoting::Single)
            ]
        );
    }

    #[test]
    fn test_command_display() {
        let cmd = Command {
            program: "echo".to_string(),
            arguments: vec!["hello world".to_string(), "-n".to_string()],
            input_file: None,
            output_file: Some("/tmp/out".to_string()),
            append_output: true,
            background: false,
        };
        assert_eq!(cmd.to_string(), "echo 'hello world' -n >> /tmp/out");
    }

    #[test]
    fn test_display_protects_quotes_and_dollar() {
        let cmd = Command {
            program: "echo".to_string(),
            arguments: vec!["a'b".to_string(), "$FOO".to_string()],
            ..Default::default()
        };
        assert_eq!(cmd.to_string(), r#"echo 'a'"'"'b' '$FOO'"#);
    }

    #[test]
    fn test_pipeline_display() {
        let pipeline = Pipeline {
            commands: vec![
                Command {
                    program: "ls".to_string(),
                    ..Default::default()
                },
                Command {
                    program: "wc".to_string(),
                    arguments: vec!["-l".to_string()],
                    ..Default::default()
                },
            ],
            background: true,
        };
        assert_eq!(pipeline.to_string(), "ls | wc -l &");
    }
}
