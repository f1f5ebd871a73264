use log::{debug, warn};

use super::ast::{Command, Pipeline};
use super::expand::expand_word;
use super::lexer::{Lexer, RedirectOp, Token};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
        }
    }

    fn next_token(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    /// 把一行解析成 Pipeline。解析异常（空段、悬空操作符）静默丢弃，
    /// 不会让 shell 报错退出
    pub fn parse(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Pipeline {
        let mut pipeline = Pipeline::default();

        loop {
            if let Some(cmd) = self.parse_segment(lookup) {
                pipeline.commands.push(cmd);
            }

            match self.current_token {
                Token::Pipe => {
                    self.next_token();
                    continue;
                }
                _ => break,
            }
        }

        // 后台标志上提到 Pipeline，只认最后一个命令
        for cmd in pipeline
            .commands
            .iter_mut()
            .rev()
            .skip(1)
            .filter(|cmd| cmd.background)
        {
            warn!("忽略管道中间的 & 标志: {}", cmd.program);
            cmd.background = false;
        }
        if let Some(last) = pipeline.commands.last_mut() {
            if last.background {
                last.background = false;
                pipeline.background = true;
            }
        }

        debug!("解析结果: {:?}", pipeline);
        pipeline
    }

    // 解析一个管道段，空段返回 None
    fn parse_segment(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Option<Command> {
        let mut command = Command::default();
        let mut has_program = false;

        loop {
            match &self.current_token {
                Token::Eof | Token::Pipe => break,
                Token::Background => {
                    command.background = true;
                    self.next_token();
                }
                Token::Redirect(op) => {
                    let op = op.clone();
                    self.parse_redirection(op, &mut command, lookup);
                }
                Token::Word(word) => {
                    if word.is_empty() {
                        self.next_token();
                        continue;
                    }
                    let expanded = expand_word(word, lookup);
                    if !has_program {
                        if expanded.is_empty() {
                            // 展开成空串的程序名直接丢弃
                            self.next_token();
                            continue;
                        }
                        command.program = expanded;
                        has_program = true;
                    } else {
                        command.arguments.push(expanded);
                    }
                    self.next_token();
                }
            }
        }

        if has_program {
            Some(command)
        } else {
            None
        }
    }

    // 重定向操作符后面必须跟文件名，否则该操作符被忽略
    fn parse_redirection(
        &mut self,
        operator: RedirectOp,
        command: &mut Command,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) {
        self.next_token();

        let filename = match &self.current_token {
            Token::Word(word) if !word.is_empty() => expand_word(word, lookup),
            _ => {
                debug!("重定向操作符后缺少文件名，忽略");
                return;
            }
        };
        self.next_token();

        match operator {
            RedirectOp::Input => command.input_file = Some(filename),
            RedirectOp::Output => {
                command.output_file = Some(filename);
                command.append_output = false;
            }
            RedirectOp::Append => {
                command.output_file = Some(filename);
                command.append_output = true;
            }
        }
    }
}
