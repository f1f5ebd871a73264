use std::iter::Peekable;
use std::str::Chars;

use log::debug;

use super::ast::{Quoting, Word};

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Word(Word),
    Pipe,
    Redirect(RedirectOp),
    Background,
    Eof,
}

#[derive(Debug, PartialEq, Clone)]
pub enum RedirectOp {
    Input,  // <
    Output, // >
    Append, // >>
}

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.peek_char() {
            None => Token::Eof,
            Some(c) => match c {
                '|' => {
                    self.read_char();
                    Token::Pipe
                }
                '&' => {
                    self.read_char();
                    Token::Background
                }
                '<' => {
                    self.read_char();
                    Token::Redirect(RedirectOp::Input)
                }
                '>' => {
                    self.read_char();
                    if self.peek_char() == Some('>') {
                        self.read_char();
                        Token::Redirect(RedirectOp::Append)
                    } else {
                        Token::Redirect(RedirectOp::Output)
                    }
                }
                _ => self.read_word(),
            },
        }
    }

    pub fn tokens(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            if token == Token::Eof {
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.read_char();
        }
    }

    // 引号切换状态但不产生字符，引号内的空白和操作符是普通文本
    fn read_word(&mut self) -> Token {
        let mut word = Word::default();
        let mut quoting = Quoting::Bare;

        while let Some(c) = self.peek_char() {
            match quoting {
                Quoting::Bare => {
                    if c.is_whitespace() || "<>|&".contains(c) {
                        break;
                    }
                    self.read_char();
                    match c {
                        '\'' => quoting = Quoting::Single,
                        '"' => quoting = Quoting::Double,
                        _ => word.push(c, Quoting::Bare),
                    }
                }
                Quoting::Single => {
                    self.read_char();
                    if c == '\'' {
                        quoting = Quoting::Bare;
                    } else {
                        word.push(c, Quoting::Single);
                    }
                }
                Quoting::Double => {
                    self.read_char();
                    if c == '"' {
                        quoting = Quoting::Bare;
                    } else {
                        word.push(c, Quoting::Double);
                    }
                }
            }
        }

        // 行尾未闭合的引号按已闭合处理
        if quoting != Quoting::Bare {
            debug!("未闭合的引号，按闭合处理: {:?}", word.raw());
        }

        Token::Word(word)
    }
}
