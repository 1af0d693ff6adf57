use std::collections::VecDeque;
use std::io::BufRead;
use std::iter::Iterator;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Token {
    Text,
    Comment,
    Indent,
    SectionOpen,
    SectionClose,
    Equals,
    Newline,
    EOF,
}

pub struct Lexer<R> {
    input: R,
    eof_count: usize,
    cur_line: Option<VecDeque<(Token, String)>>,
}

impl<R: BufRead> Lexer<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            eof_count: 0,
            cur_line: None,
        }
    }

    fn split_line(line: &str) -> VecDeque<(Token, String)> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut res = VecDeque::new();

        let text = line.trim_start();
        if text.trim_end().is_empty() {
            return res;
        }

        // comments keep their original indentation
        if text.starts_with('#') {
            res.push_back((Token::Comment, line.to_string()));
            return res;
        }

        let indent = &line[..line.len() - text.len()];
        if !indent.is_empty() {
            res.push_back((Token::Indent, indent.to_string()));
        }
        let text = text.trim_end();

        if text.starts_with('[') {
            let name = text.trim_start_matches('[');
            res.push_back((
                Token::SectionOpen,
                text[..text.len() - name.len()].to_string(),
            ));

            match name.find(']') {
                Some(pos) => {
                    res.push_back((Token::Text, name[..pos].trim().to_string()));
                    let close = &name[pos..];
                    let rest = close.trim_start_matches(']');
                    res.push_back((
                        Token::SectionClose,
                        close[..close.len() - rest.len()].to_string(),
                    ));
                    if !rest.is_empty() {
                        res.push_back((Token::Text, rest.trim().to_string()));
                    }
                }
                None => res.push_back((Token::Text, name.trim().to_string())),
            }
            return res;
        }

        match text.split_once('=') {
            Some((key, value)) => {
                res.push_back((Token::Text, key.trim().to_string()));
                res.push_back((Token::Equals, String::from("=")));
                let value = value.trim();
                if !value.is_empty() {
                    res.push_back((Token::Text, value.to_string()));
                }
            }
            None => res.push_back((Token::Text, text.to_string())),
        }

        res
    }
}

impl<R: BufRead> Iterator for Lexer<R> {
    type Item = Result<(Token, String), std::io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur_line.is_none() {
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Err(err) => return Some(Err(err)),
                Ok(0) => {
                    self.eof_count += 1;
                    if self.eof_count == 1 {
                        return Some(Ok((Token::EOF, String::new())));
                    }
                    return None;
                }
                _ => {}
            }
            self.cur_line = Some(Self::split_line(&line));
        }

        match self.cur_line {
            Some(ref mut cur_line) => match cur_line.pop_front() {
                Some(item) => Some(Ok(item)),
                None => {
                    self.cur_line = None;
                    Some(Ok((Token::Newline, String::from("\n"))))
                }
            },
            None => None,
        }
    }
}
