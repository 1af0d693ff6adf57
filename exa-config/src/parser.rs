use std::io::BufRead;
use std::iter::{Iterator, Peekable};

use anyhow::{bail, format_err, Error};

use super::lexer::*;
use super::section::{Section, SectionItem};

pub struct ExaConfParser<R: BufRead> {
    input: Peekable<Lexer<R>>,
    line_nr: usize,
}

impl<R: BufRead> ExaConfParser<R> {
    pub fn new(reader: R) -> Self {
        let input = Lexer::new(reader).peekable();
        Self { input, line_nr: 1 }
    }

    fn peek(&mut self) -> Result<Token, Error> {
        match self.input.peek() {
            Some(Err(err)) => {
                bail!("input error - {}", err);
            }
            Some(Ok((token, _))) => Ok(*token),
            None => {
                bail!("got unexpected end of stream (inside peek)");
            }
        }
    }

    fn next(&mut self) -> Result<(Token, String), Error> {
        match self.input.next() {
            Some(Err(err)) => {
                bail!("input error - {}", err);
            }
            Some(Ok((token, text))) => {
                if token == Token::Newline {
                    self.line_nr += 1;
                }
                Ok((token, text))
            }
            None => {
                bail!("got unexpected end of stream (inside next)");
            }
        }
    }

    fn next_text(&mut self) -> Result<String, Error> {
        match self.next()? {
            (Token::Text, text) => Ok(text),
            (unexpected, _) => bail!("got unexpected token {:?} (expecting Text)", unexpected),
        }
    }

    fn eat(&mut self, expected: Token) -> Result<String, Error> {
        let (next, text) = self.next()?;
        if next != expected {
            bail!("expected {:?}, got {:?}", expected, next);
        }
        Ok(text)
    }

    /// Parse the whole file into an unnamed root section.
    pub fn parse(&mut self) -> Result<Section, Error> {
        self.do_parse()
            .map_err(|err| format_err!("line {}: {}", self.line_nr, err))
    }

    fn do_parse(&mut self) -> Result<Section, Error> {
        // open sections, root first
        let mut stack = vec![Section::new("")];

        loop {
            match self.peek()? {
                Token::EOF => break,
                Token::Newline => {
                    self.eat(Token::Newline)?;
                    current(&mut stack).push_item(SectionItem::Blank);
                }
                Token::Indent => {
                    self.eat(Token::Indent)?;
                }
                Token::Comment => {
                    let line = self.eat(Token::Comment)?;
                    self.eat(Token::Newline)?;
                    current(&mut stack).push_item(SectionItem::Comment(line));
                }
                Token::SectionOpen => self.parse_section_header(&mut stack)?,
                Token::Text => {
                    let key = self.next_text()?;
                    if key.is_empty() {
                        bail!("missing key name");
                    }
                    self.eat(Token::Equals)?;
                    let value = match self.peek()? {
                        Token::Text => self.next_text()?,
                        _ => String::new(),
                    };
                    self.eat(Token::Newline)?;

                    let section = current(&mut stack);
                    if section.has_key(&key) {
                        bail!("duplicate key '{}' in section '{}'", key, section.name());
                    }
                    section.push_item(SectionItem::Entry { key, value });
                }
                unexpected => bail!("got unexpected token {:?}", unexpected),
            }
        }

        close_sections(&mut stack, 1);

        match stack.pop() {
            Some(root) => Ok(root),
            None => bail!("lost root section"),
        }
    }

    fn parse_section_header(&mut self, stack: &mut Vec<Section>) -> Result<(), Error> {
        let open = self.eat(Token::SectionOpen)?;
        let name = self.next_text()?;
        let close = self.eat(Token::SectionClose)?;

        if self.peek()? != Token::Newline {
            bail!("garbage after section header '{}'", name);
        }
        self.eat(Token::Newline)?;

        if name.is_empty() {
            bail!("empty section name");
        }

        let depth = open.len();
        if close.len() != depth {
            bail!("mismatched brackets in section header '{}'", name);
        }
        // the root is at depth 0, so a new section may be nested at most one level deeper
        if depth > stack.len() {
            bail!("section '{}' is nested too deep", name);
        }

        close_sections(stack, depth);

        if current(stack).section(&name).is_some() {
            bail!("duplicate section '{}'", name);
        }

        stack.push(Section::new(&name));
        Ok(())
    }
}

fn current(stack: &mut [Section]) -> &mut Section {
    // the root section is never popped while parsing
    let len = stack.len();
    &mut stack[len - 1]
}

/// Close open sections until `depth` sections (including the root) remain.
fn close_sections(stack: &mut Vec<Section>, depth: usize) {
    while stack.len() > depth {
        if let Some(section) = stack.pop() {
            current(stack).push_item(SectionItem::Section(section));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(input: &str) -> Result<Section, Error> {
        ExaConfParser::new(input.as_bytes()).parse()
    }

    #[test]
    fn test_parse_nested() -> Result<(), Error> {
        let input = "\
[Global]
    Revision = 3
[Node : 11]
    PrivateNet = 10.10.10.11/24
    [[Disk : disk1]]
        Devices = dev.1, dev.2
    [[Disk : disk2]]
        Devices = dev.3,
[Groups]
    [[exausers]]
        ID = 500
";
        let root = parse(input)?;

        assert_eq!(root.section("Global").and_then(|s| s.get("Revision")), Some("3"));

        let node = root.section("Node : 11").unwrap();
        assert_eq!(node.get("PrivateNet"), Some("10.10.10.11/24"));
        assert_eq!(node.sections().count(), 2);
        assert_eq!(
            node.section("Disk : disk2").and_then(|s| s.get("Devices")),
            Some("dev.3,")
        );

        let groups = root.section("Groups").unwrap();
        assert_eq!(groups.section("exausers").and_then(|s| s.get("ID")), Some("500"));
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        let err = parse("[Global]\n    = 3\n").unwrap_err();
        assert!(err.to_string().starts_with("line 2:"), "{}", err);

        assert!(parse("[Global]\n    Revision\n").is_err());

        assert!(parse("[Global]\n[[[Deep]]]\n").is_err());
        assert!(parse("[Global]]\n").is_err());
        assert!(parse("[Global]\n[Global]\n").is_err());
        assert!(parse("[Global]\n    A = 1\n    A = 2\n").is_err());
        assert!(parse("[]\n").is_err());
        assert!(parse("[Global] trailing\n").is_err());
    }

    #[test]
    fn test_keys_before_first_section() -> Result<(), Error> {
        let root = parse("# header\nVersion = 1\n\n[Global]\n")?;
        assert_eq!(root.get("Version"), Some("1"));
        assert!(root.section("Global").is_some());
        Ok(())
    }
}
