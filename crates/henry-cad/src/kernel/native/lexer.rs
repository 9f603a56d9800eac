//! ISO 10303-21 (STEP physical file) lexer.

use crate::kernel::{CadError, CadResult};

/// Token types for STEP physical files.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Entity or section keyword (CARTESIAN_POINT, DATA, END-ISO-10303-21, ...)
    Keyword(String),
    /// Entity instance name (#12)
    InstanceName(u64),
    /// Integer literal
    Integer(i64),
    /// Real literal (1., -2.5E-03, ...)
    Real(f64),
    /// Quoted string with '' unescaped
    String(String),
    /// Enumeration value without the dots (.T. -> "T")
    Enumeration(String),
    /// Binary literal contents
    Binary(String),
    /// Unset attribute
    Dollar,
    /// Derived attribute
    Star,
    LParen,
    RParen,
    Comma,
    Equals,
    Semicolon,
}

/// A token with its source line.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
}

/// Lexer for STEP physical files.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
        }
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> CadResult<Vec<SpannedToken>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Get the next token, `None` at end of input.
    pub fn next_token(&mut self) -> CadResult<Option<SpannedToken>> {
        self.skip_trivia()?;

        let line = self.line;
        let Some(c) = self.peek_char() else {
            return Ok(None);
        };

        let token = match c {
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            ',' => self.single(Token::Comma),
            '=' => self.single(Token::Equals),
            ';' => self.single(Token::Semicolon),
            '$' => self.single(Token::Dollar),
            '*' => self.single(Token::Star),
            '#' => {
                self.advance();
                let digits = self.read_while(|c| c.is_ascii_digit());
                let id = digits
                    .parse()
                    .map_err(|_| self.error(format!("invalid instance name '#{}'", digits)))?;
                Token::InstanceName(id)
            }
            '\'' => Token::String(self.read_string()?),
            '"' => {
                self.advance();
                let body = self.read_while(|c| c != '"');
                self.expect_char('"')?;
                Token::Binary(body)
            }
            '.' => {
                self.advance();
                let name = self.read_while(|c| c.is_ascii_alphanumeric() || c == '_');
                self.expect_char('.')?;
                Token::Enumeration(name.to_ascii_uppercase())
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' => self.read_number()?,
            c if c.is_ascii_alphabetic() || c == '!' || c == '_' => {
                let word =
                    self.read_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '!'));
                Token::Keyword(word.to_ascii_uppercase())
            }
            other => return Err(self.error(format!("unexpected character '{}'", other))),
        };

        Ok(Some(SpannedToken { token, line }))
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn read_number(&mut self) -> CadResult<Token> {
        let mut text = String::new();
        if let Some(sign @ ('-' | '+')) = self.peek_char() {
            text.push(sign);
            self.advance();
        }
        text.push_str(&self.read_while(|c| c.is_ascii_digit()));

        let mut is_real = false;
        if self.peek_char() == Some('.') {
            is_real = true;
            text.push('.');
            self.advance();
            text.push_str(&self.read_while(|c| c.is_ascii_digit()));
        }
        if let Some(e @ ('E' | 'e')) = self.peek_char() {
            is_real = true;
            text.push(e);
            self.advance();
            if let Some(sign @ ('-' | '+')) = self.peek_char() {
                text.push(sign);
                self.advance();
            }
            text.push_str(&self.read_while(|c| c.is_ascii_digit()));
        }

        if is_real {
            text.parse()
                .map(Token::Real)
                .map_err(|_| self.error(format!("invalid real '{}'", text)))
        } else {
            text.parse()
                .map(Token::Integer)
                .map_err(|_| self.error(format!("invalid integer '{}'", text)))
        }
    }

    fn read_string(&mut self) -> CadResult<String> {
        self.expect_char('\'')?;
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('\'') => {
                    if self.peek_char() == Some('\'') {
                        self.advance();
                        value.push('\'');
                    } else {
                        return Ok(value);
                    }
                }
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string".into())),
            }
        }
    }

    fn skip_trivia(&mut self) -> CadResult<()> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') => {
                    self.advance();
                    if self.advance() != Some('*') {
                        return Err(self.error("expected '*' after '/'".into()));
                    }
                    let mut previous = '\0';
                    loop {
                        match self.advance() {
                            Some('/') if previous == '*' => break,
                            Some(c) => previous = c,
                            None => return Err(self.error("unterminated comment".into())),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            if !predicate(c) {
                break;
            }
            out.push(c);
            self.advance();
        }
        out
    }

    fn expect_char(&mut self, expected: char) -> CadResult<()> {
        match self.advance() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of file", expected))),
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn error(&self, message: String) -> CadError {
        CadError::InvalidFormat(format!("line {}: {}", self.line, message))
    }
}
