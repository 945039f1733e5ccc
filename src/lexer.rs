//! Lexer for the term reader.
//!
//! Tokenizes source text into a stream of tokens, handling atoms, variables,
//! integers, operators, and comments.

use thiserror::Error;

use crate::token::{Span, Token, SYMBOLS};

/// Lexer error with location information.
#[derive(Error, Debug, Clone)]
#[error("lexer error at {span}: {message}")]
pub struct LexerError {
    pub message: String,
    pub span: Span,
}

impl LexerError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            span: Span::new(line, column),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lexer over source text.
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Current location, for error reporting.
    pub fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    /// Unconsumed input.
    fn rest(&mut self) -> &'a str {
        let input = self.input;
        let pos = self.chars.peek().map_or(input.len(), |&(pos, _)| pos);
        &input[pos..]
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn read_while(&mut self, first: char, accept: impl Fn(char) -> bool) -> String {
        let mut text = String::from(first);
        while let Some(c) = self.peek().filter(|&c| accept(c)) {
            text.push(c);
            self.advance();
        }
        text
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().map_or(false, char::is_whitespace) {
                self.advance();
            }

            let rest = self.rest();
            if rest.starts_with('%') {
                while !matches!(self.advance(), Some('\n') | None) {}
            } else if rest.starts_with("/*") {
                self.skip_block_comment();
            } else {
                return;
            }
        }
    }

    /// Block comments nest; an unterminated one runs to end of input.
    fn skip_block_comment(&mut self) {
        self.advance();
        self.advance();
        let mut depth = 1;
        while depth > 0 {
            let rest = self.rest();
            if rest.starts_with("*/") {
                depth -= 1;
            } else if rest.starts_with("/*") {
                depth += 1;
            } else if self.advance().is_none() {
                return;
            } else {
                continue;
            }
            self.advance();
            self.advance();
        }
    }

    /// An atom name. A dot followed by a lowercase letter continues it, so
    /// `list.fold` is one atom while `foo.` still ends a clause.
    fn read_atom_name(&mut self, first: char) -> String {
        let mut name = self.read_while(first, is_word_char);
        loop {
            let mut ahead = self.rest().chars();
            match (ahead.next(), ahead.next()) {
                (Some('.'), Some(c)) if c.is_ascii_lowercase() => {
                    self.advance();
                    self.advance();
                    name.push('.');
                    name.push_str(&self.read_while(c, is_word_char));
                }
                _ => return name,
            }
        }
    }

    fn read_quoted_atom(&mut self, start: Span) -> Result<String, LexerError> {
        let unterminated = || LexerError::new("Unterminated quoted atom", start.line, start.column);
        let mut atom = String::new();
        loop {
            match self.advance().ok_or_else(unterminated)? {
                '\'' if self.peek() == Some('\'') => {
                    self.advance();
                    atom.push('\'');
                }
                '\'' => return Ok(atom),
                '\\' => atom.push(match self.advance().ok_or_else(unterminated)? {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                }),
                c => atom.push(c),
            }
        }
    }

    fn read_integer(&mut self, first: char, start: Span) -> Result<i64, LexerError> {
        let digits = self.read_while(first, |c| c.is_ascii_digit());
        digits.parse().map_err(|_| {
            LexerError::new(
                format!("Integer {} out of range", digits),
                start.line,
                start.column,
            )
        })
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments();
        let start = self.span();

        let rest = self.rest();
        if let Some((symbol, token)) = SYMBOLS.iter().find(|(symbol, _)| rest.starts_with(symbol)) {
            for _ in symbol.chars() {
                self.advance();
            }
            return Ok(token.clone());
        }

        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        match c {
            '\'' => Ok(Token::Atom(self.read_quoted_atom(start)?)),
            '_' if self.peek().map_or(false, is_word_char) => {
                Ok(Token::Variable(self.read_while('_', is_word_char)))
            }
            '_' => Ok(Token::Anonymous),
            c if c.is_ascii_digit() => Ok(Token::Integer(self.read_integer(c, start)?)),
            c if c.is_ascii_lowercase() => Ok(Token::word(self.read_atom_name(c))),
            c if c.is_ascii_uppercase() => Ok(Token::Variable(self.read_while(c, is_word_char))),
            _ => Err(LexerError::new(
                format!("Unexpected character '{}'", c),
                start.line,
                start.column,
            )),
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }
}
