//! Parser for the term reader.
//!
//! Precedence-climbing parser producing [`Term`]s with variables left as
//! variable atoms; compiling a rule renames them apart. Handles facts, rules,
//! `?-` queries, lists and the operator table of [`Operator`].

use thiserror::Error;

use crate::kb::{Program, Rule};
use crate::lexer::{Lexer, LexerError};
use crate::term::{Assoc, Operator, Term};
use crate::token::{Span, Token};

/// Parse error with location information.
#[derive(Error, Debug, Clone)]
#[error("parse error at {span}: {message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            span: Span::new(line, column),
        }
    }
}

impl From<LexerError> for ParseError {
    fn from(e: LexerError) -> Self {
        Self {
            message: e.message,
            span: e.span,
        }
    }
}

/// Highest operator precedence accepted in a clause.
const MAX_PRECEDENCE: u16 = 1200;
/// Arguments and list items stop below `,`.
const ARGUMENT_PRECEDENCE: u16 = 999;

/// Parser over a token stream.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    span: Span,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given input.
    pub fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let span = lexer.span();
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            span,
        })
    }

    /// Advance to the next token.
    fn advance(&mut self) -> Result<Token, ParseError> {
        let old = std::mem::replace(&mut self.current, Token::Eof);
        self.span = self.lexer.span();
        self.current = self.lexer.next_token()?;
        Ok(old)
    }

    /// Check if current token matches.
    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(&self.current) == std::mem::discriminant(token)
    }

    /// Expect a specific token, error if not found.
    fn expect(&mut self, expected: &Token) -> Result<Token, ParseError> {
        if self.check(expected) {
            self.advance()
        } else {
            Err(self.error(format!("Expected {}, found {}", expected, self.current)))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.span.line, self.span.column)
    }

    /// Parse a complete program.
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::new();

        while self.current != Token::Eof {
            if self.current == Token::Query {
                self.advance()?;
                let goal = self.parse_term(MAX_PRECEDENCE)?;
                self.expect(&Token::Dot)?;
                program.queries.push(goal);
            } else {
                let rule = self.parse_clause()?;
                program.rules.add(rule);
            }
        }

        Ok(program)
    }

    /// Parse `head.` or `head :- body.`
    fn parse_clause(&mut self) -> Result<Rule, ParseError> {
        let head = self.parse_term(MAX_PRECEDENCE)?;

        if self.current == Token::Neck {
            self.advance()?;
            let body = self.parse_term(MAX_PRECEDENCE)?;
            self.expect(&Token::Dot)?;
            Ok(Rule::new(head, body))
        } else {
            self.expect(&Token::Dot)?;
            Ok(Rule::fact(head))
        }
    }

    /// Parse a term whose operators bind no looser than `max`.
    pub fn parse_term(&mut self, max: u16) -> Result<Term, ParseError> {
        let mut left = self.parse_primary_term()?;
        let mut left_precedence = 0;

        while let Some(operator) = self.current.infix() {
            let precedence = operator.precedence();
            if precedence > max {
                break;
            }
            let (left_max, right_max) = match operator.assoc() {
                Assoc::Left => (precedence, precedence - 1),
                Assoc::Right => (precedence - 1, precedence),
                Assoc::None => (precedence - 1, precedence - 1),
            };
            if left_precedence > left_max {
                return Err(self.error(format!(
                    "Operator priority clash at {}",
                    operator.name()
                )));
            }
            self.advance()?;
            let right = self.parse_term(right_max)?;
            left = Term::tree(operator, left, right);
            left_precedence = precedence;
        }

        Ok(left)
    }

    /// Parse a primary term: atom, variable, integer, compound, list.
    fn parse_primary_term(&mut self) -> Result<Term, ParseError> {
        match &self.current {
            Token::Integer(n) => {
                let n = *n;
                self.advance()?;
                Ok(Term::int(n))
            }

            Token::Atom(name) => {
                let name = name.clone();
                self.advance()?;

                // Check for compound term
                if self.current == Token::LParen {
                    self.advance()?;
                    let args = self.parse_term_list()?;
                    self.expect(&Token::RParen)?;
                    Ok(Term::call(&name, args))
                } else {
                    Ok(Term::constant(&name))
                }
            }

            Token::Variable(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(Term::atom(&name))
            }

            Token::Anonymous => {
                self.advance()?;
                Ok(Term::atom("_"))
            }

            Token::Cut => {
                self.advance()?;
                Ok(Term::atom(crate::term::CUT))
            }

            Token::LBracket => {
                self.advance()?;
                self.parse_list()
            }

            Token::LParen => {
                self.advance()?;
                let term = self.parse_term(MAX_PRECEDENCE)?;
                self.expect(&Token::RParen)?;
                Ok(term)
            }

            // Negative literal, or `0 - X`
            Token::Infix(Operator::Minus) => {
                self.advance()?;
                if let Token::Integer(n) = self.current {
                    self.advance()?;
                    Ok(Term::int(-n))
                } else if self.current.can_start_term() {
                    let operand = self.parse_primary_term()?;
                    Ok(Term::tree(Operator::Minus, Term::int(0), operand))
                } else {
                    Err(self.error("Expected term after '-'"))
                }
            }

            _ => Err(self.error(format!("Expected term, found {}", self.current))),
        }
    }

    /// Parse a comma-separated list of arguments.
    fn parse_term_list(&mut self) -> Result<Vec<Term>, ParseError> {
        let mut terms = Vec::new();
        terms.push(self.parse_term(ARGUMENT_PRECEDENCE)?);

        while self.current == Token::Infix(Operator::And) {
            self.advance()?;
            terms.push(self.parse_term(ARGUMENT_PRECEDENCE)?);
        }

        Ok(terms)
    }

    /// Parse a list: [], [a], [a,b], [H|T], [a,b|T]
    fn parse_list(&mut self) -> Result<Term, ParseError> {
        // Empty list
        if self.current == Token::RBracket {
            self.advance()?;
            return Ok(Term::nil());
        }

        let elements = self.parse_term_list()?;

        // Check for tail
        let tail = if self.current == Token::Pipe {
            self.advance()?;
            self.parse_term(ARGUMENT_PRECEDENCE)?
        } else {
            Term::nil()
        };

        self.expect(&Token::RBracket)?;
        Ok(Term::list_with_tail(elements, tail))
    }

    /// Parse one term, optionally followed by a final dot.
    fn parse_single(&mut self) -> Result<Term, ParseError> {
        let term = self.parse_term(MAX_PRECEDENCE)?;
        if self.current == Token::Dot {
            self.advance()?;
        }
        if self.current != Token::Eof {
            return Err(self.error(format!("Unexpected {} after term", self.current)));
        }
        Ok(term)
    }
}

/// Parse a program from source code.
pub fn parse(input: &str) -> Result<Program, ParseError> {
    let mut parser = Parser::new(input)?;
    parser.parse_program()
}

/// Parse a single term, such as a goal.
pub fn parse_term(input: &str) -> Result<Term, ParseError> {
    let mut parser = Parser::new(input)?;
    parser.parse_single()
}
