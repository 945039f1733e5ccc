//! Tokens of the term reader.
//!
//! Every infix operator, `,` and `;` included, lexes straight to the
//! [`Operator`] it builds, so the parser reads precedence and associativity
//! off the term model instead of keeping its own table.

use std::fmt;

use crate::term::Operator;

/// Source location for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Lowercase (possibly dotted) identifier or quoted name.
    Atom(String),
    /// Uppercase identifier, or `_` followed by more characters.
    Variable(String),
    /// `_`
    Anonymous,
    Integer(i64),
    /// A binary operator; `-` doubles as prefix minus.
    Infix(Operator),
    /// `:-`
    Neck,
    /// `?-`
    Query,
    /// `.` ending a clause
    Dot,
    /// `|` in a list tail
    Pipe,
    /// `!`
    Cut,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Eof,
}

/// Fixed spellings, longest first so `=:=` is found before `=`. `mod` is an
/// operator too but lexes as a word.
pub const SYMBOLS: &[(&str, Token)] = &[
    ("=:=", Token::Infix(Operator::ArithEq)),
    ("=\\=", Token::Infix(Operator::ArithNe)),
    ("\\==", Token::Infix(Operator::NotIdentical)),
    (":-", Token::Neck),
    ("?-", Token::Query),
    ("\\=", Token::Infix(Operator::NotUnify)),
    ("==", Token::Infix(Operator::Identical)),
    ("=<", Token::Infix(Operator::Le)),
    (">=", Token::Infix(Operator::Ge)),
    ("=", Token::Infix(Operator::Equal)),
    ("<", Token::Infix(Operator::Lt)),
    (">", Token::Infix(Operator::Gt)),
    ("+", Token::Infix(Operator::Plus)),
    ("-", Token::Infix(Operator::Minus)),
    ("*", Token::Infix(Operator::Mult)),
    ("/", Token::Infix(Operator::Divide)),
    (",", Token::Infix(Operator::And)),
    (";", Token::Infix(Operator::Or)),
    ("(", Token::LParen),
    (")", Token::RParen),
    ("[", Token::LBracket),
    ("]", Token::RBracket),
    ("|", Token::Pipe),
    ("!", Token::Cut),
    (".", Token::Dot),
];

impl Token {
    /// The operator word `mod`, or an atom.
    pub fn word(name: String) -> Token {
        if name == Operator::Modulo.name() {
            Token::Infix(Operator::Modulo)
        } else {
            Token::Atom(name)
        }
    }

    pub fn infix(&self) -> Option<Operator> {
        match self {
            Token::Infix(operator) => Some(*operator),
            _ => None,
        }
    }

    /// Returns true if this token can start a term.
    pub fn can_start_term(&self) -> bool {
        matches!(
            self,
            Token::Atom(_)
                | Token::Variable(_)
                | Token::Anonymous
                | Token::Integer(_)
                | Token::Cut
                | Token::LParen
                | Token::LBracket
                | Token::Infix(Operator::Minus)
        )
    }
}

/// Source spelling, for error messages.
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Atom(name) | Token::Variable(name) => write!(f, "{}", name),
            Token::Anonymous => write!(f, "_"),
            Token::Integer(n) => write!(f, "{}", n),
            Token::Infix(operator) => write!(f, "{}", operator.name()),
            Token::Eof => write!(f, "end of input"),
            fixed => match SYMBOLS.iter().find(|(_, token)| token == fixed) {
                Some((spelling, _)) => write!(f, "{}", spelling),
                None => write!(f, "{:?}", fixed),
            },
        }
    }
}
