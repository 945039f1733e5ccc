//! Error hierarchy.
//!
//! Compile errors are fatal and raised while building trampolines. Runtime
//! errors surface from a proof: an uncaught `throw`, an exhausted step budget,
//! or a suspension that did not yield exactly one value. Logical failure is
//! never an error.

use thiserror::Error;

use crate::parser::ParseError;
use crate::term::Term;

/// Raised while compiling rules or queries.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    /// No compilation rule matches the term's shape.
    #[error("cannot understand {0}")]
    Unrecognized(Term),

    /// Call to a predicate with no rules and no system definition.
    #[error("undefined predicate {0}")]
    Undefined(Term),

    #[error("unknown builtin {namespace}:{name}")]
    UnknownBuiltin { namespace: String, name: String },

    #[error("malformed builtin call {0}")]
    MalformedBuiltin(Term),

    /// A rule whose head has no prototype, e.g. a bare variable.
    #[error("rule head {0} cannot be indexed")]
    WildRule(Term),

    #[error("cannot evaluate {0}")]
    Expression(Term),

    #[error("config error: {0}")]
    Config(String),
}

/// Raised by a running proof.
#[derive(Error, Debug, Clone)]
pub enum ProveError {
    #[error("uncaught exception {term}")]
    Uncaught { term: Term, trace: String },

    #[error("step limit of {0} exceeded")]
    StepLimit(u64),

    #[error("suspended goal has no result")]
    NoResult,

    #[error("suspended goal has {0} results")]
    Ambiguous(usize),

    #[error("suspension forced while being evaluated")]
    RecursiveSuspend,
}

/// Any failure from reading, compiling or proving.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Prove(#[from] ProveError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// `error(Kind)`
pub fn error_term(kind: Term) -> Term {
    Term::call("error", vec![kind])
}

/// `error(type.error(Expected, Culprit))`
pub fn type_error(expected: &str, culprit: &Term) -> Term {
    error_term(Term::call(
        "type.error",
        vec![Term::atom(expected), culprit.final_term()],
    ))
}

/// `error(evaluation.error(What))`
pub fn evaluation_error(what: &str) -> Term {
    error_term(Term::call("evaluation.error", vec![Term::atom(what)]))
}

/// `error(instantiation.error)`
pub fn instantiation_error() -> Term {
    error_term(Term::atom("instantiation.error"))
}

/// `error(compile.error(Message))`
pub fn compile_error(error: &CompileError) -> Term {
    error_term(Term::call(
        "compile.error",
        vec![Term::constant(&error.to_string())],
    ))
}
