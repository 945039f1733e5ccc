//! sewing: a resolution prover that compiles rules into trampolines.
//!
//! Rules are bucketed by the signature of their heads and compiled once into
//! closures ("trampolines") that return the next proof step instead of
//! calling it. A small runtime drives them with explicit continuation and
//! choice-point stacks, so deep recursion never grows the native stack.
//!
//! # Features
//!
//! - Unification with a trail for backtracking
//! - First-argument indexing for large predicates
//! - Cut, `once`, `not`, `if`
//! - `find.all`, `list.fold`, `list.query`
//! - `throw`/`try` with rollback to the point of `try`
//! - Suspended goals forced by the host
//! - Host predicates registered by namespace and name
//!
//! # Example
//!
//! ```
//! use sewing::{parse, parse_term, Generalizer, ProverConfig, SewingProver};
//!
//! let program = parse(
//!     "parent(tom, bob).
//!      parent(bob, pat).
//!      ancestor(X, Y) :- parent(X, Y).
//!      ancestor(X, Z) :- parent(X, Y), ancestor(Y, Z).",
//! )
//! .unwrap();
//! let prover = SewingProver::new(&program.rules).unwrap();
//!
//! let mut generalizer = Generalizer::new();
//! let goal = generalizer.generalize(&parse_term("ancestor(tom, Who)").unwrap());
//! let who = generalizer.variable("Who").unwrap().into();
//! let answers = prover
//!     .compile(&goal)
//!     .unwrap()
//!     .solve_all(&ProverConfig::default(), &who)
//!     .unwrap();
//! assert_eq!(answers.len(), 2);
//! ```

pub mod analyze;
pub mod binder;
pub mod builtin;
pub mod compile;
pub mod config;
pub mod control;
pub mod error;
pub mod expression;
pub mod generalizer;
pub mod ilist;
pub mod kb;
pub mod lexer;
pub mod parser;
pub mod prototype;
pub mod prover;
pub mod runtime;
pub mod term;
pub mod token;
pub mod trail;
pub mod unify;

pub use builtin::{BuiltinPredicate, Prover, SystemPredicates};
pub use config::{EngineConfig, ProverConfig};
pub use error::{CompileError, Error, ProveError, Result};
pub use generalizer::{Cloner, Generalizer};
pub use kb::{Program, Rule, RuleSet};
pub use lexer::{Lexer, LexerError};
pub use parser::{parse, parse_term, ParseError, Parser};
pub use prototype::{NoRewriter, Prototype, QueryRewriter};
pub use prover::{CompiledQuery, SewingProver, SewingProverBuilder};
pub use term::{Atom, Data, Operator, Reference, Suspend, Term};
pub use token::{Span, Token};
