//! Rules and the rule database.

use std::fmt;

use hashbrown::HashMap;

use crate::error::CompileError;
use crate::prototype::Prototype;
use crate::term::Term;

/// `head :- tail`, as authored.
#[derive(Clone)]
pub struct Rule {
    pub head: Term,
    pub tail: Term,
}

impl Rule {
    pub fn new(head: Term, tail: Term) -> Self {
        Self { head, tail }
    }

    /// A rule whose body is `true`.
    pub fn fact(head: Term) -> Self {
        Self::new(head, Term::atom("true"))
    }

    pub fn is_fact(&self) -> bool {
        self.tail
            .as_atom()
            .map_or(false, |atom| atom.name() == "true")
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fact() {
            write!(f, "{}.", self.head)
        } else {
            write!(f, "{} :- {}.", self.head, self.tail)
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Ordered collection of rules handed to a prover.
#[derive(Clone, Default, Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<Rule>> for RuleSet {
    fn from(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

/// A parsed source file: its rules and its `?-` queries.
#[derive(Clone, Default, Debug)]
pub struct Program {
    pub rules: RuleSet,
    pub queries: Vec<Term>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Rules bucketed by the prototype of their heads, in order of first appearance.
#[derive(Default)]
pub struct RuleDatabase {
    buckets: HashMap<Prototype, Vec<Rule>>,
    order: Vec<Prototype>,
}

impl RuleDatabase {
    /// Fails on the first rule whose head has no prototype.
    pub fn new(rules: &RuleSet) -> Result<Self, CompileError> {
        let mut database = Self::default();
        for rule in rules.rules() {
            let prototype =
                Prototype::of(&rule.head).ok_or_else(|| CompileError::WildRule(rule.head.clone()))?;
            if !database.buckets.contains_key(&prototype) {
                database.order.push(prototype.clone());
            }
            database.buckets.entry(prototype).or_default().push(rule.clone());
        }
        Ok(database)
    }

    pub fn contains(&self, prototype: &Prototype) -> bool {
        self.buckets.contains_key(prototype)
    }

    pub fn get(&self, prototype: &Prototype) -> Option<&[Rule]> {
        self.buckets.get(prototype).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Prototype, &[Rule])> + '_ {
        self.order
            .iter()
            .filter_map(move |p| self.buckets.get(p).map(|rules| (p, rules.as_slice())))
    }

    /// Number of distinct prototypes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Partitions a bucket by the prototype of each head's first argument.
///
/// Returns `None` when any head's first argument is unindexable. Sub-buckets
/// keep the original relative order of their rules.
pub fn index_by_first_argument(rules: &[Rule]) -> Option<Vec<(Prototype, Vec<Rule>)>> {
    let mut groups: Vec<(Prototype, Vec<Rule>)> = Vec::new();
    let mut positions: HashMap<Prototype, usize> = HashMap::new();
    for rule in rules {
        let prototype = Prototype::of_argument(&rule.head, 0)?;
        match positions.get(&prototype) {
            Some(&i) => groups[i].1.push(rule.clone()),
            None => {
                positions.insert(prototype.clone(), groups.len());
                groups.push((prototype, vec![rule.clone()]));
            }
        }
    }
    Some(groups)
}
