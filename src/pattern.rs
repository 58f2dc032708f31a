//! The combinator tree a grammar is made of.
//!
//! This is what the front-end produces and what the rule compiler consumes. It doesn't know
//! anything about how it was written down; you can build one by hand with the constructors here.

use std::collections::{HashMap, HashSet};

use crate::peg::{self, CompileError, Program};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// `(P)`. Exists so the tree can be written back out the way it came in.
    Group(Box<Pattern>),
    /// `'c'`
    Char(char),
    /// `"text"`
    Literal(String),
    /// `i"text"`, compared with ASCII case folding.
    LiteralCaseInsensitive(String),
    /// `.`
    Any,
    /// `{ 'x', 'a'..'z' }`. May be empty, in which case it never matches.
    Class(Vec<ClassItem>),
    /// `-P`: matches iff `P` does not, and consumes nothing.
    Not(Box<Pattern>),
    /// `P1 * P2`
    Sequence(Box<Pattern>, Box<Pattern>),
    /// `P1 | P2`
    Choice(Box<Pattern>, Box<Pattern>),
    /// `?P`
    Optional(Box<Pattern>),
    /// `*P`
    ZeroOrMore(Box<Pattern>),
    /// `+P`
    OneOrMore(Box<Pattern>),
    /// `P{min..max}`; `P{n}` has `min == max`.
    Repeat {
        pattern: Box<Pattern>,
        min: usize,
        max: usize,
    },
    /// Reference to another rule by name.
    Rule(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassItem {
    Char(char),
    /// Inclusive on both ends.
    Range(char, char),
}

impl Pattern {
    pub fn group(p: Pattern) -> Self {
        Self::Group(Box::new(p))
    }

    pub fn literal<S: Into<String>>(s: S) -> Self {
        Self::Literal(s.into())
    }

    pub fn literal_ci<S: Into<String>>(s: S) -> Self {
        Self::LiteralCaseInsensitive(s.into())
    }

    pub fn class<I: IntoIterator<Item = ClassItem>>(items: I) -> Self {
        Self::Class(items.into_iter().collect())
    }

    /// A class holding the single range `lo..hi`.
    pub fn range(lo: char, hi: char) -> Self {
        Self::Class(vec![ClassItem::Range(lo, hi)])
    }

    pub fn not(p: Pattern) -> Self {
        Self::Not(Box::new(p))
    }

    pub fn seq(a: Pattern, b: Pattern) -> Self {
        Self::Sequence(Box::new(a), Box::new(b))
    }

    pub fn or(a: Pattern, b: Pattern) -> Self {
        Self::Choice(Box::new(a), Box::new(b))
    }

    pub fn opt(p: Pattern) -> Self {
        Self::Optional(Box::new(p))
    }

    pub fn star(p: Pattern) -> Self {
        Self::ZeroOrMore(Box::new(p))
    }

    pub fn plus(p: Pattern) -> Self {
        Self::OneOrMore(Box::new(p))
    }

    pub fn repeat(p: Pattern, min: usize, max: usize) -> Self {
        Self::Repeat {
            pattern: Box::new(p),
            min,
            max,
        }
    }

    pub fn rule<S: Into<String>>(name: S) -> Self {
        Self::Rule(name.into())
    }

    /// Left-fold the patterns into a chain of sequences.
    /// Returns `None` if there weren't any.
    pub fn seq_all<I: IntoIterator<Item = Pattern>>(ps: I) -> Option<Self> {
        ps.into_iter().reduce(Pattern::seq)
    }

    /// Left-fold the patterns into a chain of ordered choices.
    pub fn or_all<I: IntoIterator<Item = Pattern>>(ps: I) -> Option<Self> {
        ps.into_iter().reduce(Pattern::or)
    }

    /// Call `f` with the name of every rule this pattern refers to, in order of appearance.
    pub fn for_each_reference<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Pattern::Rule(name) => f(name),
            Pattern::Group(p)
            | Pattern::Not(p)
            | Pattern::Optional(p)
            | Pattern::ZeroOrMore(p)
            | Pattern::OneOrMore(p)
            | Pattern::Repeat { pattern: p, .. } => p.for_each_reference(f),
            Pattern::Sequence(a, b) | Pattern::Choice(a, b) => {
                a.for_each_reference(f);
                b.for_each_reference(f);
            }
            Pattern::Char(_)
            | Pattern::Literal(_)
            | Pattern::LiteralCaseInsensitive(_)
            | Pattern::Any
            | Pattern::Class(_) => {}
        }
    }
}

/// `name <- pattern`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub pattern: Pattern,
}

impl Rule {
    pub fn new<S: Into<String>>(name: S, pattern: Pattern) -> Self {
        Self {
            name: name.into(),
            pattern,
        }
    }
}

/// An ordered list of rule definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grammar {
    pub rules: Vec<Rule>,
}

impl Grammar {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The first rule defined, which is the default place to start matching.
    pub fn start_rule(&self) -> Option<&str> {
        self.rules.first().map(|r| r.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Names of defined rules the start rule can never get to, in definition order.
    pub fn unreachable_rules(&self, start: &str) -> Vec<&str> {
        let by_name: HashMap<&str, &Rule> =
            self.rules.iter().map(|r| (r.name.as_str(), r)).collect();

        let mut seen = HashSet::new();
        let mut todo = vec![start];
        while let Some(name) = todo.pop() {
            if !seen.insert(name) {
                continue;
            }
            if let Some(rule) = by_name.get(name) {
                rule.pattern.for_each_reference(&mut |r| todo.push(r));
            }
        }

        self.rules
            .iter()
            .map(|r| r.name.as_str())
            .filter(|name| !seen.contains(name))
            .collect()
    }

    /// Compile every rule and link them into one program that starts at `start`.
    pub fn compile(&self, start: &str) -> Result<Program, CompileError> {
        let table = peg::RuleTable::build(self)?;
        let program = peg::link(&table, start)?;
        for name in self.unreachable_rules(start) {
            log::warn!("rule `{}` can't be reached from `{}`", name, start);
        }
        Ok(program)
    }
}

#[test]
fn folds() {
    let p = Pattern::seq_all(vec![
        Pattern::Char('a'),
        Pattern::Char('b'),
        Pattern::Char('c'),
    ])
    .unwrap();
    assert_eq!(
        p,
        Pattern::seq(
            Pattern::seq(Pattern::Char('a'), Pattern::Char('b')),
            Pattern::Char('c')
        )
    );
    assert_eq!(Pattern::or_all(Vec::new()), None);
}

#[test]
fn unreachable() {
    let g = Grammar::new(vec![
        Rule::new("main", Pattern::seq(Pattern::rule("a"), Pattern::Any)),
        Rule::new("a", Pattern::opt(Pattern::rule("main"))),
        Rule::new("lonely", Pattern::rule("a")),
        Rule::new("b", Pattern::Any),
    ]);
    assert_eq!(g.unreachable_rules("main"), vec!["lonely", "b"]);
    assert_eq!(g.unreachable_rules("lonely"), vec!["b"]);
    assert_eq!(g.start_rule(), Some("main"));
}
