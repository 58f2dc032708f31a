//! # Parsing Expression Grammars, compiled
//!
//! Grammars get lowered to a flat list of [`Instruction`]s and run on a little backtracking
//! stack machine. It's the LPeg trick, more or less.
//!
//! ## Instructions
//!
//! A [`Program`] is a `Vec<Instruction>`, indexed from 0. Execution starts at 0 and there are two
//! registers, the instruction pointer and the subject position (a byte offset, always on a `char`
//! boundary), plus a stack of return addresses and choice points.
//!
//! Jumps (`Choice` and `Commit`) are stored *relative* to the instruction doing the jumping.
//! This means a rule's body can be copied anywhere (inlined into another rule, or moved about by
//! the linker) without touching it. `Call`s are the only absolute addresses, and those are
//! filled in by the linker once it knows where everything went.
//!
//! ## Compiling
//!
//! Rules get compiled one at a time, in the order they're defined, into a [`RuleTable`].
//! If a rule refers to one that's already compiled, and no longer than [`INLINE_LIMIT`], the
//! body is just pasted in. Otherwise (forward references, recursion, big rules) it writes a `Call` with the rule's name and
//! leaves the address for [`link`] to fill in.
mod compile;
mod execute;
mod link;
mod profile;
mod set;

pub use compile::{compile_rule, RuleTable, INLINE_LIMIT};
pub use execute::{MatchConfig, MatchError, Outcome};
pub use link::link;
pub use profile::Profile;
pub use set::CharSet;

use bimap::BiHashMap;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Address a `Call` holds before it's been linked.
pub const UNLINKED: usize = usize::MAX;

/// How many opcodes there are.
pub const OPCODE_COUNT: usize = Opcode::Comment as usize + 1;

/// The kind of an [`Instruction`], without its payload.
///
/// The byte values are dense from 0 so they can index tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    // === Control ===
    Choice = 0,
    Commit,
    Call,
    Return,

    // === Matching ===
    MatchAny,
    MatchSet,
    MatchString,
    MatchStringCaseInsensitive,
    Fail,

    // === Misc ===
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Push a choice point that resumes at `pc + offset` with the current position.
    Choice(isize),
    /// Throw away the top choice point and jump to `pc + offset`.
    ///
    /// A backwards commit is the back-edge of a `*P` loop, and lands on that loop's `Choice`.
    Commit(isize),
    /// Push a return frame and jump to `addr`, which is the entry point of `rule`.
    ///
    /// `addr` is [`UNLINKED`] until the program is linked.
    Call { rule: String, addr: usize },
    /// Pop a return frame and go back to the caller.
    /// With nothing left on the stack this means the whole match succeeded.
    Return,
    /// Match any one char.
    MatchAny,
    /// Match one char in the set.
    MatchSet(CharSet),
    /// Match this literal exactly.
    MatchString(String),
    /// Match this literal, ignoring ASCII case.
    MatchStringCaseInsensitive(String),
    /// Backtrack to the nearest choice point.
    Fail,
    /// Does nothing.
    Comment(String),
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Choice(_) => Opcode::Choice,
            Instruction::Commit(_) => Opcode::Commit,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::Return => Opcode::Return,
            Instruction::MatchAny => Opcode::MatchAny,
            Instruction::MatchSet(_) => Opcode::MatchSet,
            Instruction::MatchString(_) => Opcode::MatchString,
            Instruction::MatchStringCaseInsensitive(_) => Opcode::MatchStringCaseInsensitive,
            Instruction::Fail => Opcode::Fail,
            Instruction::Comment(_) => Opcode::Comment,
        }
    }
}

/// Problems building a program. None of these leave a program behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("the range {lo:?}..{hi:?} in rule `{rule}` runs backwards")]
    BackwardsRange { rule: String, lo: char, hi: char },
    #[error("the repetition {{{min}..{max}}} in rule `{rule}` has a maximum below its minimum")]
    BadBounds {
        rule: String,
        min: usize,
        max: usize,
    },
    #[error("rule `{0}` is defined more than once")]
    DuplicateRule(String),
    #[error("there's no rule named `{0}` to start from")]
    MissingStart(String),
    #[error("rule `{rule}` refers to `{missing}`, which is never defined")]
    UnresolvedRule { rule: String, missing: String },
}

/// A linked, ready-to-run program.
///
/// Immutable once built, so share it around as much as you like.
#[derive(Debug, Clone)]
pub struct Program {
    code: Vec<Instruction>,
    /// Rule names to their entry addresses and back.
    entries: BiHashMap<String, usize>,
}

impl Program {
    /// Only the linker makes these.
    fn new(code: Vec<Instruction>, entries: BiHashMap<String, usize>) -> Self {
        Self { code, entries }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Address of the first instruction of the given rule.
    pub fn entry(&self, rule: &str) -> Option<usize> {
        self.entries.get_by_left(rule).copied()
    }

    /// Name of the rule whose entry point is exactly `addr`.
    pub fn rule_at(&self, addr: usize) -> Option<&str> {
        self.entries.get_by_right(&addr).map(String::as_str)
    }

    /// All the rules and their entry points, in address order.
    pub fn rules(&self) -> Vec<(&str, usize)> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .map(|(name, &addr)| (name.as_str(), addr))
            .collect();
        out.sort_unstable_by_key(|&(_, addr)| addr);
        out
    }
}

#[test]
fn opcode_bytes() {
    use std::convert::TryFrom;

    for b in 0..OPCODE_COUNT as u8 {
        let opc = Opcode::try_from(b).unwrap();
        assert_eq!(u8::from(opc), b);
    }
    assert!(Opcode::try_from(OPCODE_COUNT as u8).is_err());
    assert_eq!(
        Instruction::MatchStringCaseInsensitive("x".into()).opcode(),
        Opcode::MatchStringCaseInsensitive
    );
}
