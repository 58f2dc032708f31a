//! Parsing expression grammars, compiled to a little backtracking virtual machine.
//!
//! ```
//! let program = pegvm::compile(
//!     "number <- +{ '0'..'9' } * ?('.' * +{ '0'..'9' })",
//!     "<doc>".to_owned(),
//!     None,
//! )
//! .unwrap();
//! assert_eq!(program.match_("3.14!"), Some(4));
//! assert_eq!(program.match_("pi"), None);
//! ```
//!
//! Grammars come from [`parse`] or get built by hand out of [`Pattern`]s, then
//! [`Grammar::compile`] turns them into a [`Program`]. See [`peg`] for how the machine works.

mod display;
pub mod parse;
pub mod pattern;
pub mod peg;

#[macro_use]
extern crate derivative;

use thiserror::Error;

pub use display::LitFmt;
pub use parse::{parse, parse_pattern, GrammarParseError, GrammarParseErrorInfo, InvalidEscape};
pub use pattern::{ClassItem, Grammar, Pattern, Rule};
pub use peg::{
    compile_rule, link, CharSet, CompileError, Instruction, MatchConfig, MatchError, Opcode,
    Outcome, Profile, Program, RuleTable,
};

/// Anything that can go wrong between grammar text and a program.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] GrammarParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Read a grammar and compile it, starting from `start` or else the first rule.
pub fn compile(s: &str, source_name: String, start: Option<&str>) -> Result<Program, Error> {
    let grammar = parse(s, source_name)?;
    // With no rules at all there's nothing to start from, and the linker says so.
    let start = start.or_else(|| grammar.start_rule()).unwrap_or("");
    Ok(grammar.compile(start)?)
}

#[test]
fn compiles_text() {
    let source = "main <- item * *(',' * item)\nitem <- +{ 'a'..'z' }\n";
    let program = compile(source, "<test>".to_owned(), None).unwrap();
    assert_eq!(program.match_("ab,cd;"), Some(5));
    assert_eq!(program.rules(), vec![("main", 0), ("item", program.entry("item").unwrap())]);

    let program = compile(source, "<test>".to_owned(), Some("item")).unwrap();
    assert_eq!(program.match_("ab,cd"), Some(2));

    assert!(matches!(
        compile(source, "<test>".to_owned(), Some("nope")),
        Err(Error::Compile(CompileError::MissingStart(_)))
    ));
    assert!(matches!(
        compile("", "<test>".to_owned(), None),
        Err(Error::Compile(CompileError::MissingStart(_)))
    ));
    assert!(matches!(
        compile("main <- ", "<test>".to_owned(), None),
        Err(Error::Parse(_))
    ));
}
