//! Counting what the machine gets up to.

use std::{collections::HashMap, convert::TryFrom, fmt};

use itertools::Itertools;

use super::{Instruction, Opcode, Program, OPCODE_COUNT};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    /// Executions of each opcode, indexed by its byte.
    opcodes: [u64; OPCODE_COUNT],
    /// Calls into each rule.
    calls: HashMap<String, u64>,
    /// Most frames there ever were on the stack at once.
    max_depth: usize,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that this instruction is about to run.
    pub fn record(&mut self, instr: &Instruction, program: &Program) {
        self.opcodes[u8::from(instr.opcode()) as usize] += 1;
        if let &Instruction::Call { addr, ref rule } = instr {
            let name = program.rule_at(addr).unwrap_or(rule.as_str());
            *self.calls.entry(name.to_owned()).or_insert(0) += 1;
        }
    }

    pub fn note_depth(&mut self, depth: usize) {
        self.max_depth = self.max_depth.max(depth);
    }

    pub fn count(&self, opcode: Opcode) -> u64 {
        self.opcodes[u8::from(opcode) as usize]
    }

    /// Every opcode that ran at least once, with how many times.
    pub fn opcodes(&self) -> impl Iterator<Item = (Opcode, u64)> + '_ {
        self.opcodes
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count > 0)
            .filter_map(|(idx, &count)| {
                let opc = Opcode::try_from(idx as u8).ok()?;
                Some((opc, count))
            })
    }

    pub fn calls(&self, rule: &str) -> u64 {
        self.calls.get(rule).copied().unwrap_or(0)
    }

    /// Total instructions executed.
    pub fn total(&self) -> u64 {
        self.opcodes.iter().sum()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} instructions, stack depth at most {}",
            self.total(),
            self.max_depth
        )?;
        for (opc, count) in self.opcodes() {
            writeln!(f, "  {:<28} {}", format!("{:?}", opc), count)?;
        }
        // Busiest rules first
        for (rule, count) in self
            .calls
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
        {
            writeln!(f, "  call {:<23} {}", rule, count)?;
        }
        Ok(())
    }
}

#[test]
fn counts() {
    use crate::{Grammar, MatchConfig, Pattern, Rule};

    // main <- *item ; item <- 'a' | 'b'
    let grammar = Grammar::new(vec![
        Rule::new("main", Pattern::star(Pattern::rule("item"))),
        Rule::new("item", Pattern::or(Pattern::Char('a'), Pattern::Char('b'))),
    ]);
    let program = grammar.compile("main").unwrap();
    let config = MatchConfig {
        step_limit: None,
        profile: true,
    };
    let outcome = program.match_with("abc", &config).unwrap();
    assert_eq!(outcome.end, Some(2));

    let profile = outcome.profile.unwrap();
    assert_eq!(profile.calls("item"), 3);
    assert_eq!(profile.count(Opcode::Call), 3);
    // one return out of each successful item, and one out of main
    assert_eq!(profile.count(Opcode::Return), 3);
    assert_eq!(profile.count(Opcode::Fail), 0);
    assert_eq!(profile.total(), outcome.steps);
    // loop choice point, call frame, item's choice point
    assert_eq!(profile.max_depth(), 3);
    assert!(profile.opcodes().all(|(_, count)| count > 0));
    assert!(profile.to_string().starts_with(&format!("{} instructions", outcome.steps)));
}
