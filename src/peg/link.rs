use bimap::BiHashMap;

use super::{CompileError, Instruction, Program, RuleTable};

/// Lay every rule out one after another, starting with `start`, and point all the `Call`s at
/// the right places.
///
/// Every rule gets a `Return` on the end. The start rule goes at address 0, so when the
/// machine returns from it with nothing on the stack the match is done.
pub fn link(table: &RuleTable, start: &str) -> Result<Program, CompileError> {
    let start_code = table
        .get(start)
        .ok_or_else(|| CompileError::MissingStart(start.to_owned()))?;

    let mut code = Vec::with_capacity(table.iter().map(|(_, c)| c.len() + 1).sum());
    let mut entries = BiHashMap::new();
    // Which rule each instruction came from, for the error if a call doesn't resolve.
    let mut owners = Vec::with_capacity(code.capacity());

    let rest = table.iter().filter(|&(name, _)| name != start);
    for (name, body) in std::iter::once((start, start_code)).chain(rest) {
        entries.insert(name.to_owned(), code.len());
        code.extend(body.iter().cloned());
        code.push(Instruction::Return);
        owners.resize(code.len(), name);
    }

    for (instr, owner) in code.iter_mut().zip(owners) {
        if let Instruction::Call { rule, addr } = instr {
            *addr = match entries.get_by_left(rule.as_str()) {
                Some(&entry) => entry,
                None => {
                    return Err(CompileError::UnresolvedRule {
                        rule: owner.to_owned(),
                        missing: rule.clone(),
                    })
                }
            };
        }
    }

    log::debug!(
        "linked {} rules into {} instructions, starting at `{}`",
        entries.len(),
        code.len(),
        start
    );
    for (name, addr) in entries.iter() {
        log::trace!("  `{}` at {}", name, addr);
    }

    Ok(Program::new(code, entries))
}

#[test]
fn layout() {
    use super::{CharSet, UNLINKED};
    use Instruction::*;

    let mut table = RuleTable::new();
    table
        .insert(
            "digits".into(),
            vec![MatchSet(CharSet::from_ranges(vec![('0', '9')]))],
        )
        .unwrap();
    table
        .insert(
            "main".into(),
            vec![
                Call {
                    rule: "digits".into(),
                    addr: UNLINKED,
                },
                Call {
                    rule: "main".into(),
                    addr: UNLINKED,
                },
            ],
        )
        .unwrap();

    let program = link(&table, "main").unwrap();
    assert_eq!(
        program.instructions(),
        &[
            Call {
                rule: "digits".into(),
                addr: 3
            },
            Call {
                rule: "main".into(),
                addr: 0
            },
            Return,
            // digits
            MatchSet(CharSet::from_ranges(vec![('0', '9')])),
            Return,
        ][..]
    );
    assert_eq!(program.entry("main"), Some(0));
    assert_eq!(program.entry("digits"), Some(3));
    assert_eq!(program.rule_at(3), Some("digits"));
    assert_eq!(program.rules(), vec![("main", 0), ("digits", 3)]);
}

#[test]
fn link_errors() {
    use super::UNLINKED;

    let mut table = RuleTable::new();
    table
        .insert(
            "main".into(),
            vec![Instruction::Call {
                rule: "nowhere".into(),
                addr: UNLINKED,
            }],
        )
        .unwrap();

    assert_eq!(
        link(&table, "elsewhere").unwrap_err(),
        CompileError::MissingStart("elsewhere".into())
    );
    assert_eq!(
        link(&table, "main").unwrap_err(),
        CompileError::UnresolvedRule {
            rule: "main".into(),
            missing: "nowhere".into()
        }
    );
}

#[test]
fn built_jumps_stay_in_their_rule() {
    use crate::{Grammar, Pattern, Rule};

    let grammar = Grammar::new(vec![
        Rule::new("digit", Pattern::range('0', '9')),
        Rule::new(
            "main",
            Pattern::seq_all(vec![
                Pattern::star(Pattern::or(Pattern::rule("digit"), Pattern::literal("ab"))),
                Pattern::not(Pattern::Char('!')),
                Pattern::repeat(Pattern::plus(Pattern::rule("later")), 1, 3),
            ])
            .unwrap(),
        ),
        Rule::new(
            "later",
            Pattern::or(
                Pattern::Char('x'),
                Pattern::seq_all(vec![
                    Pattern::Char('('),
                    Pattern::opt(Pattern::rule("main")),
                    Pattern::Char(')'),
                ])
                .unwrap(),
            ),
        ),
    ]);
    let table = RuleTable::build(&grammar).unwrap();

    for (name, body) in table.iter() {
        // Landing just past the end is the rule's `Return`.
        let mut open = 0isize;
        for (pc, instr) in body.iter().enumerate() {
            let offset = match *instr {
                Instruction::Choice(offset) => {
                    open += 1;
                    offset
                }
                Instruction::Commit(offset) => {
                    open -= 1;
                    offset
                }
                _ => continue,
            };
            let target = pc as isize + offset;
            assert!(
                (0..=body.len() as isize).contains(&target),
                "`{}` jumps from {} to {}",
                name,
                pc,
                target
            );
        }
        assert_eq!(open, 0, "`{}` leaves choice points behind", name);
    }

    let program = link(&table, "main").unwrap();
    assert_eq!(program.match_("12abx"), Some(5));
    assert_eq!(program.match_("1(ab(x))x!"), Some(9));
    assert_eq!(program.match_("12ab!x"), None);
}
