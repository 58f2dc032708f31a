use indexmap::IndexMap;

use super::{CharSet, CompileError, Instruction, UNLINKED};
use crate::pattern::{ClassItem, Grammar, Pattern, Rule};

/// Rule bodies longer than this many instructions get called instead of inlined.
///
/// Without a cap, rules like `r2 <- r1 * r1`, `r3 <- r2 * r2`, ... double in size at every step.
pub const INLINE_LIMIT: usize = 32;

/// Compiled rule bodies by name, in the order they were defined.
///
/// Bodies don't have a trailing `Return`; the linker adds those.
///
/// The only way to fill one from outside the crate is [`RuleTable::build`], so every body in a
/// table has its jumps inside itself and pops every choice point it pushes. The linker and the
/// machine both rely on that.
///
/// ```compile_fail
/// use pegvm::{Instruction, RuleTable};
///
/// let mut table = RuleTable::new();
/// table.insert("main".to_owned(), vec![Instruction::Choice(2), Instruction::MatchAny]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: IndexMap<String, Vec<Instruction>>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile all the rules of a grammar in one pass, in definition order.
    ///
    /// Each rule can inline the ones defined before it; anything else becomes a `Call`.
    pub fn build(grammar: &Grammar) -> Result<Self, CompileError> {
        let mut table = Self::new();
        for rule in &grammar.rules {
            let code = compile_rule(rule, &table)?;
            log::debug!(
                "compiled `{} <- {}` into {} instructions",
                rule.name,
                rule.pattern,
                code.len()
            );
            table.insert(rule.name.clone(), code)?;
        }
        Ok(table)
    }

    /// Add a compiled rule. Each name can only go in once.
    pub(crate) fn insert(
        &mut self,
        name: String,
        code: Vec<Instruction>,
    ) -> Result<(), CompileError> {
        if self.rules.contains_key(&name) {
            return Err(CompileError::DuplicateRule(name));
        }
        self.rules.insert(name, code);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[Instruction]> {
        self.rules.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Instruction])> {
        self.rules
            .iter()
            .map(|(name, code)| (name.as_str(), code.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Lower one rule's pattern to instructions, inlining anything already in `table`.
pub fn compile_rule(rule: &Rule, table: &RuleTable) -> Result<Vec<Instruction>, CompileError> {
    let mut builder = Builder {
        code: Vec::new(),
        rule: &rule.name,
        table,
    };
    builder.write_pattern(&rule.pattern)?;
    Ok(builder.code)
}

struct Builder<'a> {
    code: Vec<Instruction>,
    /// Name of the rule being compiled, for errors.
    rule: &'a str,
    table: &'a RuleTable,
}

impl Builder<'_> {
    /// Append the instructions for this pattern.
    fn write_pattern(&mut self, pattern: &Pattern) -> Result<(), CompileError> {
        match pattern {
            Pattern::Group(inner) => self.write_pattern(inner)?,
            Pattern::Char(c) => self.code.push(Instruction::MatchString(c.to_string())),
            Pattern::Literal(s) => self.code.push(Instruction::MatchString(s.clone())),
            Pattern::LiteralCaseInsensitive(s) => self
                .code
                .push(Instruction::MatchStringCaseInsensitive(s.clone())),
            Pattern::Any => self.code.push(Instruction::MatchAny),
            Pattern::Class(items) => {
                let set = self.class_set(items)?;
                self.code.push(Instruction::MatchSet(set));
            }
            Pattern::Sequence(a, b) => {
                self.write_pattern(a)?;
                self.write_pattern(b)?;
            }
            Pattern::Choice(a, b) => self.write_choice(a, b)?,
            Pattern::Optional(inner) => self.write_optional(inner)?,
            Pattern::ZeroOrMore(inner) => self.write_loop(inner)?,
            Pattern::OneOrMore(inner) => {
                self.write_pattern(inner)?;
                self.write_loop(inner)?;
            }
            &Pattern::Repeat {
                ref pattern,
                min,
                max,
            } => {
                if max < min {
                    return Err(CompileError::BadBounds {
                        rule: self.rule.to_owned(),
                        min,
                        max,
                    });
                }
                for _ in 0..min {
                    self.write_pattern(pattern)?;
                }
                for _ in min..max {
                    self.write_optional(pattern)?;
                }
            }
            Pattern::Not(inner) => {
                // choice -> P -> commit into a fail.
                // if P fails we resume after the fail having consumed nothing;
                // if it matches the fail takes out whatever choice point is outside us.
                let body = self.compile_sub(inner)?;
                self.code.push(Instruction::Choice(offset(body.len() + 3)));
                self.code.extend(body);
                self.code.push(Instruction::Commit(1));
                self.code.push(Instruction::Fail);
            }
            Pattern::Rule(name) => match self.table.get(name) {
                Some(body) if body.len() <= INLINE_LIMIT => {
                    self.code.push(Instruction::Comment(format!("inline {}", name)));
                    self.code.extend(body.iter().cloned());
                }
                // Not compiled yet, or too big to paste everywhere it's used.
                _ => self.code.push(Instruction::Call {
                    rule: name.clone(),
                    addr: UNLINKED,
                }),
            },
        }
        Ok(())
    }

    fn write_choice(&mut self, a: &Pattern, b: &Pattern) -> Result<(), CompileError> {
        let left = self.compile_sub(a)?;
        let right = self.compile_sub(b)?;

        // Two plain sets can just be one set.
        if let ([Instruction::MatchSet(l)], [Instruction::MatchSet(r)]) =
            (left.as_slice(), right.as_slice())
        {
            self.code.push(Instruction::MatchSet(l.union(r)));
            return Ok(());
        }

        self.code.push(Instruction::Choice(offset(left.len() + 2)));
        self.code.extend(left);
        self.code.push(Instruction::Commit(offset(right.len() + 1)));
        self.code.extend(right);
        Ok(())
    }

    fn write_optional(&mut self, inner: &Pattern) -> Result<(), CompileError> {
        let body = self.compile_sub(inner)?;
        self.code.push(Instruction::Choice(offset(body.len() + 2)));
        self.code.extend(body);
        self.code.push(Instruction::Commit(1));
        Ok(())
    }

    /// `*P`. The commit goes back to the choice, which arms a fresh choice point each time round.
    fn write_loop(&mut self, inner: &Pattern) -> Result<(), CompileError> {
        let body = self.compile_sub(inner)?;
        let len = body.len();
        self.code.push(Instruction::Choice(offset(len + 2)));
        self.code.extend(body);
        self.code.push(Instruction::Commit(-offset(len + 1)));
        Ok(())
    }

    /// Compile a pattern on its own, so we know how long it is before writing the jumps around it.
    fn compile_sub(&self, pattern: &Pattern) -> Result<Vec<Instruction>, CompileError> {
        let mut sub = Builder {
            code: Vec::new(),
            rule: self.rule,
            table: self.table,
        };
        sub.write_pattern(pattern)?;
        Ok(sub.code)
    }

    fn class_set(&self, items: &[ClassItem]) -> Result<CharSet, CompileError> {
        let mut ranges = Vec::with_capacity(items.len());
        for &item in items {
            ranges.push(match item {
                ClassItem::Char(c) => (c, c),
                ClassItem::Range(lo, hi) if lo <= hi => (lo, hi),
                ClassItem::Range(lo, hi) => {
                    return Err(CompileError::BackwardsRange {
                        rule: self.rule.to_owned(),
                        lo,
                        hi,
                    })
                }
            });
        }
        Ok(CharSet::from_ranges(ranges))
    }
}

/// Vec lengths always fit in an isize.
fn offset(len: usize) -> isize {
    len as isize
}

#[cfg(test)]
fn compile_alone(pattern: Pattern) -> Result<Vec<Instruction>, CompileError> {
    compile_rule(&Rule::new("test", pattern), &RuleTable::new())
}

#[test]
fn atoms() {
    use Instruction::*;

    assert_eq!(
        compile_alone(Pattern::literal("abc")).unwrap(),
        vec![MatchString("abc".into())]
    );
    assert_eq!(
        compile_alone(Pattern::group(Pattern::literal_ci("abc"))).unwrap(),
        vec![MatchStringCaseInsensitive("abc".into())]
    );
    assert_eq!(compile_alone(Pattern::Any).unwrap(), vec![MatchAny]);
    assert_eq!(
        compile_alone(Pattern::class(vec![])).unwrap(),
        vec![MatchSet(CharSet::empty())]
    );
}

#[test]
fn choice_shape() {
    use Instruction::*;

    let code = compile_alone(Pattern::or(Pattern::literal("a"), Pattern::literal("ab"))).unwrap();
    assert_eq!(
        code,
        vec![
            Choice(3),
            MatchString("a".into()),
            Commit(2),
            MatchString("ab".into()),
        ]
    );
}

#[test]
fn set_fusion() {
    use Instruction::*;

    let code = compile_alone(Pattern::or(
        Pattern::range('a', 'c'),
        Pattern::range('A', 'C'),
    ))
    .unwrap();
    assert_eq!(code, vec![MatchSet(CharSet::from_chars("abcABC".chars()))]);

    // Chains fuse all the way down.
    let code = compile_alone(
        Pattern::or_all(vec![
            Pattern::class(vec![ClassItem::Char('x')]),
            Pattern::range('0', '9'),
            Pattern::class(vec![ClassItem::Char('y')]),
        ])
        .unwrap(),
    )
    .unwrap();
    assert_eq!(
        code,
        vec![MatchSet(CharSet::from_ranges(vec![
            ('0', '9'),
            ('x', 'y')
        ]))]
    );

    // Not if either side is something else.
    let code = compile_alone(Pattern::or(Pattern::range('a', 'c'), Pattern::Char('d'))).unwrap();
    assert_eq!(code.len(), 4);
    assert_eq!(code[0], Choice(3));
    let code = compile_alone(Pattern::or(Pattern::Any, Pattern::range('a', 'c'))).unwrap();
    assert_eq!(code.len(), 4);
}

#[test]
fn loop_shapes() {
    use Instruction::*;

    let a = || MatchString("a".into());
    assert_eq!(
        compile_alone(Pattern::star(Pattern::Char('a'))).unwrap(),
        vec![Choice(3), a(), Commit(-2)]
    );
    assert_eq!(
        compile_alone(Pattern::plus(Pattern::Char('a'))).unwrap(),
        vec![a(), Choice(3), a(), Commit(-2)]
    );
    assert_eq!(
        compile_alone(Pattern::opt(Pattern::Char('a'))).unwrap(),
        vec![Choice(3), a(), Commit(1)]
    );
    assert_eq!(
        compile_alone(Pattern::not(Pattern::Char('a'))).unwrap(),
        vec![Choice(4), a(), Commit(1), Fail]
    );
    assert_eq!(
        compile_alone(Pattern::repeat(Pattern::Char('a'), 1, 3)).unwrap(),
        vec![a(), Choice(3), a(), Commit(1), Choice(3), a(), Commit(1)]
    );
    assert_eq!(
        compile_alone(Pattern::repeat(Pattern::Char('a'), 2, 2)).unwrap(),
        vec![a(), a()]
    );
}

#[test]
fn nested_offsets() {
    use Instruction::*;

    // *("ab" | 'c')
    let code = compile_alone(Pattern::star(Pattern::or(
        Pattern::literal("ab"),
        Pattern::Char('c'),
    )))
    .unwrap();
    assert_eq!(
        code,
        vec![
            Choice(6),
            Choice(3),
            MatchString("ab".into()),
            Commit(2),
            MatchString("c".into()),
            Commit(-5),
        ]
    );
}

#[test]
fn references() {
    use Instruction::*;

    let mut table = RuleTable::new();
    table
        .insert("digit".into(), vec![MatchSet(CharSet::from_ranges(vec![('0', '9')]))])
        .unwrap();

    let rule = Rule::new(
        "num",
        Pattern::seq(Pattern::rule("digit"), Pattern::rule("num")),
    );
    assert_eq!(
        compile_rule(&rule, &table).unwrap(),
        vec![
            Comment("inline digit".into()),
            MatchSet(CharSet::from_ranges(vec![('0', '9')])),
            Call {
                rule: "num".into(),
                addr: UNLINKED
            },
        ]
    );

    // Inlined sets don't fuse.
    let rule = Rule::new(
        "either",
        Pattern::or(Pattern::rule("digit"), Pattern::range('a', 'f')),
    );
    assert_eq!(compile_rule(&rule, &table).unwrap()[0], Choice(4));
}

#[test]
fn errors() {
    assert_eq!(
        compile_alone(Pattern::range('z', 'a')),
        Err(CompileError::BackwardsRange {
            rule: "test".into(),
            lo: 'z',
            hi: 'a'
        })
    );
    assert_eq!(
        compile_alone(Pattern::repeat(Pattern::Any, 3, 1)),
        Err(CompileError::BadBounds {
            rule: "test".into(),
            min: 3,
            max: 1
        })
    );

    let grammar = Grammar::new(vec![
        Rule::new("a", Pattern::Any),
        Rule::new("a", Pattern::Char('a')),
    ]);
    assert_eq!(
        RuleTable::build(&grammar).unwrap_err(),
        CompileError::DuplicateRule("a".into())
    );
}

#[test]
fn table_order() {
    let grammar = Grammar::new(vec![
        Rule::new("z", Pattern::rule("y")),
        Rule::new("y", Pattern::Any),
        Rule::new("x", Pattern::rule("y")),
    ]);
    let table = RuleTable::build(&grammar).unwrap();
    let names: Vec<_> = table.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["z", "y", "x"]);
    // `z` came before `y` so it calls; `x` came after so it inlines.
    assert_eq!(table.get("z").unwrap().len(), 1);
    assert_eq!(table.get("x").unwrap().len(), 2);
}

#[test]
fn big_rules_get_called() {
    use Instruction::*;

    let mut table = RuleTable::new();
    table
        .insert("small".into(), vec![MatchAny; INLINE_LIMIT])
        .unwrap();
    table
        .insert("big".into(), vec![MatchAny; INLINE_LIMIT + 1])
        .unwrap();

    let rule = Rule::new("both", Pattern::seq(Pattern::rule("small"), Pattern::rule("big")));
    let code = compile_rule(&rule, &table).unwrap();
    assert_eq!(code.len(), INLINE_LIMIT + 2);
    assert_eq!(code[0], Comment("inline small".into()));
    assert_eq!(
        code.last(),
        Some(&Call {
            rule: "big".into(),
            addr: UNLINKED
        })
    );

    // Each rule is twice the one before it.
    let mut rules = vec![Rule::new("r0", Pattern::Char('a'))];
    for n in 1..=20 {
        let prev = format!("r{}", n - 1);
        rules.push(Rule::new(
            format!("r{}", n),
            Pattern::seq(Pattern::rule(prev.clone()), Pattern::rule(prev)),
        ));
    }
    let grammar = Grammar::new(rules);
    let program = grammar.compile("r20").unwrap();
    assert!(program.len() < 21 * (2 * INLINE_LIMIT + 4), "{}", program.len());

    let program = grammar.compile("r12").unwrap();
    let subject = "a".repeat(1 << 12);
    assert_eq!(program.match_(&subject), Some(subject.len()));
    assert_eq!(program.match_(&subject[1..]), None);
}
