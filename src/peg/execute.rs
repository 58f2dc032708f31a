use thiserror::Error;

use super::{Instruction, Profile, Program};

/// Knobs for one run of the machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchConfig {
    /// Give up after executing this many instructions.
    pub step_limit: Option<u64>,
    /// Count what gets executed.
    pub profile: bool,
}

/// How a run went.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// `Some(end)` if the start rule matched `subject[..end]`.
    pub end: Option<usize>,
    /// Instructions executed.
    pub steps: u64,
    pub profile: Option<Profile>,
}

impl Outcome {
    pub fn is_match(&self) -> bool {
        self.end.is_some()
    }
}

/// Not matching isn't an error; this is for when the machine didn't get to an answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("gave up after {limit} steps without an answer")]
    StepLimit { limit: u64 },
}

impl Program {
    /// Run the program against the subject.
    ///
    /// Returns the end of the matched prefix, or `None` if it doesn't match.
    pub fn match_(&self, subject: &str) -> Option<usize> {
        // There's no step limit, so this can't error.
        self.match_with(subject, &MatchConfig::default())
            .ok()
            .and_then(|outcome| outcome.end)
    }

    /// Does the program match the *whole* subject?
    pub fn matches_all(&self, subject: &str) -> bool {
        self.match_(subject) == Some(subject.len())
    }

    pub fn match_with(&self, subject: &str, config: &MatchConfig) -> Result<Outcome, MatchError> {
        let mut executor = Executor {
            program: self,
            subject,
            pc: 0,
            position: 0,
            stack: Vec::new(),
            steps: 0,
            step_limit: config.step_limit,
            profile: if config.profile {
                Some(Profile::new())
            } else {
                None
            },
        };
        let end = executor.run()?;
        Ok(Outcome {
            end,
            steps: executor.steps,
            profile: executor.profile,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// Where to go back to when the called rule returns.
    Return { resume: usize },
    /// A choice point: where to go and where to rewind the subject to if something fails.
    Backtrack { resume: usize, position: usize },
}

struct Executor<'code, 'text> {
    program: &'code Program,
    subject: &'text str,

    pc: usize,
    /// Byte offset into the subject.
    position: usize,
    stack: Vec<Frame>,

    steps: u64,
    step_limit: Option<u64>,
    profile: Option<Profile>,
}

impl Executor<'_, '_> {
    fn run(&mut self) -> Result<Option<usize>, MatchError> {
        let program = self.program;
        let code = program.instructions();
        loop {
            if let Some(limit) = self.step_limit {
                if self.steps >= limit {
                    return Err(MatchError::StepLimit { limit });
                }
            }
            self.steps += 1;

            let instr = &code[self.pc];
            log::trace!(
                "{:>4} {:<40} at {} (depth {})",
                self.pc,
                format!("{:?}", instr),
                self.position,
                self.stack.len()
            );
            if let Some(profile) = &mut self.profile {
                profile.record(instr, program);
            }

            match instr {
                Instruction::Choice(offset) => {
                    self.stack.push(Frame::Backtrack {
                        resume: jump(self.pc, *offset),
                        position: self.position,
                    });
                    self.pc += 1;
                }
                &Instruction::Commit(offset) => self.commit(offset),
                &Instruction::Call { addr, .. } => {
                    self.stack.push(Frame::Return {
                        resume: self.pc + 1,
                    });
                    self.pc = addr;
                }
                Instruction::Return => match self.stack.pop() {
                    // Returned out of the start rule. Hooray!
                    None => return Ok(Some(self.position)),
                    Some(Frame::Return { resume }) => self.pc = resume,
                    Some(frame @ Frame::Backtrack { .. }) => unreachable!(
                        "returned at {} with the choice point {:?} still on the stack",
                        self.pc, frame
                    ),
                },
                Instruction::Fail => {
                    if !self.backtrack() {
                        return Ok(None);
                    }
                }
                Instruction::Comment(_) => self.pc += 1,
                Instruction::MatchAny
                | Instruction::MatchSet(_)
                | Instruction::MatchString(_)
                | Instruction::MatchStringCaseInsensitive(_) => {
                    if self.try_match(instr) {
                        self.pc += 1;
                    } else if !self.backtrack() {
                        return Ok(None);
                    }
                }
            }

            if let Some(profile) = &mut self.profile {
                profile.note_depth(self.stack.len());
            }
        }
    }

    /// Try to match one of the matching instructions at the current position,
    /// and move past what it matched.
    fn try_match(&mut self, instr: &Instruction) -> bool {
        let rest = &self.subject[self.position..];
        let len = match instr {
            Instruction::MatchAny => rest.chars().next().map(char::len_utf8),
            Instruction::MatchSet(set) => rest
                .chars()
                .next()
                .filter(|&c| set.contains(c))
                .map(char::len_utf8),
            Instruction::MatchString(lit) => {
                if rest.starts_with(lit.as_str()) {
                    Some(lit.len())
                } else {
                    None
                }
            }
            Instruction::MatchStringCaseInsensitive(lit) => {
                // ASCII folding never changes byte lengths, so this lines up with the literal,
                // and anything that compares equal ends on a char boundary.
                match rest.as_bytes().get(..lit.len()) {
                    Some(prefix) if prefix.eq_ignore_ascii_case(lit.as_bytes()) => Some(lit.len()),
                    _ => None,
                }
            }
            _ => unreachable!("{:?} is not a matching instruction", instr),
        };
        match len {
            Some(len) => {
                self.position += len;
                true
            }
            None => false,
        }
    }

    fn commit(&mut self, offset: isize) {
        let target = jump(self.pc, offset);
        let frame = self.stack.pop();
        debug_assert!(
            matches!(frame, Some(Frame::Backtrack { .. })),
            "commit at {} popped {:?}",
            self.pc,
            frame
        );

        // Going backwards means this is the end of a `*P` iteration.
        // If it didn't eat anything it never will, so leave the loop instead of going round forever.
        if offset < 0 {
            if let Some(Frame::Backtrack { position, .. }) = frame {
                if position == self.position {
                    if let Instruction::Choice(exit) = self.program.instructions()[target] {
                        log::debug!(
                            "loop at {} went round without consuming anything at {}; leaving it",
                            target,
                            self.position
                        );
                        self.pc = jump(target, exit);
                        return;
                    }
                }
            }
        }

        self.pc = target;
    }

    /// Unwind to the nearest choice point, skipping over any rule calls in the way.
    /// Returns false if there wasn't one, meaning the whole match failed.
    fn backtrack(&mut self) -> bool {
        while let Some(frame) = self.stack.pop() {
            if let Frame::Backtrack { resume, position } = frame {
                self.pc = resume;
                self.position = position;
                return true;
            }
        }
        false
    }
}

/// Apply a relative jump. Two's complement makes the wrapping add do the right thing
/// for negative offsets.
fn jump(pc: usize, offset: isize) -> usize {
    pc.wrapping_add(offset as usize)
}

#[cfg(test)]
fn program(rules: Vec<crate::Rule>) -> Program {
    let grammar = crate::Grammar::new(rules);
    let start = grammar.start_rule().unwrap().to_owned();
    grammar.compile(&start).unwrap()
}

#[test]
fn literals() {
    use crate::{Pattern, Rule};

    let p = program(vec![Rule::new("main", Pattern::literal("abc"))]);
    assert_eq!(p.match_("abcxyz"), Some(3));
    assert_eq!(p.match_("abx"), None);
    assert_eq!(p.match_("ab"), None);

    let p = program(vec![Rule::new("main", Pattern::literal_ci("SeLeCt"))]);
    assert_eq!(p.match_("select *"), Some(6));
    assert_eq!(p.match_("SELECT"), Some(6));
    assert_eq!(p.match_("SELEC"), None);
    assert_eq!(p.match_("sélect"), None);
}

#[test]
fn chars_not_bytes() {
    use crate::{Pattern, Rule};

    let p = program(vec![Rule::new(
        "main",
        Pattern::seq(Pattern::Any, Pattern::range('α', 'ω')),
    )]);
    assert_eq!(p.match_("éλ"), Some("éλ".len()));
    assert_eq!(p.match_("éz"), None);
    assert_eq!(p.match_(""), None);
}

#[test]
fn calls_unwind_on_failure() {
    use crate::{Pattern, Rule};

    // The failing alternative gets two calls deep before failing;
    // the unwinding has to step over both return frames to get to the choice point.
    let p = program(vec![
        Rule::new(
            "main",
            Pattern::or(
                Pattern::seq(Pattern::rule("outer"), Pattern::Char('!')),
                Pattern::literal("ab?"),
            ),
        ),
        Rule::new("outer", Pattern::seq(Pattern::Char('a'), Pattern::rule("inner"))),
        Rule::new("inner", Pattern::seq(Pattern::Char('b'), Pattern::Char('c'))),
    ]);
    assert_eq!(p.match_("abc!"), Some(4));
    assert_eq!(p.match_("ab?"), Some(3));
    assert_eq!(p.match_("abc?"), None);
}

#[test]
fn zero_width_loops_end() {
    use crate::{Pattern, Rule};

    let p = program(vec![Rule::new(
        "main",
        Pattern::seq(
            Pattern::star(Pattern::opt(Pattern::Char('a'))),
            Pattern::Char('b'),
        ),
    )]);
    assert_eq!(p.match_("aaab"), Some(4));
    assert_eq!(p.match_("b"), Some(1));
    assert_eq!(p.match_("c"), None);

    let p = program(vec![Rule::new(
        "main",
        Pattern::plus(Pattern::not(Pattern::Char('x'))),
    )]);
    assert_eq!(p.match_("abc"), Some(0));
    assert_eq!(p.match_("xyz"), None);
}

#[test]
fn step_limit() {
    use crate::{Pattern, Rule};

    let p = program(vec![Rule::new("main", Pattern::star(Pattern::Any))]);
    let subject = "a".repeat(100);

    let config = MatchConfig {
        step_limit: Some(10),
        profile: false,
    };
    assert_eq!(
        p.match_with(&subject, &config).unwrap_err(),
        MatchError::StepLimit { limit: 10 }
    );

    let outcome = p.match_with(&subject, &MatchConfig::default()).unwrap();
    assert_eq!(outcome.end, Some(100));
    // 100 times round (choice, any, commit), then a choice and an any that fails, then the return.
    assert_eq!(outcome.steps, 303);
    assert!(outcome.profile.is_none());
}
