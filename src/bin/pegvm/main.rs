use std::{fs, path::PathBuf};

use anyhow::{bail, Context};
use pegvm::{MatchConfig, MatchError, Program};

mod repl;

const HELP: &str = "\
usage: pegvm GRAMMAR [SUBJECT ...] [--start NAME] [--steps N] [--profile] [--full] [--repl]

Matches each SUBJECT against the grammar in the file GRAMMAR.
With no subjects (or with --repl), matches lines typed in instead.

  --start NAME   start from this rule instead of the first one
  --steps N      give up after executing N instructions
  --profile      print what the machine executed after each match
  --full         only count it as a match if the whole subject is consumed
  --repl         ask for more subjects afterwards
";

struct Options {
    grammar: PathBuf,
    subjects: Vec<String>,
    start: Option<String>,
    steps: Option<u64>,
    profile: bool,
    full: bool,
    repl: bool,
}

impl Options {
    fn from_env() -> Result<Option<Options>, pico_args::Error> {
        let mut args = pico_args::Arguments::from_env();
        if args.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let start = args.opt_value_from_str("--start")?;
        let steps = args.opt_value_from_str("--steps")?;
        let profile = args.contains("--profile");
        let full = args.contains("--full");
        let repl = args.contains("--repl");

        let grammar = args.free_from_str()?;
        let mut subjects = Vec::new();
        while let Some(subject) = args.opt_free_from_str()? {
            subjects.push(subject);
        }

        Ok(Some(Options {
            grammar,
            subjects,
            start,
            steps,
            profile,
            full,
            repl,
        }))
    }

    fn config(&self) -> MatchConfig {
        MatchConfig {
            step_limit: self.steps,
            profile: self.profile,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = match Options::from_env().context("bad arguments (try --help)")? {
        Some(opts) => opts,
        None => {
            print!("{}", HELP);
            return Ok(());
        }
    };

    let source = fs::read_to_string(&opts.grammar)
        .with_context(|| format!("couldn't read {}", opts.grammar.display()))?;
    let name = opts.grammar.to_string_lossy().into_owned();

    let grammar = match pegvm::parse(&source, name.clone()) {
        Ok(grammar) => grammar,
        Err(ono) => {
            ono.report()
                .eprint(ariadne::sources(std::iter::once((name.clone(), &source))))?;
            bail!("couldn't read the grammar in {}", name);
        }
    };

    let start = match &opts.start {
        Some(start) => start.as_str(),
        None => grammar
            .start_rule()
            .with_context(|| format!("{} doesn't define any rules", name))?,
    };
    let program = grammar
        .compile(start)
        .with_context(|| format!("couldn't compile {}", name))?;

    let config = opts.config();
    for subject in &opts.subjects {
        show_match(&program, subject, &config, opts.full)
            .with_context(|| format!("while matching {:?}", subject))?;
    }

    if opts.repl || opts.subjects.is_empty() {
        repl::repl(&grammar, &program, &config, opts.full)?;
    }

    Ok(())
}

/// Match and print how it went.
fn show_match(
    program: &Program,
    subject: &str,
    config: &MatchConfig,
    full: bool,
) -> Result<(), MatchError> {
    let outcome = program.match_with(subject, config)?;
    match outcome.end {
        Some(end) if !full || end == subject.len() => {
            println!("{:?} matched {:?}, up to {}", subject, &subject[..end], end)
        }
        Some(end) => println!(
            "{:?}: no match (only got as far as {}, {:?})",
            subject,
            end,
            &subject[..end]
        ),
        None => println!("{:?}: no match", subject),
    }
    if let Some(profile) = &outcome.profile {
        print!("{}", profile);
    }
    Ok(())
}
