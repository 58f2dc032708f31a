//! Runs every `.peg` file under `tests/`.
//!
//! Each file is a grammar whose comments say what it should do:
//!
//! ```text
//! #! start number       (optional: start somewhere other than the first rule)
//! #= "12ab" 2           (matches the first 2 bytes)
//! #= "ab" fail          (doesn't match)
//! ```
//!
//! Subjects are written the same way as string literals in grammars.

use std::{ffi::OsString, fs, path::PathBuf};

use pegvm::{parse_pattern, Pattern, Program};

#[derive(Debug)]
struct Expectation {
    line: usize,
    subject: String,
    end: Option<usize>,
}

fn expectations(name: &str, source: &str) -> (Option<String>, Vec<Expectation>) {
    let mut start = None;
    let mut out = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        if let Some(rule) = line.strip_prefix("#! start ") {
            start = Some(rule.trim().to_owned());
        } else if let Some(rest) = line.strip_prefix("#= ") {
            let rest = rest.trim_end();
            let split = rest
                .rfind(' ')
                .unwrap_or_else(|| panic!("{}:{}: expected a subject and a result", name, line_no));
            let (quoted, result) = (&rest[..split], &rest[split + 1..]);

            let subject = match parse_pattern(quoted, format!("{}:{}", name, line_no)) {
                Ok(Pattern::Literal(subject)) => subject,
                other => panic!("{}:{}: bad subject {:?}", name, line_no, other),
            };
            let end = match result {
                "fail" => None,
                n => Some(n.parse().unwrap_or_else(|_| {
                    panic!("{}:{}: expected a byte offset or `fail`, found {:?}", name, line_no, n)
                })),
            };
            out.push(Expectation {
                line: line_no,
                subject,
                end,
            });
        }
    }

    (start, out)
}

fn compile(name: &str, source: &str, start: Option<&str>) -> Program {
    match pegvm::compile(source, name.to_owned(), start) {
        Ok(program) => program,
        Err(pegvm::Error::Parse(e)) => {
            e.report()
                .eprint(ariadne::sources(std::iter::once((name.to_owned(), source))))
                .unwrap();
            panic!("{} didn't parse", name);
        }
        Err(e) => panic!("{} didn't compile: {}", name, e),
    }
}

#[test]
fn suite() {
    let root = concat!(env!("CARGO_MANIFEST_DIR"), "/tests");

    let mut paths = Vec::new();

    let mut todo = vec![PathBuf::from(root)];
    while let Some(path) = todo.pop() {
        if path.is_dir() {
            for entry in fs::read_dir(path).unwrap() {
                let entry = entry.unwrap();
                let path = entry.path();
                todo.push(path)
            }
        } else if path.extension() == Some(&OsString::from("peg")) {
            paths.push(path);
        }
    }

    paths.sort_unstable();
    assert!(!paths.is_empty(), "no grammars found under {}", root);

    let mut failures = Vec::new();
    for path in paths {
        let name = path.to_string_lossy().into_owned();
        let source = fs::read_to_string(&name).unwrap();

        let (start, expected) = expectations(&name, &source);
        assert!(!expected.is_empty(), "{} doesn't expect anything", name);
        let program = compile(&name, &source, start.as_deref());

        for exp in expected {
            let got = program.match_(&exp.subject);
            if got != exp.end {
                failures.push(format!(
                    "{}:{}: {:?} should give {:?} but gave {:?}",
                    name, exp.line, exp.subject, exp.end, got
                ));
            }
        }
    }

    if !failures.is_empty() {
        panic!("{} failures:\n{}", failures.len(), failures.join("\n"));
    }
}
