//! Write patterns back out in grammar syntax.
//!
//! Reading what this writes should give back the same tree: parens get put in wherever the
//! tree's shape disagrees with the operator precedence.

use std::fmt::{self, Display, Write};

use crate::pattern::{ClassItem, Grammar, Pattern, Rule};

/// How tightly each kind of pattern binds. Higher is tighter.
fn precedence(pattern: &Pattern) -> u8 {
    match pattern {
        Pattern::Choice(..) => 0,
        Pattern::Sequence(..) => 1,
        Pattern::Not(_) | Pattern::Optional(_) | Pattern::ZeroOrMore(_) | Pattern::OneOrMore(_) => {
            2
        }
        Pattern::Repeat { .. } => 3,
        _ => 4,
    }
}

fn write_pattern<W: Write>(w: &mut W, pattern: &Pattern, min_prec: u8) -> fmt::Result {
    if precedence(pattern) < min_prec {
        write!(w, "(")?;
        write_pattern(w, pattern, 0)?;
        return write!(w, ")");
    }

    match pattern {
        // Both are left-associative, so the right side has to bind tighter.
        Pattern::Choice(a, b) => {
            write_pattern(w, a, 0)?;
            write!(w, " | ")?;
            write_pattern(w, b, 1)
        }
        Pattern::Sequence(a, b) => {
            write_pattern(w, a, 1)?;
            write!(w, " * ")?;
            write_pattern(w, b, 2)
        }
        Pattern::Not(p) | Pattern::Optional(p) | Pattern::ZeroOrMore(p) | Pattern::OneOrMore(p) => {
            let op = match pattern {
                Pattern::Not(_) => '-',
                Pattern::Optional(_) => '?',
                Pattern::ZeroOrMore(_) => '*',
                _ => '+',
            };
            write!(w, "{}", op)?;
            write_pattern(w, p, 2)
        }
        Pattern::Repeat { pattern, min, max } => {
            write_pattern(w, pattern, 4)?;
            if min == max {
                write!(w, "{{{}}}", min)
            } else {
                write!(w, "{{{}..{}}}", min, max)
            }
        }
        Pattern::Group(p) => {
            write!(w, "(")?;
            write_pattern(w, p, 0)?;
            write!(w, ")")
        }
        Pattern::Char(c) => write!(w, "'{}'", LitFmt(c.to_string(), '\'')),
        Pattern::Literal(s) => write!(w, "\"{}\"", LitFmt(s, '"')),
        Pattern::LiteralCaseInsensitive(s) => write!(w, "i\"{}\"", LitFmt(s, '"')),
        Pattern::Any => write!(w, "."),
        Pattern::Class(items) if items.is_empty() => write!(w, "{{}}"),
        Pattern::Class(items) => {
            write!(w, "{{ ")?;
            for (idx, item) in items.iter().enumerate() {
                if idx != 0 {
                    write!(w, ", ")?;
                }
                match item {
                    ClassItem::Char(c) => write!(w, "'{}'", LitFmt(c.to_string(), '\''))?,
                    ClassItem::Range(lo, hi) => write!(
                        w,
                        "'{}'..'{}'",
                        LitFmt(lo.to_string(), '\''),
                        LitFmt(hi.to_string(), '\'')
                    )?,
                }
            }
            write!(w, " }}")
        }
        Pattern::Rule(name) => write!(w, "{}", name),
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_pattern(f, self, 0)
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.name, self.pattern)
    }
}

impl Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            writeln!(f, "{}", rule)?;
        }
        Ok(())
    }
}

/// The inside of a literal, escaped. The second field is the quote that needs escaping.
pub struct LitFmt<S: AsRef<str>>(pub S, pub char);

impl<S: AsRef<str>> Display for LitFmt<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.as_ref().chars() {
            match c {
                '\t' => write!(f, "\\t")?,
                '\r' => write!(f, "\\r")?,
                '\n' => write!(f, "\\n")?,
                '\0' => write!(f, "\\0")?,
                '\\' => write!(f, "\\\\")?,
                c if c == self.1 => write!(f, "\\{}", c)?,
                c => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

#[test]
fn writes_precedence() {
    let p = Pattern::seq(
        Pattern::star(Pattern::or(Pattern::Char('a'), Pattern::Any)),
        Pattern::or(Pattern::literal("b"), Pattern::rule("c")),
    );
    assert_eq!(p.to_string(), "*('a' | .) * (\"b\" | c)");

    let p = Pattern::or(
        Pattern::Char('x'),
        Pattern::or(Pattern::Char('y'), Pattern::Char('z')),
    );
    assert_eq!(p.to_string(), "'x' | ('y' | 'z')");

    let p = Pattern::repeat(Pattern::not(Pattern::Any), 1, 3);
    assert_eq!(p.to_string(), "(-.){1..3}");
    let p = Pattern::not(Pattern::repeat(Pattern::Any, 2, 2));
    assert_eq!(p.to_string(), "-.{2}");
}

#[test]
fn writes_atoms() {
    let p = Pattern::seq_all(vec![
        Pattern::Char('\''),
        Pattern::literal("say \"hi\"\n"),
        Pattern::literal_ci("yes"),
        Pattern::class(vec![]),
        Pattern::class(vec![ClassItem::Char('_'), ClassItem::Range('a', 'z')]),
    ])
    .unwrap();
    assert_eq!(
        p.to_string(),
        r#"'\'' * "say \"hi\"\n" * i"yes" * {} * { '_', 'a'..'z' }"#
    );

    let rule = Rule::new("digit", Pattern::range('0', '9'));
    assert_eq!(rule.to_string(), "digit <- { '0'..'9' }");
}
