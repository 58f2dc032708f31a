//! Reading grammars from text.
//!
//! ```text
//! # comments run to the end of the line
//! expr   <- term * *(ws * { '+', '-' } * term)
//! digit  <- { '0'..'9' }
//! ```
//!
//! Atoms are `'c'`, `"text"`, `i"text"` (case-insensitive), `.` (any char), classes like
//! `{ 'a'..'z', '_' }`, `(groups)` and rule names. Prefix `-` `?` `*` `+` bind tighter than
//! infix `*` (sequence) which binds tighter than `|` (ordered choice). `P{n}` and `P{m..n}`
//! (or `P{m,n}`) bind tightest of all.

use std::{fmt::Debug, ops::Range};

use ariadne::{CharSet, Label, Report, ReportKind};
use thiserror::Error;

use crate::pattern::{ClassItem, Grammar, Pattern, Rule};

/// Error when reading a grammar.
#[derive(Error)]
#[error("{info}")]
pub struct GrammarParseError {
    info: GrammarParseErrorInfo,
    /// Byte range of the offending text.
    span: Range<usize>,
    report: Report<(String, Range<usize>)>,
}

impl GrammarParseError {
    fn new(s: &str, source: String, err: GrammarParseErrorLimited) -> GrammarParseError {
        // ariadne counts in chars
        let chars = char_span(s, err.span.clone());

        let mut report = Report::build(ReportKind::Error, source.clone(), chars.start)
            .with_config(ariadne::Config::default().with_char_set(CharSet::Ascii))
            .with_message(err.info.to_string());

        let all = (source, chars);

        match &err.info {
            GrammarParseErrorInfo::UnknownOperator(c) => {
                report = report
                    .with_label(
                        Label::new(all).with_message(format!("{:?} doesn't mean anything here", c)),
                    )
                    .with_note("patterns are joined with `*` or `|`, prefixed with `-` `?` `*` `+`, and repeated with `{n}` or `{m..n}`");
            }
            GrammarParseErrorInfo::UnexpectedChar(_) => {
                report = report.with_label(Label::new(all).with_message("this is unintelligible"));
            }
            GrammarParseErrorInfo::ExpectedCloseQuote { quote } => {
                report = report
                    .with_label(Label::new(all).with_message(format!(
                        "this {:?} expects a {:?} to close it on the same line",
                        quote, quote
                    )))
                    .with_note(format!("try putting a {:?} at the end", quote));
            }
            GrammarParseErrorInfo::InvalidEscape(problem) => {
                report = report
                    .with_label(Label::new(all).with_message(problem.to_string()))
                    .with_note(r#"the escapes are \n \t \r \0 \\ \' and \""#);
            }
            GrammarParseErrorInfo::BadCharLiteral => {
                report = report
                    .with_label(Label::new(all).with_message("this isn't exactly one character"))
                    .with_note("use double quotes for strings");
            }
            GrammarParseErrorInfo::MalformedClass(why) => {
                report = report
                    .with_label(Label::new(all).with_message(why))
                    .with_note("a class looks like { 'x', 'a'..'z' }");
            }
            GrammarParseErrorInfo::BadRepetition => {
                report = report
                    .with_label(Label::new(all).with_message("this should be a count"))
                    .with_note("write {n} for exactly n, or {m..n} for between m and n");
            }
            GrammarParseErrorInfo::ExpectedCloseParen => {
                report = report
                    .with_label(
                        Label::new(all)
                            .with_message("this '(' expects a ')' to close it, but there wasn't one"),
                    )
                    .with_note("try putting a ')' at the end");
            }
            GrammarParseErrorInfo::ExpectedExpression => {
                report = report.with_label(Label::new(all).with_message("a pattern should go here"));
            }
            GrammarParseErrorInfo::ExpectedArrow(name) => {
                report = report
                    .with_label(
                        Label::new(all).with_message(format!("`{}` is followed by something other than `<-`", name)),
                    )
                    .with_note("if this was meant to be part of the rule above, join it on with `*`");
            }
            GrammarParseErrorInfo::ExpectedRule => {
                report = report
                    .with_label(Label::new(all).with_message("this isn't the start of a rule"))
                    .with_note("if this was meant to be part of the rule above, join it on with `*`");
            }
            GrammarParseErrorInfo::InvalidRemainder => {
                report = report
                    .with_label(
                        Label::new(all)
                            .with_message("this was left over after reading a well-formed pattern"),
                    )
                    .with_note("try deleting this, or joining it on with `*` or `|`");
            }
            GrammarParseErrorInfo::TooDeep => {
                report = report
                    .with_label(Label::new(all).with_message("this is one level too many"))
                    .with_note("try pulling the inner part out into a rule of its own");
            }
        }

        GrammarParseError {
            report: report.finish(),
            info: err.info,
            span: err.span,
        }
    }

    pub fn report(&self) -> &Report<(String, Range<usize>)> {
        &self.report
    }

    pub fn info(&self) -> &GrammarParseErrorInfo {
        &self.info
    }

    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }
}

impl Debug for GrammarParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GrammarParseError")
            .field(&self.info)
            .field(&self.span)
            .finish()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarParseErrorInfo {
    #[error("{0:?} is not a grammar operator")]
    UnknownOperator(char),
    #[error("could not figure out what {0:?} was meant to be")]
    UnexpectedChar(char),
    #[error("expected a closing {quote:?}")]
    ExpectedCloseQuote { quote: char },
    #[error("bad escape sequence")]
    InvalidEscape(InvalidEscape),
    #[error("a character literal needs exactly one character")]
    BadCharLiteral,
    #[error("malformed character class")]
    MalformedClass(&'static str),
    #[error("malformed repetition")]
    BadRepetition,
    #[error("expected a closing ')' to this group")]
    ExpectedCloseParen,
    #[error("expected a pattern but found nothing")]
    ExpectedExpression,
    #[error("expected `<-` after the rule name `{0}`")]
    ExpectedArrow(String),
    #[error("expected a rule definition")]
    ExpectedRule,
    #[error("after reading one pattern, there was leftover")]
    InvalidRemainder,
    #[error("patterns nest more than {} deep here", MAX_DEPTH)]
    TooDeep,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidEscape {
    #[error("{0:?} cannot be escaped")]
    BadChar(char),
    #[error("cannot escape the end of file")]
    Eof,
}

struct GrammarParseErrorLimited {
    info: GrammarParseErrorInfo,
    span: Range<usize>,
}

type ParseResult<T> = Result<T, GrammarParseErrorLimited>;

/// A pattern along with the height of its tree.
type Measured = (Pattern, usize);

/// How deeply patterns may nest, counting every node from a rule's root down to its deepest leaf.
///
/// Everything downstream of the reader walks the tree recursively, so this bounds their stacks too.
pub const MAX_DEPTH: usize = 1000;

/// Read a whole grammar: any number of `name <- pattern` definitions.
pub fn parse(s: &str, source: String) -> Result<Grammar, GrammarParseError> {
    let mut parser = Parser {
        src: s,
        pos: 0,
        depth: 0,
    };
    parser
        .grammar()
        .map_err(|err| GrammarParseError::new(s, source, err))
}

/// Read exactly one pattern, with nothing after it.
pub fn parse_pattern(s: &str, source: String) -> Result<Pattern, GrammarParseError> {
    let mut parser = Parser {
        src: s,
        pos: 0,
        depth: 0,
    };
    let res = parser.choice().and_then(|(pattern, _)| {
        parser.skip_trivia();
        if parser.pos == s.len() {
            Ok(pattern)
        } else {
            Err(parser.unexpected(GrammarParseErrorInfo::InvalidRemainder))
        }
    });
    res.map_err(|err| GrammarParseError::new(s, source, err))
}

struct Parser<'a> {
    src: &'a str,
    /// Byte offset
    pos: usize,
    /// How many groups and prefix operators we're inside of.
    depth: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// The span of the next char (or an empty one at the end).
    fn here(&self) -> Range<usize> {
        self.pos..self.pos + self.peek().map_or(0, char::len_utf8)
    }

    fn error<T>(&self, info: GrammarParseErrorInfo, span: Range<usize>) -> ParseResult<T> {
        Err(GrammarParseErrorLimited { info, span })
    }

    /// Complain about the next char. Stray operators get a better message than `fallback`.
    fn unexpected(&self, fallback: GrammarParseErrorInfo) -> GrammarParseErrorLimited {
        let info = match self.peek() {
            Some(c) if is_unknown_operator(c) => GrammarParseErrorInfo::UnknownOperator(c),
            _ => fallback,
        };
        GrammarParseErrorLimited {
            info,
            span: self.here(),
        }
    }

    /// Go one group or prefix operator further in.
    fn descend(&mut self, at: Range<usize>) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return self.error(GrammarParseErrorInfo::TooDeep, at);
        }
        Ok(())
    }

    /// The height of a node over a child this tall.
    fn taller(&self, height: usize, at: Range<usize>) -> ParseResult<usize> {
        if height >= MAX_DEPTH {
            return self.error(GrammarParseErrorInfo::TooDeep, at);
        }
        Ok(height + 1)
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with('#') {
                self.pos += trimmed.find('\n').unwrap_or_else(|| trimmed.len());
            } else {
                return;
            }
        }
    }

    fn grammar(&mut self) -> ParseResult<Grammar> {
        let mut rules = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek().is_none() {
                return Ok(Grammar::new(rules));
            }
            rules.push(self.rule()?);
        }
    }

    fn rule(&mut self) -> ParseResult<Rule> {
        let start = self.pos;
        let name = match self.ident() {
            Some(name) => name,
            None => return Err(self.unexpected(GrammarParseErrorInfo::ExpectedRule)),
        };
        let name_end = self.pos;

        self.skip_trivia();
        if !self.rest().starts_with("<-") {
            return self.error(
                GrammarParseErrorInfo::ExpectedArrow(name.to_owned()),
                start..name_end,
            );
        }
        self.pos += 2;

        let (pattern, _) = self.choice()?;
        Ok(Rule::new(name, pattern))
    }

    fn choice(&mut self) -> ParseResult<Measured> {
        let (mut lhs, mut height) = self.sequence()?;
        loop {
            self.skip_trivia();
            if self.peek() == Some('|') {
                let op = self.here();
                self.pos += 1;
                let (rhs, rhs_height) = self.sequence()?;
                height = self.taller(height.max(rhs_height), op)?;
                lhs = Pattern::or(lhs, rhs);
            } else {
                return Ok((lhs, height));
            }
        }
    }

    fn sequence(&mut self) -> ParseResult<Measured> {
        let (mut lhs, mut height) = self.prefix()?;
        loop {
            self.skip_trivia();
            if self.peek() == Some('*') {
                let op = self.here();
                self.pos += 1;
                let (rhs, rhs_height) = self.prefix()?;
                height = self.taller(height.max(rhs_height), op)?;
                lhs = Pattern::seq(lhs, rhs);
            } else {
                return Ok((lhs, height));
            }
        }
    }

    fn prefix(&mut self) -> ParseResult<Measured> {
        self.skip_trivia();
        let op = match self.peek() {
            Some(c @ '-') | Some(c @ '?') | Some(c @ '*') | Some(c @ '+') => c,
            _ => return self.postfix(),
        };
        let at = self.here();
        self.descend(at.clone())?;
        self.pos += 1;
        let (inner, height) = self.prefix()?;
        self.depth -= 1;

        let height = self.taller(height, at)?;
        let pattern = match op {
            '-' => Pattern::not(inner),
            '?' => Pattern::opt(inner),
            '*' => Pattern::star(inner),
            _ => Pattern::plus(inner),
        };
        Ok((pattern, height))
    }

    fn postfix(&mut self) -> ParseResult<Measured> {
        let (mut pattern, mut height) = self.primary()?;
        loop {
            self.skip_trivia();
            if self.peek() != Some('{') {
                return Ok((pattern, height));
            }
            let open = self.pos;
            self.pos += 1;

            let min = self.count(open)?;
            self.skip_trivia();
            let max = if self.rest().starts_with("..") {
                self.pos += 2;
                self.count(open)?
            } else if self.peek() == Some(',') {
                self.pos += 1;
                self.count(open)?
            } else {
                min
            };

            self.skip_trivia();
            if self.peek() != Some('}') {
                return self.error(GrammarParseErrorInfo::BadRepetition, open..self.here().end);
            }
            self.pos += 1;
            height = self.taller(height, open..self.pos)?;
            pattern = Pattern::repeat(pattern, min, max);
        }
    }

    /// A decimal number inside a repetition that opened at `open`.
    fn count(&mut self, open: usize) -> ParseResult<usize> {
        self.skip_trivia();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or_else(|| rest.len());
        match rest[..len].parse() {
            Ok(n) => {
                self.pos += len;
                Ok(n)
            }
            Err(_) => {
                let end = if len > 0 {
                    self.pos + len
                } else {
                    self.here().end
                };
                self.error(GrammarParseErrorInfo::BadRepetition, open..end)
            }
        }
    }

    fn primary(&mut self) -> ParseResult<Measured> {
        self.skip_trivia();
        let start = self.pos;
        if self.peek() == Some('(') {
            self.descend(start..start + 1)?;
            self.pos += 1;
            let (inner, height) = self.choice()?;
            self.depth -= 1;

            self.skip_trivia();
            if self.peek() != Some(')') {
                return self.error(GrammarParseErrorInfo::ExpectedCloseParen, start..start + 1);
            }
            self.pos += 1;
            let height = self.taller(height, start..start + 1)?;
            return Ok((Pattern::group(inner), height));
        }
        Ok((self.atom()?, 1))
    }

    /// Anything that isn't made of other patterns.
    fn atom(&mut self) -> ParseResult<Pattern> {
        let start = self.pos;
        match self.peek() {
            None => self.error(GrammarParseErrorInfo::ExpectedExpression, start..start),
            Some('\'') => Ok(Pattern::Char(self.char_lit()?)),
            Some('"') => Ok(Pattern::Literal(self.quoted('"')?)),
            Some('i') if self.rest()[1..].starts_with('"') => {
                self.pos += 1;
                Ok(Pattern::LiteralCaseInsensitive(self.quoted('"')?))
            }
            Some('.') => {
                self.pos += 1;
                Ok(Pattern::Any)
            }
            Some('{') => self.class(),
            Some(c) if is_ident_start(c) => match self.ident() {
                Some(name) => Ok(Pattern::rule(name)),
                None => unreachable!("{:?} starts an identifier", c),
            },
            Some(')') | Some('|') | Some('}') => {
                self.error(GrammarParseErrorInfo::ExpectedExpression, self.here())
            }
            Some(c) if is_unknown_operator(c) => {
                self.error(GrammarParseErrorInfo::UnknownOperator(c), self.here())
            }
            Some(c) => self.error(GrammarParseErrorInfo::UnexpectedChar(c), self.here()),
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        if !rest.starts_with(is_ident_start) {
            return None;
        }
        let len = rest
            .find(|c: char| !is_ident_continue(c))
            .unwrap_or_else(|| rest.len());
        self.pos += len;
        Some(&rest[..len])
    }

    fn char_lit(&mut self) -> ParseResult<char> {
        let start = self.pos;
        let s = self.quoted('\'')?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => self.error(GrammarParseErrorInfo::BadCharLiteral, start..self.pos),
        }
    }

    /// Read a literal in these quotes, which must be next. Consumes the closing quote.
    fn quoted(&mut self, quote: char) -> ParseResult<String> {
        let start = self.pos;
        self.pos += quote.len_utf8();

        let mut accumulated = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.pos += c.len_utf8();
                    return Ok(accumulated);
                }
                Some('\\') => accumulated.push(self.escape()?),
                Some('\n') | None => {
                    return self.error(
                        GrammarParseErrorInfo::ExpectedCloseQuote { quote },
                        start..self.pos,
                    )
                }
                Some(c) => {
                    self.pos += c.len_utf8();
                    accumulated.push(c);
                }
            }
        }
    }

    /// Consume an escape sequence, backslash and all.
    fn escape(&mut self) -> ParseResult<char> {
        let start = self.pos;
        self.pos += 1;
        let escaped = match self.bump() {
            None => {
                return self.error(
                    GrammarParseErrorInfo::InvalidEscape(InvalidEscape::Eof),
                    start..self.pos,
                )
            }
            Some(c) => c,
        };
        Ok(match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' | '\'' | '"' => escaped,
            _ => {
                return self.error(
                    GrammarParseErrorInfo::InvalidEscape(InvalidEscape::BadChar(escaped)),
                    start..self.pos,
                )
            }
        })
    }

    fn class(&mut self) -> ParseResult<Pattern> {
        let start = self.pos;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(Pattern::Class(items));
                }
                Some('\'') => {
                    let lo = self.char_lit()?;
                    self.skip_trivia();
                    if self.rest().starts_with("..") {
                        self.pos += 2;
                        self.skip_trivia();
                        if self.peek() != Some('\'') {
                            return self.error(
                                GrammarParseErrorInfo::MalformedClass(
                                    "a range needs a character literal after the `..`",
                                ),
                                self.here(),
                            );
                        }
                        let hi = self.char_lit()?;
                        items.push(ClassItem::Range(lo, hi));
                    } else {
                        items.push(ClassItem::Char(lo));
                    }

                    self.skip_trivia();
                    match self.peek() {
                        Some(',') => self.pos += 1,
                        Some('}') => {}
                        None => {
                            return self.error(
                                GrammarParseErrorInfo::MalformedClass("this class is never closed"),
                                start..start + 1,
                            )
                        }
                        Some(_) => {
                            return self.error(
                                GrammarParseErrorInfo::MalformedClass("expected a `,` or `}` here"),
                                self.here(),
                            )
                        }
                    }
                }
                None => {
                    return self.error(
                        GrammarParseErrorInfo::MalformedClass("this class is never closed"),
                        start..start + 1,
                    )
                }
                Some(_) => {
                    return self.error(
                        GrammarParseErrorInfo::MalformedClass(
                            "classes only hold character literals and ranges",
                        ),
                        self.here(),
                    )
                }
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Things that look like they'd be operators in some other PEG syntax.
fn is_unknown_operator(c: char) -> bool {
    matches!(
        c,
        '/' | '&' | '!' | '~' | '^' | '%' | '$' | '@' | '=' | '<' | '>' | ';' | ':' | '[' | ']'
    )
}

/// Turn a byte range into a char range.
fn char_span(s: &str, bytes: Range<usize>) -> Range<usize> {
    let start = s[..bytes.start].chars().count();
    let len = s[bytes.start..bytes.end].chars().count();
    start..start + len
}

#[cfg(test)]
fn parse_err(s: &str) -> GrammarParseError {
    parse(s, "<test>".to_owned()).unwrap_err()
}

#[test]
fn precedence() {
    let read = |s: &str| parse_pattern(s, "<test>".to_owned()).unwrap();

    assert_eq!(
        read("'a' * 'b' | 'c'"),
        Pattern::or(
            Pattern::seq(Pattern::Char('a'), Pattern::Char('b')),
            Pattern::Char('c')
        )
    );
    assert_eq!(
        read("-{'0'..'9'} * ."),
        Pattern::seq(Pattern::not(Pattern::range('0', '9')), Pattern::Any)
    );
    assert_eq!(
        read("*'a' * 'b'"),
        Pattern::seq(Pattern::star(Pattern::Char('a')), Pattern::Char('b'))
    );
    assert_eq!(
        read("?'x' * 'y'"),
        Pattern::seq(Pattern::opt(Pattern::Char('x')), Pattern::Char('y'))
    );
    assert_eq!(
        read("*'a'{2}"),
        Pattern::star(Pattern::repeat(Pattern::Char('a'), 2, 2))
    );
    assert_eq!(read("'a'{1,3}"), read("'a'{1..3}"));
    assert_eq!(read("'a'{1..3}"), Pattern::repeat(Pattern::Char('a'), 1, 3));
    assert_eq!(
        read("('a' | 'b') * c"),
        Pattern::seq(
            Pattern::group(Pattern::or(Pattern::Char('a'), Pattern::Char('b'))),
            Pattern::rule("c")
        )
    );
}

#[test]
fn atoms() {
    let read = |s: &str| parse_pattern(s, "<test>".to_owned()).unwrap();

    assert_eq!(read(r#"i"Hello""#), Pattern::literal_ci("Hello"));
    // `i` on its own is just a rule
    assert_eq!(
        read(r#"if * "x""#),
        Pattern::seq(Pattern::rule("if"), Pattern::literal("x"))
    );
    assert_eq!(read(r"'\n'"), Pattern::Char('\n'));
    assert_eq!(read(r#""tab\there \"q\"""#), Pattern::literal("tab\there \"q\""));
    assert_eq!(read("{}"), Pattern::class(vec![]));
    assert_eq!(
        read("{ 'a'..'z', '_', }"),
        Pattern::class(vec![ClassItem::Range('a', 'z'), ClassItem::Char('_')])
    );
    assert_eq!(read("'λ'"), Pattern::Char('λ'));
}

#[test]
fn grammars() {
    let g = parse(
        "# a comment\n\
         number <- +digit   # trailing comment\n\
         digit <- { '0'..'9' }\n\
         list <- number\n\
         \t* *(',' * number)\n",
        "<test>".to_owned(),
    )
    .unwrap();
    assert_eq!(g.rules.len(), 3);
    assert_eq!(g.start_rule(), Some("number"));
    assert_eq!(
        g.get("list").unwrap().pattern,
        Pattern::seq(
            Pattern::rule("number"),
            Pattern::star(Pattern::group(Pattern::seq(
                Pattern::Char(','),
                Pattern::rule("number")
            )))
        )
    );
    assert_eq!(parse("  # nothing\n", "<test>".to_owned()).unwrap(), Grammar::default());

    // Writing a grammar out reads back the same.
    let again = parse(&g.to_string(), "<test>".to_owned()).unwrap();
    assert_eq!(again, g);
}

#[test]
fn errors() {
    use GrammarParseErrorInfo::*;

    let err = parse_err("a <- 'x' / 'y'");
    assert_eq!(err.info(), &UnknownOperator('/'));
    assert_eq!(err.span(), 9..10);

    assert_eq!(parse_err("a <- !'x'").info(), &UnknownOperator('!'));
    assert_eq!(parse_err("a <- 'ab'").info(), &BadCharLiteral);
    assert_eq!(parse_err("a <- ''").info(), &BadCharLiteral);
    assert_eq!(
        parse_err("a <- \"abc\nb <- 'x'").info(),
        &ExpectedCloseQuote { quote: '"' }
    );
    assert!(matches!(
        parse_err("a <- { 'a' 'b' }").info(),
        MalformedClass(_)
    ));
    assert!(matches!(parse_err("a <- { \"ab\" }").info(), MalformedClass(_)));
    assert!(matches!(parse_err("a <- { 'a'..}").info(), MalformedClass(_)));
    assert!(matches!(parse_err("a <- { 'a'").info(), MalformedClass(_)));
    assert_eq!(parse_err("a <- 'a'{x}").info(), &BadRepetition);
    assert_eq!(parse_err("a <- 'a'{1..}").info(), &BadRepetition);
    assert_eq!(parse_err("a <- 'a'{1 2}").info(), &BadRepetition);
    assert_eq!(parse_err("a <- ('a'").info(), &ExpectedCloseParen);
    assert_eq!(parse_err("a <-").info(), &ExpectedExpression);
    assert_eq!(parse_err("a <- 'x' | ").info(), &ExpectedExpression);
    assert_eq!(parse_err("a 'x'").info(), &ExpectedArrow("a".to_owned()));
    assert_eq!(parse_err("a <- 'x' 'y'").info(), &ExpectedRule);
    assert_eq!(
        parse_err(r"a <- '\q'").info(),
        &InvalidEscape(crate::parse::InvalidEscape::BadChar('q'))
    );
    assert_eq!(parse_err("a <- `").info(), &UnexpectedChar('`'));

    let err = parse_pattern("'a' 'b'", "<test>".to_owned()).unwrap_err();
    assert_eq!(err.info(), &InvalidRemainder);
    assert_eq!(err.span(), 4..5);
}

#[test]
fn char_spans() {
    assert_eq!(char_span("λx", 2..3), 1..2);
    assert_eq!(char_span("abc", 0..3), 0..3);
}

#[test]
fn nesting_limit() {
    let nested = |n: usize| format!("main <- {}'a'{}", "(".repeat(n), ")".repeat(n));

    // Every group is a level, and so is the 'a' at the bottom.
    assert!(parse(&nested(MAX_DEPTH - 1), "<test>".to_owned()).is_ok());
    assert_eq!(parse_err(&nested(MAX_DEPTH)).info(), &GrammarParseErrorInfo::TooDeep);

    // Gives up on the way down, before the stack runs out.
    let err = parse_err(&nested(50_000));
    assert_eq!(err.info(), &GrammarParseErrorInfo::TooDeep);
    assert_eq!(err.span(), 1008..1009);

    let err = parse_err(&format!("main <- {}.", "-".repeat(50_000)));
    assert_eq!(err.info(), &GrammarParseErrorInfo::TooDeep);

    // Long chains are as tall as they are long.
    let chain = |n: usize| format!("main <- {}", vec!["'a'"; n].join(" | "));
    assert!(parse(&chain(MAX_DEPTH), "<test>".to_owned()).is_ok());
    assert_eq!(parse_err(&chain(MAX_DEPTH + 1)).info(), &GrammarParseErrorInfo::TooDeep);
    let chain = format!("main <- {}", vec!["'a'"; MAX_DEPTH + 1].join(" * "));
    assert_eq!(parse_err(&chain).info(), &GrammarParseErrorInfo::TooDeep);

    let repeated = format!("main <- 'a'{}", "{1}".repeat(MAX_DEPTH));
    assert_eq!(parse_err(&repeated).info(), &GrammarParseErrorInfo::TooDeep);
}
