use pegvm::{
    CharSet, CompileError, Error, Grammar, Instruction, MatchConfig, MatchError, Opcode, Pattern,
    Program, Rule,
};

fn program(source: &str) -> Program {
    pegvm::compile(source, "<test>".to_owned(), None).unwrap()
}

#[test]
fn literal() {
    let p = program(r#"main <- "abc""#);
    assert_eq!(p.match_("abcxyz"), Some(3));
    assert_eq!(p.match_("abx"), None);
}

#[test]
fn choice_is_ordered() {
    let p = program(r#"main <- "a" | "ab""#);
    assert_eq!(p.match_("ab"), Some(1));
    assert!(!p.matches_all("ab"));
}

#[test]
fn sets_fuse() {
    let p = program("main <- {'a'..'c'} | {'A'..'C'}");
    assert_eq!(
        p.instructions(),
        &[
            Instruction::MatchSet(CharSet::from_ranges(vec![('a', 'c'), ('A', 'C')])),
            Instruction::Return,
        ][..]
    );
    for c in "abcABC".chars() {
        assert_eq!(p.match_(&c.to_string()), Some(1));
    }
    assert_eq!(p.match_("d"), None);

    let p = program(r#"main <- {'a'..'c'} | "A""#);
    assert_eq!(p.instructions()[0].opcode(), Opcode::Choice);
    let p = program("main <- {'a'..'c'} | -{'A'..'C'}");
    assert_eq!(p.instructions()[0].opcode(), Opcode::Choice);
}

#[test]
fn zero_or_more() {
    let p = program("main <- *'a' * 'b'");
    assert_eq!(p.match_("aaab"), Some(4));
    assert_eq!(p.match_("b"), Some(1));
    assert_eq!(p.match_("aaac"), None);
}

#[test]
fn optional() {
    let p = program("main <- ?'x' * 'y'");
    assert_eq!(p.match_("y"), Some(1));
    assert_eq!(p.match_("xy"), Some(2));
    assert_eq!(p.match_("zy"), None);
}

#[test]
fn complement_consumes_nothing() {
    let p = program("main <- -{'0'..'9'} * .");
    assert_eq!(p.match_("a"), Some(1));
    assert_eq!(p.match_("5"), None);
}

#[test]
fn bounded_repetition_is_greedy() {
    let p = program("main <- 'a'{1,3}");
    assert_eq!(p.match_("aaaa"), Some(3));
    assert_eq!(p.match_("a"), Some(1));
    assert_eq!(p.match_("b"), None);

    // It doesn't give anything back once it has it.
    let p = program("main <- 'a'{1,3} * 'a'");
    assert_eq!(p.match_("aaaa"), Some(4));
    assert_eq!(p.match_("aaa"), None);
    assert_eq!(p.match_("aa"), None);
}

#[test]
fn arithmetic() {
    let source = "
        expr    <- term * *(ws * { '+', '-' } * term)
        term    <- factor * *(ws * { '*', '/' } * factor)
        factor  <- ws * (+{ '0'..'9' } | '(' * expr * ws * ')')
        ws      <- *' '
    ";
    let p = program(source);
    assert!(p.matches_all("13+5*(1+3)/7"));
    assert!(p.matches_all("13 + 5 * (1 + 3) / 7"));
    assert_eq!(p.match_("1+(2"), Some(1));
    assert_eq!(p.match_("+1"), None);
}

#[test]
fn compiling_twice() {
    let source = "
        list  <- item * *(',' * item)
        item  <- word | '[' * ?list * ']'
        word  <- +{ 'a'..'z' }
    ";
    let a = program(source);
    let b = program(source);
    assert_eq!(a.instructions(), b.instructions());
    for subject in &["a,b", "[a,[b,c]],d", "[", "[]", "", "a,,b", "[a,b"] {
        assert_eq!(a.match_(subject), b.match_(subject), "{:?}", subject);
    }
}

#[test]
fn empty_class_never_matches() {
    let p = program("main <- {}");
    assert_eq!(p.match_(""), None);
    assert_eq!(p.match_("a"), None);
    let p = program("main <- -{}");
    assert_eq!(p.match_("a"), Some(0));
}

#[test]
fn zero_width_loops_terminate() {
    let config = MatchConfig {
        step_limit: Some(1000),
        profile: false,
    };

    let p = program("main <- *(?'a')");
    assert_eq!(p.match_with("aa", &config).unwrap().end, Some(2));
    assert_eq!(p.match_with("b", &config).unwrap().end, Some(0));

    let p = program("main <- +(-'x')");
    assert_eq!(p.match_with("abc", &config).unwrap().end, Some(0));
    assert_eq!(p.match_with("x", &config).unwrap().end, None);
}

#[test]
fn construction_errors() {
    let compile = |s: &str| pegvm::compile(s, "<test>".to_owned(), None);

    assert!(matches!(
        compile("main <- missing"),
        Err(Error::Compile(CompileError::UnresolvedRule { .. }))
    ));
    assert!(matches!(
        compile("main <- {'z'..'a'}"),
        Err(Error::Compile(CompileError::BackwardsRange {
            lo: 'z',
            hi: 'a',
            ..
        }))
    ));
    assert!(matches!(
        compile("main <- 'a'{3..1}"),
        Err(Error::Compile(CompileError::BadBounds { min: 3, max: 1, .. }))
    ));
    assert!(matches!(
        compile("main <- 'a'\nmain <- 'b'"),
        Err(Error::Compile(CompileError::DuplicateRule(_)))
    ));

    let grammar = Grammar::new(vec![Rule::new("main", Pattern::Any)]);
    assert_eq!(
        grammar.compile("other").unwrap_err(),
        CompileError::MissingStart("other".to_owned())
    );
}

#[test]
fn step_limit() {
    let p = program("main <- *.");
    let subject = "x".repeat(1000);
    let config = MatchConfig {
        step_limit: Some(10),
        profile: false,
    };
    assert_eq!(
        p.match_with(&subject, &config).unwrap_err(),
        MatchError::StepLimit { limit: 10 }
    );
}

#[test]
fn profiles_follow_execution() {
    let p = program("main <- *word\nword <- +{ 'a'..'z' } * ?' '");
    let config = MatchConfig {
        step_limit: None,
        profile: true,
    };
    let outcome = p.match_with("ab cd ef", &config).unwrap();
    assert_eq!(outcome.end, Some(8));

    let profile = outcome.profile.unwrap();
    // three words, and a fourth call that fails at the end
    assert_eq!(profile.calls("word"), 4);
    assert_eq!(profile.count(Opcode::Call), 4);
    assert_eq!(profile.total(), outcome.steps);
}

#[test]
fn deep_grammars_are_refused() {
    let nested = |n: usize| format!("main <- {}'a'{}", "(".repeat(n), ")".repeat(n));

    let p = program(&nested(pegvm::parse::MAX_DEPTH - 1));
    assert_eq!(p.match_("a"), Some(1));

    match pegvm::compile(&nested(50_000), "<test>".to_owned(), None) {
        Err(Error::Parse(e)) => assert_eq!(e.info(), &pegvm::GrammarParseErrorInfo::TooDeep),
        other => panic!("expected a parse error, got {:?}", other.map(|p| p.len())),
    }
}
