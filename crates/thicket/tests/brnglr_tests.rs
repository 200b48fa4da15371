//! End-to-end tests: grammar text in, forests and trees out.

use thicket::grammar::TerminalId;
use thicket::lexer::{Position, Token};
use thicket::{Candidate, CompiledGrammar, LexerBuilder, ParseError, ParserConfig, TokenStream};

const MATH: &str = r#"
# binary operators, "*" binds tighter
<Math> ::= <Math> "+" +1+ =left= <Math>
         | <Math> "*" +2+ =left= <Math>
         | <Math> "^" +3+ =right= <Math>
         | <Token-int>
"#;

fn ints() -> LexerBuilder {
    LexerBuilder::new().token("int", "[0-9]+").skip("ws", r"\s+")
}

fn math() -> CompiledGrammar {
    CompiledGrammar::from_bnf(MATH, ints()).unwrap()
}

fn ambiguous_sum() -> CompiledGrammar {
    CompiledGrammar::from_bnf("<E> ::= <E> \"+\" <E> | \"n\"", LexerBuilder::new()).unwrap()
}

fn catalan(n: u64) -> u64 {
    (0..n).fold(1, |c, k| c * 2 * (2 * k + 1) / (k + 2))
}

fn terminal(grammar: &CompiledGrammar, text: &str) -> TerminalId {
    let index = grammar
        .grammar()
        .terminals()
        .iter()
        .position(|t| t.to_string() == format!("{text:?}"))
        .unwrap();
    TerminalId(u32::try_from(index).unwrap())
}

#[test]
fn test_nullable_fixed_point() {
    let grammar = CompiledGrammar::from_bnf(
        "<A> ::= <B> <C> | \"\"\n<B> ::= \"\"\n<C> ::= \"x\" | \"\"",
        LexerBuilder::new(),
    )
    .unwrap();
    let g = grammar.grammar();
    for name in ["A", "B", "C"] {
        assert!(g.is_nullable(g.rule_by_name(name).unwrap()), "{name} should be nullable");
    }
    assert_eq!(grammar.parse("x").unwrap().tree_count(), 1);
}

#[test]
fn test_non_nullable_rule() {
    let grammar = CompiledGrammar::from_bnf(
        "<A> ::= <B> \"y\"\n<B> ::= \"x\" | \"\"",
        LexerBuilder::new(),
    )
    .unwrap();
    let g = grammar.grammar();
    assert!(!g.is_nullable(g.rule_by_name("A").unwrap()));
    assert!(g.is_nullable(g.rule_by_name("B").unwrap()));
    assert!(grammar.parse("y").is_ok());
    assert!(grammar.parse("xy").is_ok());
}

#[test]
fn test_states_are_merged() {
    let grammar = CompiledGrammar::from_bnf(
        "<S> ::= \"a\" <X> \"c\" | \"b\" <X> \"d\"\n<X> ::= \"x\"",
        LexerBuilder::new(),
    )
    .unwrap();
    let automaton = grammar.automaton();
    let start = automaton.start_state();
    let after_a = automaton.shift(start, terminal(&grammar, "a")).unwrap();
    let after_b = automaton.shift(start, terminal(&grammar, "b")).unwrap();
    let x = terminal(&grammar, "x");
    assert_eq!(automaton.shift(after_a, x), automaton.shift(after_b, x));

    let states = automaton.states();
    for (i, a) in states.iter().enumerate() {
        for b in &states[i + 1..] {
            assert_ne!(a.kernel, b.kernel, "states {} and {} share a kernel", a.id, b.id);
        }
    }
}

#[test]
fn test_ambiguous_sum_has_two_trees() {
    let forest = ambiguous_sum().parse("n+n+n").unwrap();
    assert!(forest.is_ambiguous());
    assert_eq!(forest.tree_count(), 2);

    let mut shapes: Vec<String> = forest.iter_trees().map(|t| t.to_sexpr()).collect();
    shapes.sort();
    assert_eq!(
        shapes,
        [
            r#"(E (E "n") "+" (E (E "n") "+" (E "n")))"#,
            r#"(E (E (E "n") "+" (E "n")) "+" (E "n"))"#,
        ]
    );
}

#[test]
fn test_forest_stays_polynomial() {
    let operands = 10;
    let input = vec!["n"; operands].join("+");
    let forest = ambiguous_sum().parse(&input).unwrap();
    let trees = catalan(operands as u64 - 1);
    assert_eq!(trees, 4862);
    assert_eq!(forest.tree_count(), trees);
    assert!(
        (forest.stats().sppf_nodes as u64) < trees,
        "{} nodes for {trees} trees",
        forest.stats().sppf_nodes
    );
    assert!(forest.tree_at(trees - 1).is_some());
    assert!(forest.tree_at(trees).is_none());
}

#[test]
fn test_precedence_selects_tighter_operator() {
    let forest = math().parse("1 + 2 * 3").unwrap();
    assert_eq!(forest.tree_count(), 1);
    assert_eq!(
        forest.trees()[0].to_sexpr(),
        r#"(Math (Math (Token-int "1")) "+" (Math (Math (Token-int "2")) "*" (Math (Token-int "3"))))"#
    );

    let forest = math().parse("1 * 2 + 3").unwrap();
    assert_eq!(forest.tree_count(), 1);
    assert_eq!(
        forest.trees()[0].to_sexpr(),
        r#"(Math (Math (Math (Token-int "1")) "*" (Math (Token-int "2"))) "+" (Math (Token-int "3")))"#
    );
}

#[test]
fn test_associativity() {
    let left = math().parse("1 + 2 + 3").unwrap();
    assert_eq!(left.tree_count(), 1);
    assert_eq!(
        left.trees()[0].to_sexpr(),
        r#"(Math (Math (Math (Token-int "1")) "+" (Math (Token-int "2"))) "+" (Math (Token-int "3")))"#
    );

    let right = math().parse("2 ^ 3 ^ 4").unwrap();
    assert_eq!(right.tree_count(), 1);
    assert_eq!(
        right.trees()[0].to_sexpr(),
        r#"(Math (Math (Token-int "2")) "^" (Math (Math (Token-int "3")) "^" (Math (Token-int "4"))))"#
    );
}

#[test]
fn test_long_operator_chain_stays_quadratic() {
    let operands = 120;
    let text = (1..=operands)
        .map(|i| (i % 10).to_string())
        .enumerate()
        .fold(String::new(), |mut acc, (i, term)| {
            if i > 0 {
                acc.push_str(if i % 3 == 0 { " * " } else { " + " });
            }
            acc.push_str(&term);
            acc
        });

    let grammar = math();
    let forest = grammar.parse(&text).unwrap();
    assert_eq!(forest.tree_count(), 1);
    assert_eq!(forest.trees()[0].text(), text);
    let stats = forest.stats();
    assert!(stats.rejected > 0);
    assert!(
        stats.sppf_nodes < 4 * operands * operands,
        "{} nodes for {operands} operands",
        stats.sppf_nodes
    );

    // the engine already settled every operator, before any forest pass
    let raw = grammar
        .parser()
        .with_config(ParserConfig::default().with_default_transforms(false))
        .parse(&text)
        .unwrap();
    assert_eq!(raw.tree_count(), 1);
}

#[test]
fn test_precedence_can_be_disabled() {
    let grammar = math();
    let forest = grammar
        .parser()
        .with_config(ParserConfig::default().with_precedence(false))
        .parse("1 + 2 * 3")
        .unwrap();
    assert_eq!(forest.tree_count(), 2);
}

#[test]
fn test_failure_points_at_offending_token() {
    let grammar = CompiledGrammar::from_bnf(
        "<S> ::= \"a\" \"b\"",
        LexerBuilder::new().token("word", "[a-z]").skip("ws", r"\s+"),
    )
    .unwrap();
    match grammar.parse("a c").unwrap_err() {
        ParseError::UnexpectedToken {
            position,
            found,
            expected,
            ..
        } => {
            assert_eq!((position.line, position.column), (1, 3));
            assert_eq!(position.absolute, 2);
            assert_eq!(found, "\"c\"");
            assert_eq!(expected, ["\"b\""]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_failure_at_end_of_input() {
    let err = math().parse("1 +").unwrap_err();
    let ParseError::UnexpectedToken { found, .. } = &err else {
        panic!("unexpected {err:?}");
    };
    assert_eq!(found, "end of input");
    assert!(err.position().is_some());
}

#[test]
fn test_lexer_errors_propagate() {
    assert!(matches!(math().parse("1 $ 2"), Err(ParseError::Lexer(_))));
}

#[test]
fn test_empty_input_uses_epsilon_fragment() {
    let grammar = CompiledGrammar::from_bnf(
        "<Program> ::= <Program> <Expr> | \"\"\n<Expr> ::= <Token-int>",
        ints(),
    )
    .unwrap();
    let forest = grammar.parse("").unwrap();
    let first = grammar.grammar().first();
    assert_eq!(Some(forest.root()), grammar.epsilon().symbol(first));
    assert_eq!(forest.tree_count(), 1);
    let tree = &forest.trees()[0];
    assert_eq!(tree.rule_name(), Some("Program"));
    assert!(tree.children.is_empty());

    let forest = grammar.parse("1 2").unwrap();
    assert_eq!(forest.tree_count(), 1);
    assert_eq!(forest.trees()[0].text(), "1 2");
}

#[test]
fn test_empty_input_rejected_when_not_nullable() {
    assert!(matches!(
        math().parse("   "),
        Err(ParseError::UnexpectedToken { .. })
    ));
}

#[test]
fn test_greedy_lists() {
    let grammar = CompiledGrammar::from_ebnf(
        "<Words> ::= <Token-w>* <Token-w>*",
        LexerBuilder::new().token("w", "[a-z]+").skip("ws", r"\s+"),
    )
    .unwrap();
    let forest = grammar.parse("a b").unwrap();
    assert_eq!(forest.tree_count(), 1);
    assert_eq!(forest.trees()[0].children[0].text(), "a b");

    let all = grammar
        .parser()
        .with_config(ParserConfig::default().with_greedy_lists(false))
        .parse("a b")
        .unwrap();
    assert_eq!(all.tree_count(), 3);
}

#[test]
fn test_user_disambiguator() {
    let grammar = CompiledGrammar::from_bnf("<Sum> ::= <Sum> \"+\" <Sum> | <Token-int>", ints()).unwrap();
    let forest = grammar
        .parser()
        .with_disambiguator(|c: &Candidate<'_>| {
            c.alternative() != 0 || c.sequences().iter().any(|seq| c.node(seq[0]).width() == 1)
        })
        .parse("1 + 2 + 3")
        .unwrap();
    assert_eq!(forest.tree_count(), 1);
    assert_eq!(
        forest.trees()[0].to_sexpr(),
        r#"(Sum (Sum (Token-int "1")) "+" (Sum (Sum (Token-int "2")) "+" (Sum (Token-int "3"))))"#
    );
    assert!(forest.stats().rejected > 0);
}

#[test]
fn test_regexp_terminals() {
    let grammar = CompiledGrammar::from_bnf(
        "<Pair> ::= <Token-word> \"=\" /[0-9]+/",
        LexerBuilder::new()
            .token("word", "[a-z0-9]+")
            .skip("ws", r"\s+"),
    )
    .unwrap();
    assert!(grammar.parse("x = 42").is_ok());
    assert!(grammar.parse("x = y").is_err());
}

#[test]
fn test_prebuilt_token_stream() {
    let grammar = math();
    let at = |column: u32, length: usize| Position::new(1, column, (column - 1) as usize, length);
    let tokens = TokenStream::from_tokens(vec![
        Token::new("int", "1", at(1, 1)),
        Token::new("+", "+", at(2, 1)),
        Token::new("int", "2", at(3, 1)),
    ]);
    let forest = grammar.parser().parse_tokens(&tokens).unwrap();
    assert_eq!(forest.trees()[0].text(), "1 + 2");
    assert_eq!(forest.tokens().len(), 4);
}

#[test]
fn test_stack_limit() {
    let err = math()
        .parser()
        .with_config(ParserConfig::default().with_max_stack_nodes(2))
        .parse("1 + 2 * 3")
        .unwrap_err();
    assert!(matches!(err, ParseError::StackLimit { limit: 2 }));
}

#[test]
fn test_transforms_can_be_skipped() {
    let grammar = ambiguous_sum();
    let raw = grammar
        .parser()
        .with_config(ParserConfig::default().with_default_transforms(false))
        .parse("n+n+n")
        .unwrap();
    assert_eq!(raw.tree_count(), 2);
    let tidy = grammar.parse("n+n+n").unwrap();
    assert!(tidy.live_len() <= raw.live_len());
}

#[cfg(feature = "serialize")]
#[test]
fn test_persisted_grammar_parses_identically() {
    let original = ambiguous_sum();
    let restored = CompiledGrammar::from_bytes(&original.to_bytes().unwrap()).unwrap();
    for input in ["n", "n+n", "n+n+n", "n+n+n+n", "n+", "+n"] {
        match (original.parse(input), restored.parse(input)) {
            (Ok(a), Ok(b)) => {
                let a: Vec<String> = a.iter_trees().map(|t| t.to_sexpr()).collect();
                let b: Vec<String> = b.iter_trees().map(|t| t.to_sexpr()).collect();
                assert_eq!(a, b, "trees differ for {input}");
            }
            (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
            (a, b) => panic!("{input}: {a:?} vs {b:?}"),
        }
    }
}

#[cfg(feature = "serialize")]
#[test]
fn test_save_and_load() {
    let path = std::env::temp_dir().join(format!("thicket-{}.bin", std::process::id()));
    math().save(&path).unwrap();
    let loaded = CompiledGrammar::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded.parse("1 + 2 * 3").unwrap().tree_count(), 1);
}
