use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use thicket::{CompiledGrammar, LexerBuilder};

const MATH: &str = r#"
<Math> ::= <Math> "+" +1+ =left= <Math>
         | <Math> "*" +2+ =left= <Math>
         | "(" <Math> ")"
         | <Token-int>
"#;

fn lexer() -> LexerBuilder {
    LexerBuilder::new().token("int", "[0-9]+").skip("ws", r"\s+")
}

fn expression(terms: usize) -> String {
    (0..terms)
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(if terms % 2 == 0 { " + " } else { " * " })
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_math", |b| {
        b.iter(|| black_box(CompiledGrammar::from_bnf(black_box(MATH), lexer()).unwrap()));
    });

    let grammar = CompiledGrammar::from_bnf(MATH, lexer()).unwrap();
    let bytes = grammar.to_bytes().unwrap();
    c.bench_function("restore_math", |b| {
        b.iter(|| black_box(CompiledGrammar::from_bytes(black_box(&bytes)).unwrap()));
    });
}

fn bench_parse(c: &mut Criterion) {
    let grammar = CompiledGrammar::from_bnf(MATH, lexer()).unwrap();
    let mut group = c.benchmark_group("parse_precedence");
    for terms in [4, 16, 64] {
        let source = expression(terms);
        group.bench_with_input(BenchmarkId::from_parameter(terms), &source, |b, source| {
            b.iter(|| black_box(grammar.parse(black_box(source)).unwrap()));
        });
    }
    group.finish();
}

fn bench_ambiguous_forest(c: &mut Criterion) {
    let grammar = CompiledGrammar::from_bnf("<E> ::= <E> \"+\" <E> | \"n\"", LexerBuilder::new()).unwrap();
    let mut group = c.benchmark_group("parse_ambiguous");
    for operands in [4, 8, 16] {
        let source = vec!["n"; operands].join("+");
        group.bench_with_input(BenchmarkId::from_parameter(operands), &source, |b, source| {
            b.iter(|| {
                let forest = grammar.parse(black_box(source)).unwrap();
                black_box(forest.tree_count())
            });
        });
    }
    group.finish();
}

fn bench_tree_enumeration(c: &mut Criterion) {
    let grammar = CompiledGrammar::from_bnf("<E> ::= <E> \"+\" <E> | \"n\"", LexerBuilder::new()).unwrap();
    let source = vec!["n"; 8].join("+");
    c.bench_function("enumerate_429_trees", |b| {
        b.iter(|| {
            let forest = grammar.parse(&source).unwrap();
            black_box(forest.iter_trees().count())
        });
    });
}

criterion_group!(
    benches,
    bench_compile,
    bench_parse,
    bench_ambiguous_forest,
    bench_tree_enumeration
);
criterion_main!(benches);
