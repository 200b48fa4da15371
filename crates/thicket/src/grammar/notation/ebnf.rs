use super::meta_lexer::{MetaKind, MetaToken};
use super::Reader;
use crate::error::GrammarError;
use crate::grammar::{RuleKind, Symbol};
use smallvec::SmallVec;

type Fragment = SmallVec<[Symbol; 4]>;

/// Read `alt | alt | ...` up to the next rule definition, desugaring
/// groups and modifiers into synthetic rules.
pub(super) fn read_alternatives(reader: &mut Reader<'_>) -> Result<Vec<Vec<Symbol>>, GrammarError> {
    let alternatives = read_choice(reader, None)?;
    Ok(alternatives.into_iter().map(SmallVec::into_vec).collect())
}

/// `sequence ('|' sequence)*`, stopping at `)` when inside the group opened
/// by `group`
fn read_choice(
    reader: &mut Reader<'_>,
    group: Option<&MetaToken>,
) -> Result<Vec<Fragment>, GrammarError> {
    let mut alternatives = vec![read_sequence(reader, group)?];
    while reader.peek().kind == MetaKind::Pipe {
        reader.next();
        alternatives.push(read_sequence(reader, group)?);
    }
    Ok(alternatives)
}

fn read_sequence(
    reader: &mut Reader<'_>,
    group: Option<&MetaToken>,
) -> Result<Fragment, GrammarError> {
    let start = reader.peek().clone();
    let mut symbols = Fragment::new();
    let mut items = 0usize;

    loop {
        if reader.at_sequence_end() || reader.peek().kind == MetaKind::RParen {
            break;
        }
        symbols.extend(read_item(reader)?);
        items += 1;
    }

    if let Some(open) = group {
        if matches!(reader.peek().kind, MetaKind::Eof) || reader.at_rule_start() {
            return Err(GrammarError::UnterminatedGroup {
                line: open.line,
                column: open.column,
            });
        }
    } else if reader.peek().kind == MetaKind::RParen {
        let close = reader.peek().clone();
        return Err(reader.unexpected(&close, "a symbol"));
    }

    if items == 0 {
        return Err(GrammarError::syntax(
            "empty alternative; write \"\" for epsilon",
            start.line,
            start.column,
        ));
    }
    Ok(symbols)
}

/// `primary modifier?`
fn read_item(reader: &mut Reader<'_>) -> Result<Fragment, GrammarError> {
    let token = reader.next();
    let fragment: Fragment = match &token.kind {
        MetaKind::RuleRef(name) => {
            let name = name.clone();
            smallvec::smallvec![reader.reference(&name, &token)]
        }
        MetaKind::Literal(value) => {
            let terminal = reader.builder.literal(value);
            reader.read_annotations(terminal)?;
            if reader.builder.is_epsilon(terminal) {
                Fragment::new()
            } else {
                smallvec::smallvec![Symbol::Terminal(terminal)]
            }
        }
        MetaKind::RegExp { pattern, flags } => {
            smallvec::smallvec![Symbol::Terminal(reader.builder.regexp(pattern, flags))]
        }
        MetaKind::LParen => {
            let alternatives = read_choice(reader, Some(&token))?;
            let close = reader.next();
            if close.kind != MetaKind::RParen {
                return Err(GrammarError::UnterminatedGroup {
                    line: token.line,
                    column: token.column,
                });
            }
            group_fragment(reader, alternatives)
        }
        MetaKind::Precedence(_) | MetaKind::Assoc(_) => {
            return Err(Reader::misplaced_annotation(&token));
        }
        MetaKind::Question | MetaKind::Plus | MetaKind::Star => {
            return Err(GrammarError::syntax(
                format!("modifier {} has nothing to apply to", token.kind.describe()),
                token.line,
                token.column,
            ));
        }
        MetaKind::RParen | MetaKind::Define | MetaKind::Pipe | MetaKind::Eof => {
            return Err(reader.unexpected(&token, "a symbol"));
        }
    };

    let Some(modifier) = reader.peek().kind.modifier() else {
        return Ok(fragment);
    };
    let modifier_token = reader.next();
    if let Some(second) = reader.peek().kind.modifier() {
        let again = reader.peek().clone();
        return Err(GrammarError::DoubleModifier {
            modifier: second,
            line: again.line,
            column: again.column,
        });
    }
    if fragment.is_empty() {
        return Err(GrammarError::syntax(
            format!("modifier '{modifier}' applied to an empty expression"),
            modifier_token.line,
            modifier_token.column,
        ));
    }

    let rule = match modifier {
        '+' => list_rule(reader, &fragment),
        '?' => optional_rule(reader, &fragment),
        _ => {
            let list = list_rule(reader, &fragment);
            optional_rule(reader, &[list])
        }
    };
    Ok(smallvec::smallvec![rule])
}

/// A single-alternative group is inlined (a following modifier then applies
/// to the whole sequence); anything else becomes a `[GROUP ...]` rule.
fn group_fragment(reader: &mut Reader<'_>, mut alternatives: Vec<Fragment>) -> Fragment {
    if alternatives.len() == 1 {
        return alternatives.pop().unwrap_or_default();
    }
    let name = format!(
        "[GROUP {}]",
        alternatives
            .iter()
            .map(|alt| describe(reader, alt))
            .collect::<Vec<_>>()
            .join(" | ")
    );
    let rule = reader.builder.rule_id(&name, RuleKind::Group);
    if !reader.builder.is_defined(rule) {
        for alt in alternatives {
            reader.builder.add_alternative(rule, alt);
        }
    }
    smallvec::smallvec![Symbol::Rule(rule)]
}

/// `[LIST x] ::= x | x [LIST x]`
fn list_rule(reader: &mut Reader<'_>, fragment: &[Symbol]) -> Symbol {
    let name = format!("[LIST {}]", describe(reader, fragment));
    let rule = reader.builder.rule_id(&name, RuleKind::List);
    if !reader.builder.is_defined(rule) {
        reader.builder.add_alternative(rule, fragment.iter().copied());
        reader.builder.add_alternative(
            rule,
            fragment.iter().copied().chain(std::iter::once(Symbol::Rule(rule))),
        );
    }
    Symbol::Rule(rule)
}

/// `[OPT x] ::= x | ""`
fn optional_rule(reader: &mut Reader<'_>, fragment: &[Symbol]) -> Symbol {
    let name = format!("[OPT {}]", describe(reader, fragment));
    let rule = reader.builder.rule_id(&name, RuleKind::Optional);
    if !reader.builder.is_defined(rule) {
        reader.builder.add_alternative(rule, fragment.iter().copied());
        reader.builder.add_alternative(rule, std::iter::empty());
    }
    Symbol::Rule(rule)
}

fn describe(reader: &Reader<'_>, fragment: &[Symbol]) -> String {
    fragment
        .iter()
        .map(|sym| reader.builder.describe(*sym))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use crate::error::GrammarError;
    use crate::grammar::notation::{parse_bnf, parse_ebnf};
    use crate::grammar::{RuleKind, Symbol};

    #[test]
    fn test_plus_desugars_to_right_recursive_list() {
        let g = parse_ebnf("<S> ::= \"x\"+", &[]).unwrap();
        let list = g.rule_by_name("[LIST \"x\"]").unwrap();
        let rule = g.rule(list);
        assert_eq!(rule.kind, RuleKind::List);
        assert_eq!(rule.alternatives.len(), 2);
        assert_eq!(rule.alternatives[0].len(), 1);
        assert_eq!(rule.alternatives[1].symbols[1], Symbol::Rule(list));
        assert!(!rule.nullable);
    }

    #[test]
    fn test_star_is_optional_list() {
        let g = parse_ebnf("<S> ::= <Token-a>*", &[("a", "a")]).unwrap();
        let opt = g.rule_by_name("[OPT <[LIST <Token-a>]>]").unwrap();
        assert_eq!(g.rule(opt).kind, RuleKind::Optional);
        assert!(g.rule(opt).nullable);
        assert!(g.rule(g.first()).nullable);
    }

    #[test]
    fn test_identical_expressions_share_rule() {
        let g = parse_ebnf("<S> ::= \"a\"? \"b\" \"a\"?", &[]).unwrap();
        let s = g.alternative(g.first(), 0);
        assert_eq!(s.symbols[0], s.symbols[2]);
    }

    #[test]
    fn test_groups() {
        let g = parse_ebnf("<S> ::= (\"a\" | \"b\") (\"c\" \"d\") (\"e\" \"f\")+", &[]).unwrap();
        let s = g.alternative(g.first(), 0);
        assert_eq!(s.len(), 4, "group rule, c, d, list");
        let group = s.symbols[0].as_rule().unwrap();
        assert_eq!(g.rule(group).kind, RuleKind::Group);
        let list = s.symbols[3].as_rule().unwrap();
        assert_eq!(g.alternative(list, 0).len(), 2);
    }

    #[test]
    fn test_double_modifier() {
        let err = parse_ebnf("<S> ::= \"a\"+?", &[]).unwrap_err();
        match err {
            GrammarError::DoubleModifier { modifier, line, column } => {
                assert_eq!((modifier, line, column), ('?', 1, 13));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_group() {
        let err = parse_ebnf("<S> ::= ( \"a\" | \"b\"\n<T> ::= \"c\"", &[]).unwrap_err();
        assert!(matches!(
            err,
            GrammarError::UnterminatedGroup { line: 1, column: 9 }
        ));
        let err = parse_ebnf("<S> ::= ( \"a\"", &[]).unwrap_err();
        assert!(matches!(err, GrammarError::UnterminatedGroup { .. }));
    }

    #[test]
    fn test_stray_close_paren() {
        assert!(parse_ebnf("<S> ::= \"a\" )", &[]).is_err());
    }

    #[test]
    fn test_bnf_subset_agrees() {
        let text = "<E> ::= <E> \"+\" <T> | <T>\n<T> ::= \"n\"";
        let a = parse_bnf(text, &[]).unwrap();
        let b = parse_ebnf(text, &[]).unwrap();
        assert_eq!(a.to_bnf(), b.to_bnf());
    }
}
