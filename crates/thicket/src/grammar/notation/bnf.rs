use super::meta_lexer::MetaKind;
use super::Reader;
use crate::error::GrammarError;
use crate::grammar::Symbol;

/// Read `alt | alt | ...` up to the next rule definition.
///
/// Each alternative is a flat sequence of literals, rule references and
/// regexp terminals. An alternative must contain at least one symbol;
/// epsilon is written `""`.
pub(super) fn read_alternatives(reader: &mut Reader<'_>) -> Result<Vec<Vec<Symbol>>, GrammarError> {
    let mut alternatives = vec![read_sequence(reader)?];
    while reader.peek().kind == MetaKind::Pipe {
        reader.next();
        alternatives.push(read_sequence(reader)?);
    }
    Ok(alternatives)
}

fn read_sequence(reader: &mut Reader<'_>) -> Result<Vec<Symbol>, GrammarError> {
    let start = reader.peek().clone();
    let mut symbols = Vec::new();
    let mut items = 0usize;

    while !reader.at_sequence_end() {
        let token = reader.next();
        match &token.kind {
            MetaKind::RuleRef(name) => {
                let name = name.clone();
                symbols.push(reader.reference(&name, &token));
            }
            MetaKind::Literal(value) => {
                let terminal = reader.builder.literal(value);
                reader.read_annotations(terminal)?;
                symbols.push(Symbol::Terminal(terminal));
            }
            MetaKind::RegExp { pattern, flags } => {
                symbols.push(Symbol::Terminal(reader.builder.regexp(pattern, flags)));
            }
            MetaKind::Precedence(_) | MetaKind::Assoc(_) => {
                return Err(Reader::misplaced_annotation(&token));
            }
            MetaKind::LParen
            | MetaKind::RParen
            | MetaKind::Question
            | MetaKind::Plus
            | MetaKind::Star => {
                return Err(GrammarError::syntax(
                    format!("{} is only valid in EBNF grammars", token.kind.describe()),
                    token.line,
                    token.column,
                ));
            }
            MetaKind::Define | MetaKind::Pipe | MetaKind::Eof => {
                return Err(reader.unexpected(&token, "a symbol"));
            }
        }
        items += 1;
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
