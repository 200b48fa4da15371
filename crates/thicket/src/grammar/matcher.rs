use super::symbol::{RegExpTerminal, Terminal, TerminalId};
use super::Grammar;
use crate::error::GrammarError;
use crate::lexer::Token;
use compact_str::CompactString;
use hashbrown::HashMap;
use regex::Regex;
use smallvec::SmallVec;

/// Maps a lexed token to every grammar terminal it satisfies.
///
/// A token can match several terminals at once (a literal and a
/// free-standing regexp, say); the parser follows all of them.
#[derive(Debug, Clone)]
pub struct TerminalMatcher {
    literals: HashMap<CompactString, TerminalId, ahash::RandomState>,
    /// Matched by the end-of-input token only, never by class name
    eof: TerminalId,
    classes: HashMap<CompactString, SmallVec<[TerminalId; 2]>, ahash::RandomState>,
    patterns: Vec<(TerminalId, Regex)>,
}

impl TerminalMatcher {
    /// Index the grammar's terminals and compile its regexp terminals.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::InvalidPattern`] if a `/pattern/flags`
    /// terminal does not compile.
    pub fn new(grammar: &Grammar) -> Result<Self, GrammarError> {
        let mut literals = HashMap::with_hasher(ahash::RandomState::new());
        let mut classes: HashMap<_, SmallVec<[TerminalId; 2]>, _> =
            HashMap::with_hasher(ahash::RandomState::new());
        let mut patterns = Vec::new();
        let eof = grammar.eof_terminal();

        for (index, terminal) in grammar.terminals().iter().enumerate() {
            let id = TerminalId(u32::try_from(index).unwrap_or(u32::MAX));
            if id == eof {
                continue;
            }
            match terminal {
                Terminal::Literal(lit) => {
                    if !lit.value.is_empty() {
                        literals.insert(lit.value.clone(), id);
                    }
                }
                Terminal::RegExp(RegExpTerminal {
                    class: Some(class), ..
                }) => classes.entry(class.clone()).or_default().push(id),
                Terminal::RegExp(re) => {
                    let regex = Regex::new(&re.anchored_source()).map_err(|source| {
                        GrammarError::InvalidPattern {
                            owner: format!("terminal /{}/{}", re.pattern, re.flags),
                            source,
                        }
                    })?;
                    patterns.push((id, regex));
                }
            }
        }

        Ok(Self {
            literals,
            eof,
            classes,
            patterns,
        })
    }

    /// Terminals satisfied by `token`, in ascending id order
    #[must_use]
    pub fn matching(&self, token: &Token) -> SmallVec<[TerminalId; 4]> {
        let mut out = SmallVec::new();
        if token.is_eof() {
            out.push(self.eof);
            return out;
        }
        if let Some(id) = self.literals.get(token.text.as_str()) {
            out.push(*id);
        }
        if let Some(ids) = self.classes.get(token.class.as_str()) {
            out.extend(ids.iter().copied());
        }
        for (id, regex) in &self.patterns {
            if regex.is_match(&token.text) {
                out.push(*id);
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::notation::parse_bnf;
    use crate::lexer::Position;

    #[test]
    fn test_literal_class_and_regexp() {
        let grammar = parse_bnf(
            "<S> ::= \"if\" <Token-ident> | /[a-z]+/i",
            &[("ident", "[a-z]+")],
        )
        .unwrap();
        let matcher = TerminalMatcher::new(&grammar).unwrap();
        let at = Position::default();

        let kw = matcher.matching(&Token::new("if", "if", at));
        assert_eq!(kw.len(), 2, "literal and regexp");

        let ident = matcher.matching(&Token::new("ident", "Foo", at));
        assert_eq!(ident.len(), 2, "class and case-insensitive regexp");

        let eof = matcher.matching(&Token::eof(at));
        assert_eq!(eof.as_slice(), &[grammar.eof_terminal()]);

        assert!(matcher.matching(&Token::new("int", "42", at)).is_empty());
    }

    #[test]
    fn test_eof_literal_is_not_end_of_input() {
        let grammar = parse_bnf("<S> ::= \"EOF\"", &[]).unwrap();
        let matcher = TerminalMatcher::new(&grammar).unwrap();
        let at = Position::default();
        let literal = matcher.matching(&Token::new("EOF", "EOF", at));
        assert_eq!(literal.len(), 1);
        assert_ne!(literal[0], grammar.eof_terminal());
        assert_eq!(matcher.matching(&Token::eof(at)).as_slice(), &[grammar.eof_terminal()]);
    }
}
