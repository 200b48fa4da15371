//! Tokenizer for the grammar meta-syntax shared by BNF and EBNF.

use crate::error::GrammarError;
use crate::grammar::Associativity;
use compact_str::CompactString;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MetaKind {
    /// `<name>`
    RuleRef(CompactString),
    /// `"text"` or `'text'`
    Literal(CompactString),
    /// `/pattern/flags`
    RegExp { pattern: String, flags: CompactString },
    /// `::=`
    Define,
    Pipe,
    /// `+N+`
    Precedence(u32),
    /// `=left=` or `=right=`
    Assoc(Associativity),
    LParen,
    RParen,
    Question,
    Plus,
    Star,
    Eof,
}

impl MetaKind {
    pub(crate) const fn modifier(&self) -> Option<char> {
        match self {
            Self::Question => Some('?'),
            Self::Plus => Some('+'),
            Self::Star => Some('*'),
            _ => None,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::RuleRef(name) => format!("<{name}>"),
            Self::Literal(value) => format!("{:?}", value.as_str()),
            Self::RegExp { pattern, flags } => format!("/{pattern}/{flags}"),
            Self::Define => "'::='".into(),
            Self::Pipe => "'|'".into(),
            Self::Precedence(level) => format!("+{level}+"),
            Self::Assoc(Associativity::Right) => "=right=".into(),
            Self::Assoc(_) => "=left=".into(),
            Self::LParen => "'('".into(),
            Self::RParen => "')'".into(),
            Self::Question => "'?'".into(),
            Self::Plus => "'+'".into(),
            Self::Star => "'*'".into(),
            Self::Eof => "end of grammar".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MetaToken {
    pub kind: MetaKind,
    pub line: u32,
    pub column: u32,
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
}

impl Cursor<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }
}

/// Split grammar text into meta tokens, ending with [`MetaKind::Eof`].
///
/// `#` starts a comment running to the end of the line.
pub(crate) fn tokenize(text: &str) -> Result<Vec<MetaToken>, GrammarError> {
    let mut cur = Cursor {
        chars: text.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut out = Vec::new();

    loop {
        while cur.peek().is_some_and(char::is_whitespace) {
            cur.bump();
        }
        let (line, column) = (cur.line, cur.column);
        let Some(ch) = cur.bump() else {
            out.push(MetaToken {
                kind: MetaKind::Eof,
                line,
                column,
            });
            return Ok(out);
        };
        let err = |message: String| GrammarError::syntax(message, line, column);

        let kind = match ch {
            '#' => {
                while cur.peek().is_some_and(|c| c != '\n') {
                    cur.bump();
                }
                continue;
            }
            '<' => {
                let mut name = CompactString::default();
                loop {
                    match cur.bump() {
                        Some('>') => break,
                        Some('\n') | None => return Err(err("unterminated rule reference".into())),
                        Some(c) => name.push(c),
                    }
                }
                if name.trim().is_empty() {
                    return Err(err("empty rule name".into()));
                }
                MetaKind::RuleRef(CompactString::new(name.trim()))
            }
            '"' | '\'' => MetaKind::Literal(read_literal(&mut cur, ch).ok_or_else(|| {
                err("unterminated literal".into())
            })?),
            '/' => {
                let mut pattern = String::new();
                loop {
                    match cur.bump() {
                        Some('/') => break,
                        Some('\\') => {
                            let next = cur.bump().ok_or_else(|| err("unterminated pattern".into()))?;
                            if next != '/' {
                                pattern.push('\\');
                            }
                            pattern.push(next);
                        }
                        Some('\n') | None => return Err(err("unterminated pattern".into())),
                        Some(c) => pattern.push(c),
                    }
                }
                let mut flags = CompactString::default();
                while let Some(flag) = cur.peek().filter(char::is_ascii_alphabetic) {
                    if !matches!(flag, 'i' | 'm' | 's' | 'x') {
                        return Err(err(format!("unsupported pattern flag '{flag}'")));
                    }
                    flags.push(flag);
                    cur.bump();
                }
                MetaKind::RegExp { pattern, flags }
            }
            ':' => {
                if cur.eat(':') && cur.eat('=') {
                    MetaKind::Define
                } else {
                    return Err(err("expected '::='".into()));
                }
            }
            '|' => MetaKind::Pipe,
            '(' => MetaKind::LParen,
            ')' => MetaKind::RParen,
            '?' => MetaKind::Question,
            '*' => MetaKind::Star,
            '+' => {
                if cur.peek().is_some_and(|c| c.is_ascii_digit()) {
                    let mut digits = String::new();
                    while let Some(d) = cur.peek().filter(char::is_ascii_digit) {
                        digits.push(d);
                        cur.bump();
                    }
                    if !cur.eat('+') {
                        return Err(err(format!("expected '+' to close precedence +{digits}")));
                    }
                    let level = digits
                        .parse()
                        .map_err(|_| err(format!("precedence {digits} is out of range")))?;
                    MetaKind::Precedence(level)
                } else {
                    MetaKind::Plus
                }
            }
            '=' => {
                let mut word = String::new();
                while let Some(c) = cur.peek().filter(char::is_ascii_alphabetic) {
                    word.push(c);
                    cur.bump();
                }
                if !cur.eat('=') {
                    return Err(err("expected '=' to close associativity".into()));
                }
                match word.as_str() {
                    "left" => MetaKind::Assoc(Associativity::Left),
                    "right" => MetaKind::Assoc(Associativity::Right),
                    _ => return Err(err(format!("unknown associativity '{word}'"))),
                }
            }
            other => return Err(err(format!("unexpected character '{other}'"))),
        };
        out.push(MetaToken { kind, line, column });
    }
}

fn read_literal(cur: &mut Cursor<'_>, quote: char) -> Option<CompactString> {
    let mut value = CompactString::default();
    loop {
        match cur.bump()? {
            c if c == quote => return Some(value),
            '\n' => return None,
            '\\' => match cur.bump()? {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                other => value.push(other),
            },
            c => value.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<MetaKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_rule_line() {
        assert_eq!(
            kinds("<Math> ::= <Math> \"+\" +1+ =left= <Math> | <Token-int>"),
            vec![
                MetaKind::RuleRef("Math".into()),
                MetaKind::Define,
                MetaKind::RuleRef("Math".into()),
                MetaKind::Literal("+".into()),
                MetaKind::Precedence(1),
                MetaKind::Assoc(Associativity::Left),
                MetaKind::RuleRef("Math".into()),
                MetaKind::Pipe,
                MetaKind::RuleRef("Token-int".into()),
                MetaKind::Eof,
            ]
        );
    }

    #[test]
    fn test_modifiers_and_groups() {
        assert_eq!(
            kinds("( 'a' | <b> )+ \"c\"? <d>* # trailing comment"),
            vec![
                MetaKind::LParen,
                MetaKind::Literal("a".into()),
                MetaKind::Pipe,
                MetaKind::RuleRef("b".into()),
                MetaKind::RParen,
                MetaKind::Plus,
                MetaKind::Literal("c".into()),
                MetaKind::Question,
                MetaKind::RuleRef("d".into()),
                MetaKind::Star,
                MetaKind::Eof,
            ]
        );
    }

    #[test]
    fn test_escapes_and_regexp() {
        assert_eq!(
            kinds(r#""\"" '\n' /a\/b/i"#),
            vec![
                MetaKind::Literal("\"".into()),
                MetaKind::Literal("\n".into()),
                MetaKind::RegExp {
                    pattern: "a/b".into(),
                    flags: "i".into()
                },
                MetaKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("<A> ::=\n  \"x\"").unwrap();
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
    }

    #[test]
    fn test_errors() {
        let err = tokenize("<A> ::= \"open").unwrap_err();
        assert_eq!(err.location(), Some((1, 9)));
        assert!(tokenize("<A> := \"x\"").is_err());
        assert!(tokenize("<A> ::= \"x\" =up=").is_err());
        assert!(tokenize("<A> ::= \"x\" +12").is_err());
        assert!(tokenize("<A> ::= /x/g").is_err());
    }
}
