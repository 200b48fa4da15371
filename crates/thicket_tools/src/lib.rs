//! Thicket Tools - command-line utilities for thicket grammars
//!
//! Compiles grammars into reusable blobs, parses input with them and
//! renders grammars and forests for inspection.

pub mod cli;
pub mod visualize;

use cli::{GrammarSource, GrammarText};
use std::error::Error;
use std::fs;
use std::path::Path;
use thicket::lexer::LexerSpec;
use thicket::{CompiledGrammar, LexerBuilder, Notation};

pub use visualize::{forest_dot, grammar_dot};

/// Notation for a grammar file: `.bnf` files are BNF, anything else EBNF
#[must_use]
pub fn guess_notation(path: &Path) -> Notation {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("bnf") => Notation::Bnf,
        _ => Notation::Ebnf,
    }
}

/// Read a JSON lexer description
///
/// # Errors
///
/// Fails if the JSON does not describe a [`LexerSpec`].
pub fn lexer_from_json(json: &str) -> Result<LexerBuilder, serde_json::Error> {
    let spec: LexerSpec = serde_json::from_str(json)?;
    Ok(LexerBuilder::from(spec))
}

/// Compile the grammar file named by `text`
///
/// # Errors
///
/// Unreadable files, an invalid lexer description or grammar errors.
pub fn compile_text(text: &GrammarText) -> Result<CompiledGrammar, Box<dyn Error>> {
    let source = fs::read_to_string(&text.grammar)
        .map_err(|e| format!("cannot read {}: {e}", text.grammar.display()))?;
    let lexer = match &text.lexer {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            lexer_from_json(&json).map_err(|e| format!("invalid lexer description {}: {e}", path.display()))?
        }
        None => LexerBuilder::new(),
    };
    let notation = text
        .notation
        .map_or_else(|| guess_notation(&text.grammar), Notation::from);
    tracing::info!(grammar = %text.grammar.display(), ?notation, "compiling grammar");
    Ok(CompiledGrammar::compile(&source, notation, lexer)?)
}

/// Load a grammar blob or compile grammar text, whichever was given
///
/// # Errors
///
/// See [`compile_text`]; blobs fail with a `PersistError`.
pub fn load_grammar(source: &GrammarSource) -> Result<CompiledGrammar, Box<dyn Error>> {
    if let Some(blob) = &source.blob {
        tracing::info!(blob = %blob.display(), "loading grammar");
        return Ok(CompiledGrammar::load(blob)?);
    }
    match source.text() {
        Some(text) => compile_text(&text),
        None => Err("either --blob or --grammar is required".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_notation() {
        assert_eq!(guess_notation(Path::new("math.bnf")), Notation::Bnf);
        assert_eq!(guess_notation(Path::new("math.BNF")), Notation::Bnf);
        assert_eq!(guess_notation(Path::new("math.ebnf")), Notation::Ebnf);
        assert_eq!(guess_notation(Path::new("math")), Notation::Ebnf);
    }

    #[test]
    fn test_lexer_from_json() {
        let lexer = lexer_from_json(
            r#"{"classes": [
                {"name": "int", "pattern": "[0-9]+", "kind": "token"},
                {"name": "ws", "pattern": "\\s+", "kind": "skip"}
            ]}"#,
        )
        .unwrap();
        let grammar = CompiledGrammar::from_bnf("<Sum> ::= <Token-int> \"+\" <Token-int>", lexer).unwrap();
        assert_eq!(grammar.parse("1 + 2").unwrap().tree_count(), 1);
        assert!(lexer_from_json(r#"{"classes": [{"name": "x"}]}"#).is_err());
    }

    #[test]
    fn test_compile_and_load() {
        let dir = std::env::temp_dir().join(format!("thicket-tools-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let grammar_path = dir.join("list.ebnf");
        let lexer_path = dir.join("lexer.json");
        fs::write(&grammar_path, "<List> ::= <Token-w>+").unwrap();
        fs::write(
            &lexer_path,
            r#"{"classes": [{"name": "w", "pattern": "[a-z]+", "kind": "token"}, {"name": "ws", "pattern": " +", "kind": "skip"}]}"#,
        )
        .unwrap();

        let text = GrammarText {
            grammar: grammar_path,
            lexer: Some(lexer_path),
            notation: None,
        };
        let compiled = compile_text(&text).unwrap();
        let blob = dir.join("list.thkt");
        compiled.save(&blob).unwrap();

        let source = GrammarSource {
            blob: Some(blob),
            grammar: None,
            lexer: None,
            notation: None,
        };
        let loaded = load_grammar(&source).unwrap();
        assert_eq!(loaded.parse("a b c").unwrap().tree_count(), 1);
        fs::remove_dir_all(&dir).unwrap();
    }
}
