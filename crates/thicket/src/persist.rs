//! # Persisted Grammars
//!
//! Building the automaton is the expensive part of compiling a grammar, so
//! a [`CompiledGrammar`] can be written out once and restored at startup.
//!
//! ## Format
//!
//! | bytes | content |
//! |---|---|
//! | 4 | magic `THKT` |
//! | 4 | format version, little endian |
//! | rest | zlib stream of the bincode-encoded rule table, automaton, epsilon forest and lexer classes |
//!
//! Regular expressions are not stored; they are compiled again on load.

use crate::compile::CompiledGrammar;
use crate::epsilon::EpsilonForest;
use crate::error::PersistError;
use crate::grammar::Grammar;
use crate::lalr::Automaton;
use crate::lexer::LexerSpec;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

const MAGIC: &[u8; 4] = b"THKT";

/// Bumped whenever the encoded layout changes
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    grammar: &'a Grammar,
    automaton: &'a Automaton,
    epsilon: &'a EpsilonForest,
    lexer: &'a LexerSpec,
}

#[derive(Deserialize)]
struct Snapshot {
    grammar: Grammar,
    automaton: Automaton,
    epsilon: EpsilonForest,
    lexer: LexerSpec,
}

impl CompiledGrammar {
    /// Encode the grammar as a self-describing blob.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Codec`] or [`PersistError::Io`] if encoding
    /// or compression fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&FORMAT_VERSION.to_le_bytes());

        let mut encoder = ZlibEncoder::new(header, Compression::default());
        bincode::serialize_into(
            &mut encoder,
            &SnapshotRef {
                grammar: self.grammar(),
                automaton: self.automaton(),
                epsilon: self.epsilon(),
                lexer: self.lexer().spec(),
            },
        )?;
        encoder.flush()?;
        let bytes = encoder.finish()?;
        tracing::debug!(bytes = bytes.len(), "compiled grammar encoded");
        Ok(bytes)
    }

    /// Restore a grammar written by [`CompiledGrammar::to_bytes`].
    ///
    /// # Errors
    ///
    /// - [`PersistError::BadMagic`] if `bytes` is not a compiled grammar
    /// - [`PersistError::VersionMismatch`] for a blob from another format
    ///   version
    /// - [`PersistError::Codec`] for a corrupt body
    /// - [`PersistError::Rebuild`] if a stored pattern no longer compiles
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(PersistError::BadMagic);
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..HEADER_LEN]);
        let found = u32::from_le_bytes(version);
        if found != FORMAT_VERSION {
            return Err(PersistError::VersionMismatch {
                found,
                expected: FORMAT_VERSION,
            });
        }

        let snapshot: Snapshot = bincode::deserialize_from(ZlibDecoder::new(&bytes[HEADER_LEN..]))?;
        let compiled = Self::from_parts(
            snapshot.grammar,
            snapshot.automaton,
            snapshot.epsilon,
            snapshot.lexer,
        )?;
        tracing::debug!(bytes = bytes.len(), "compiled grammar restored");
        Ok(compiled)
    }

    /// Write [`CompiledGrammar::to_bytes`] to `path`
    ///
    /// # Errors
    ///
    /// See [`CompiledGrammar::to_bytes`]; also fails if the file cannot be
    /// written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Read a grammar saved with [`CompiledGrammar::save`]
    ///
    /// # Errors
    ///
    /// See [`CompiledGrammar::from_bytes`]; also fails if the file cannot
    /// be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        Self::from_bytes(&std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::LexerBuilder;

    fn grammar() -> CompiledGrammar {
        CompiledGrammar::from_ebnf(
            "<Args> ::= <Token-int> ( \",\" <Token-int> )*",
            LexerBuilder::new().token("int", "[0-9]+").skip("ws", r"\s+"),
        )
        .unwrap()
    }

    #[test]
    fn test_header() {
        let bytes = grammar().to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"THKT");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), FORMAT_VERSION);
    }

    #[test]
    fn test_rejects_foreign_data() {
        assert!(matches!(
            CompiledGrammar::from_bytes(b"nope"),
            Err(PersistError::BadMagic)
        ));
        let mut bytes = grammar().to_bytes().unwrap();
        bytes[4] = 99;
        assert!(matches!(
            CompiledGrammar::from_bytes(&bytes),
            Err(PersistError::VersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn test_restored_grammar_parses() {
        let original = grammar();
        let restored = CompiledGrammar::from_bytes(&original.to_bytes().unwrap()).unwrap();
        assert_eq!(
            restored.automaton().states().len(),
            original.automaton().states().len()
        );
        let forest = restored.parse("1, 2, 3").unwrap();
        assert_eq!(forest.tree_count(), 1);
        assert_eq!(
            forest.trees()[0].to_sexpr(),
            original.parse("1, 2, 3").unwrap().trees()[0].to_sexpr()
        );
    }
}
