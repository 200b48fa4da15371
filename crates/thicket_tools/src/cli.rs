//! CLI interface for thicket-tools

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thicket::Notation;

#[derive(Parser, Debug)]
#[command(name = "thicket")]
#[command(about = "Compile grammars and inspect the parse forests they produce")]
#[command(version)]
pub struct Cli {
    /// Log parser activity to stderr; `RUST_LOG` refines the filter
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile grammar text and a lexer description into a grammar blob
    Compile {
        #[command(flatten)]
        text: GrammarText,

        /// Where to write the blob
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Parse input and print its trees
    Parse {
        #[command(flatten)]
        source: GrammarSource,

        /// File to parse
        #[arg(short, long, conflicts_with = "text")]
        input: Option<PathBuf>,

        /// Text to parse, instead of a file
        #[arg(short, long)]
        text: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Sexpr)]
        format: OutputFormat,

        /// Print at most this many trees
        #[arg(long, default_value_t = 16)]
        max_trees: u64,

        /// Keep the forest as the parser built it
        #[arg(long)]
        raw: bool,
    },

    /// Print what a compiled grammar consists of
    Inspect {
        #[command(flatten)]
        source: GrammarSource,

        /// Also print every automaton state
        #[arg(long)]
        states: bool,

        /// Print the rule graph in DOT format instead
        #[arg(long, conflicts_with = "states")]
        dot: bool,
    },
}

/// Grammar text plus the lexer it is read with
#[derive(Args, Debug, Clone)]
pub struct GrammarText {
    /// Grammar file in BNF or EBNF
    #[arg(short, long)]
    pub grammar: PathBuf,

    /// JSON lexer description: `{"classes": [{"name", "pattern", "kind"}]}`
    #[arg(short, long)]
    pub lexer: Option<PathBuf>,

    /// Grammar notation; guessed from the file extension when omitted
    #[arg(short, long, value_enum)]
    pub notation: Option<NotationArg>,
}

/// Either a compiled blob or grammar text to compile on the spot
#[derive(Args, Debug, Clone)]
pub struct GrammarSource {
    /// Grammar blob written by `thicket compile`
    #[arg(short, long, conflicts_with_all = ["grammar", "lexer", "notation"], required_unless_present = "grammar")]
    pub blob: Option<PathBuf>,

    /// Grammar file in BNF or EBNF
    #[arg(short, long)]
    pub grammar: Option<PathBuf>,

    /// JSON lexer description
    #[arg(short, long)]
    pub lexer: Option<PathBuf>,

    /// Grammar notation; guessed from the file extension when omitted
    #[arg(short, long, value_enum)]
    pub notation: Option<NotationArg>,
}

impl GrammarSource {
    /// The grammar text arguments, when no blob was given
    #[must_use]
    pub fn text(&self) -> Option<GrammarText> {
        self.grammar.as_ref().map(|grammar| GrammarText {
            grammar: grammar.clone(),
            lexer: self.lexer.clone(),
            notation: self.notation,
        })
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotationArg {
    Bnf,
    Ebnf,
}

impl From<NotationArg> for Notation {
    fn from(arg: NotationArg) -> Self {
        match arg {
            NotationArg::Bnf => Self::Bnf,
            NotationArg::Ebnf => Self::Ebnf,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// One s-expression per tree
    Sexpr,
    /// The trees as a JSON array
    Json,
    /// The forest in DOT format
    Dot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        let cli = Cli::try_parse_from([
            "thicket", "parse", "--blob", "math.thkt", "--text", "1 + 2", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Parse {
                source,
                text,
                format,
                max_trees,
                ..
            } => {
                assert_eq!(source.blob, Some(PathBuf::from("math.thkt")));
                assert!(source.text().is_none());
                assert_eq!(text.as_deref(), Some("1 + 2"));
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(max_trees, 16);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_blob_excludes_grammar() {
        assert!(Cli::try_parse_from([
            "thicket", "inspect", "--blob", "a.thkt", "--grammar", "a.bnf",
        ])
        .is_err());
        assert!(Cli::try_parse_from(["thicket", "inspect"]).is_err());
    }

    #[test]
    fn test_compile_command() {
        let cli = Cli::try_parse_from([
            "thicket", "-v", "compile", "-g", "math.ebnf", "-l", "lexer.json", "-o", "math.thkt",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Compile { text, output } = cli.command else {
            panic!("expected compile");
        };
        assert_eq!(text.grammar, PathBuf::from("math.ebnf"));
        assert_eq!(text.notation, None);
        assert_eq!(output, PathBuf::from("math.thkt"));
    }
}
