//! Thicket Tools CLI
//!
//! Command-line tools for compiling grammars and inspecting parse forests.

use clap::Parser;
use std::error::Error;
use std::fs;
use thicket::{CompiledGrammar, Forest, ParserConfig};
use thicket_tools::cli::{Cli, Commands, OutputFormat};
use thicket_tools::{compile_text, forest_dot, grammar_dot, load_grammar};

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    if !verbose {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("thicket=debug,thicket_tools=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_trees(forest: &Forest, format: OutputFormat, max_trees: u64) -> Result<(), Box<dyn Error>> {
    let total = forest.tree_count();
    match format {
        OutputFormat::Sexpr => {
            for tree in forest.iter_trees().take(usize::try_from(max_trees).unwrap_or(usize::MAX)) {
                println!("{}", tree.to_sexpr());
            }
            if total > max_trees {
                eprintln!("... {} more trees", total - max_trees);
            }
        }
        OutputFormat::Json => {
            let trees: Vec<_> = forest
                .iter_trees()
                .take(usize::try_from(max_trees).unwrap_or(usize::MAX))
                .collect();
            let json = serde_json::json!({
                "tree_count": total,
                "ambiguous": forest.is_ambiguous(),
                "trees": trees,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Dot => print!("{}", forest_dot(forest)),
    }
    Ok(())
}

fn inspect(grammar: &CompiledGrammar, states: bool, dot: bool) {
    if dot {
        print!("{}", grammar_dot(grammar.grammar()));
        return;
    }
    let automaton = grammar.automaton();
    let actions: usize = automaton
        .states()
        .iter()
        .map(|s| s.shifts.len() + s.gotos.len() + s.reductions.len())
        .sum();
    println!("rules:          {}", grammar.grammar().rules().len());
    println!("terminals:      {}", grammar.grammar().terminals().len());
    println!("states:         {}", automaton.states().len());
    println!("actions:        {actions}");
    println!("conflicts:      {}", automaton.conflicts());
    println!("epsilon nodes:  {}", grammar.epsilon().len());
    println!("lexer classes:  {}", grammar.lexer().spec().classes.len());
    if states {
        println!();
        println!("{}", automaton.describe(grammar.grammar()));
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compile { text, output } => {
            let grammar = compile_text(&text)?;
            grammar.save(&output)?;
            println!(
                "Wrote {} ({} states) to {}",
                text.grammar.display(),
                grammar.automaton().states().len(),
                output.display()
            );
        }
        Commands::Parse {
            source,
            input,
            text,
            format,
            max_trees,
            raw,
        } => {
            let grammar = load_grammar(&source)?;
            let input = match (input, text) {
                (Some(path), _) => fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {}: {e}", path.display()))?,
                (None, Some(text)) => text,
                (None, None) => std::io::read_to_string(std::io::stdin())?,
            };
            let config = ParserConfig::default().with_default_transforms(!raw);
            let forest = grammar.parser().with_config(config).parse(&input)?;
            let stats = forest.stats();
            tracing::info!(
                trees = forest.tree_count(),
                sppf_nodes = stats.sppf_nodes,
                gss_nodes = stats.gss_nodes,
                rejected = stats.rejected,
                "parsed"
            );
            print_trees(&forest, format, max_trees)?;
        }
        Commands::Inspect { source, states, dot } => {
            let grammar = load_grammar(&source)?;
            inspect(&grammar, states, dot);
        }
    }

    Ok(())
}
