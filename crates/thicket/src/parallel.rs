//! # Parallel Parsing Support
//!
//! Two ways of keeping parses off the caller's thread:
//!
//! - [`ParallelParser`] parses a batch of sources at once, on rayon's pool
//!   when the `parallel` feature is enabled and sequentially otherwise
//! - [`ParseWorker`] owns one grammar on a dedicated thread and answers
//!   parse requests submitted from anywhere
//!
//! A compiled grammar is never mutated by parsing, so one instance behind
//! an [`Arc`] serves every thread.

use crate::brnglr::{Parser, ParserConfig};
use crate::compile::CompiledGrammar;
use crate::error::ParseError;
use crate::sppf::Forest;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[cfg(feature = "serialize")]
use crate::error::PersistError;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Result of parsing one source of a batch
#[derive(Debug)]
pub struct BatchResult {
    /// The identifier the source was added with
    pub id: String,
    pub forest: Result<Forest, ParseError>,
    pub duration: Duration,
}

impl BatchResult {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.forest.is_ok()
    }
}

/// Sources to parse together: `(id, source)`
#[derive(Debug, Clone, Default)]
pub struct ParseBatch {
    pub sources: Vec<(String, String)>,
}

impl ParseBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: impl Into<String>, source: impl Into<String>) {
        self.sources.push((id.into(), source.into()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Configuration for batch parsing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Worker threads for a batch; rayon's global pool when `None`
    pub num_threads: Option<usize>,
}

/// Parses batches of sources against one shared grammar
#[derive(Debug, Clone)]
pub struct ParallelParser {
    grammar: Arc<CompiledGrammar>,
    config: ParallelConfig,
    parser: ParserConfig,
}

impl ParallelParser {
    #[must_use]
    pub fn new(grammar: Arc<CompiledGrammar>) -> Self {
        Self {
            grammar,
            config: ParallelConfig::default(),
            parser: ParserConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ParallelConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_parser_config(mut self, config: ParserConfig) -> Self {
        self.parser = config;
        self
    }

    #[must_use]
    pub const fn grammar(&self) -> &Arc<CompiledGrammar> {
        &self.grammar
    }

    fn parse_one(&self, id: &str, source: &str) -> BatchResult {
        let start = Instant::now();
        let forest = Parser::new(&self.grammar)
            .with_config(self.parser.clone())
            .parse(source);
        BatchResult {
            id: id.to_string(),
            forest,
            duration: start.elapsed(),
        }
    }

    /// Parse every source of `batch`; results come back in batch order
    #[cfg(feature = "parallel")]
    pub fn parse_batch(&self, batch: &ParseBatch) -> Vec<BatchResult> {
        let run = || -> Vec<BatchResult> {
            batch
                .sources
                .par_iter()
                .map(|(id, source)| self.parse_one(id, source))
                .collect()
        };
        match self.config.num_threads {
            Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(run),
                Err(err) => {
                    tracing::warn!(%err, threads, "could not build thread pool, using the global one");
                    run()
                }
            },
            None => run(),
        }
    }

    /// Sequential fallback when the `parallel` feature is disabled
    #[cfg(not(feature = "parallel"))]
    pub fn parse_batch(&self, batch: &ParseBatch) -> Vec<BatchResult> {
        batch
            .sources
            .iter()
            .map(|(id, source)| self.parse_one(id, source))
            .collect()
    }
}

struct Job {
    source: String,
    reply: mpsc::Sender<Result<Forest, ParseError>>,
}

/// A pending answer from a [`ParseWorker`]
#[derive(Debug)]
pub struct ParseTicket {
    reply: mpsc::Receiver<Result<Forest, ParseError>>,
}

impl ParseTicket {
    /// Block until the parse finishes.
    ///
    /// # Errors
    ///
    /// The parse's own error, or [`ParseError::Internal`] if the worker
    /// stopped before answering.
    pub fn wait(self) -> Result<Forest, ParseError> {
        self.reply
            .recv()
            .unwrap_or_else(|_| Err(ParseError::internal("parse worker stopped")))
    }

    /// The result, if the parse has finished
    #[must_use]
    pub fn try_wait(&self) -> Option<Result<Forest, ParseError>> {
        match self.reply.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(ParseError::internal("parse worker stopped"))),
        }
    }
}

/// A thread dedicated to parsing with one grammar.
///
/// Jobs run one at a time in submission order. Dropping the worker lets
/// the current job finish and then stops the thread.
#[derive(Debug)]
pub struct ParseWorker {
    jobs: Option<mpsc::Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl ParseWorker {
    /// Start a worker sharing an already compiled grammar
    ///
    /// # Errors
    ///
    /// Fails if the thread cannot be spawned.
    pub fn spawn(grammar: Arc<CompiledGrammar>, config: ParserConfig) -> std::io::Result<Self> {
        let (jobs, inbox) = mpsc::channel::<Job>();
        let handle = std::thread::Builder::new()
            .name("thicket-parse-worker".into())
            .spawn(move || serve(&grammar, &config, &inbox))?;
        Ok(Self {
            jobs: Some(jobs),
            handle: Some(handle),
        })
    }

    /// Start a worker whose setup step restores a grammar saved with
    /// [`CompiledGrammar::to_bytes`]. Returns once the grammar is loaded.
    ///
    /// # Errors
    ///
    /// Any [`PersistError`] from decoding the blob, or an I/O error if the
    /// thread cannot be spawned.
    #[cfg(feature = "serialize")]
    pub fn spawn_from_bytes(bytes: Vec<u8>, config: ParserConfig) -> Result<Self, PersistError> {
        let (ready, setup) = mpsc::channel::<Result<(), PersistError>>();
        let (jobs, inbox) = mpsc::channel::<Job>();
        let handle = std::thread::Builder::new()
            .name("thicket-parse-worker".into())
            .spawn(move || match CompiledGrammar::from_bytes(&bytes) {
                Ok(grammar) => {
                    let _ = ready.send(Ok(()));
                    serve(&grammar, &config, &inbox);
                }
                Err(err) => {
                    let _ = ready.send(Err(err));
                }
            })?;

        match setup.recv() {
            Ok(Ok(())) => Ok(Self {
                jobs: Some(jobs),
                handle: Some(handle),
            }),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => Err(PersistError::Io(std::io::Error::other(
                "parse worker exited during setup",
            ))),
        }
    }

    /// Queue `source` for parsing
    pub fn submit(&self, source: impl Into<String>) -> ParseTicket {
        let (reply, answer) = mpsc::channel();
        if let Some(jobs) = &self.jobs {
            // a failed send drops `reply`, which the ticket reports
            let _ = jobs.send(Job {
                source: source.into(),
                reply,
            });
        }
        ParseTicket { reply: answer }
    }

    /// Stop accepting jobs and wait for the thread to finish
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("parse worker panicked");
            }
        }
    }
}

impl Drop for ParseWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(grammar: &CompiledGrammar, config: &ParserConfig, inbox: &mpsc::Receiver<Job>) {
    let parser = Parser::new(grammar).with_config(config.clone());
    let mut served = 0usize;
    for job in inbox {
        let _ = job.reply.send(parser.parse(&job.source));
        served += 1;
    }
    tracing::debug!(served, "parse worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::LexerBuilder;

    fn grammar() -> Arc<CompiledGrammar> {
        Arc::new(
            CompiledGrammar::from_bnf(
                "<Sum> ::= <Sum> \"+\" <Token-int> | <Token-int>",
                LexerBuilder::new().token("int", "[0-9]+").skip("ws", r"\s+"),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_batch_keeps_order() {
        let mut batch = ParseBatch::new();
        batch.add("a", "1 + 2");
        batch.add("b", "1 +");
        batch.add("c", "3");
        let results = ParallelParser::new(grammar()).parse_batch(&batch);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(results[0].is_ok());
        assert!(!results[1].is_ok());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_worker_round_trip() {
        let worker = ParseWorker::spawn(grammar(), ParserConfig::default()).unwrap();
        let first = worker.submit("1 + 2 + 3");
        let second = worker.submit("+");
        assert_eq!(first.wait().unwrap().tree_count(), 1);
        assert!(matches!(second.wait(), Err(ParseError::UnexpectedToken { .. })));
        worker.shutdown();
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_worker_from_bytes() {
        let bytes = grammar().to_bytes().unwrap();
        let worker = ParseWorker::spawn_from_bytes(bytes, ParserConfig::default()).unwrap();
        assert!(worker.submit("4 + 5").wait().is_ok());
        assert!(ParseWorker::spawn_from_bytes(vec![1, 2, 3], ParserConfig::default()).is_err());
    }
}
