//! Core label and transducer types shared across the compilation pipeline.
//!
//! Every stage of the pipeline works on vector transducers over the tropical
//! semiring; the aliases here fix that choice in one place and give the
//! integer label spaces domain names.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use rustfst::fst_impls::VectorFst;
use rustfst::prelude::*;

use crate::error::{ErrorContext, GraphError, Result};

/// Phone identifier used on lexicon input arcs and in context windows.
///
/// Phones are positive integers; [`NO_PHONE`] marks missing context at
/// utterance boundaries.
pub type Phone = Label;

/// Word identifier used on grammar arcs and lexicon output arcs.
pub type WordId = Label;

/// Transition identifier labelling the input arcs of a decoding graph.
///
/// Each id names one HMM state of a context-dependent phone; the same id
/// labels both the state's forward arc and its self-loop.
pub type TransitionId = Label;

/// The epsilon (no-symbol) label.
pub const EPSILON: Label = 0;

/// Placeholder phone for missing context at utterance boundaries.
pub const NO_PHONE: Phone = 0;

/// Vector transducer over the tropical semiring, the working representation
/// for every stage of the pipeline.
pub type StdVectorFst = VectorFst<TropicalWeight>;

/// Result of compiling a single utterance.
///
/// Compilation failure is a property of one utterance's grammar, not of the
/// run; fatal conditions are carried separately as
/// [`GraphError`](crate::error::GraphError).
#[derive(Debug, Clone)]
pub enum GraphOutcome {
    /// The grammar compiled into a usable decoding graph.
    Graph(StdVectorFst),
    /// The grammar has no path through the lexicon (out-of-vocabulary words
    /// or no path to a final state). The utterance is counted as failed and
    /// an empty graph is written under its key.
    Empty,
}

impl GraphOutcome {
    /// Whether compilation produced a usable graph.
    pub fn is_success(&self) -> bool {
        matches!(self, GraphOutcome::Graph(_))
    }

    /// The transducer to write under the utterance key. Failed utterances
    /// yield a structurally valid graph with no states.
    pub fn into_fst(self) -> StdVectorFst {
        match self {
            GraphOutcome::Graph(fst) => fst,
            GraphOutcome::Empty => StdVectorFst::new(),
        }
    }

    /// Borrowing accessor for the compiled graph, `None` on failure.
    pub fn as_fst(&self) -> Option<&StdVectorFst> {
        match self {
            GraphOutcome::Graph(fst) => Some(fst),
            GraphOutcome::Empty => None,
        }
    }
}

/// The set of disambiguation symbols reserved in the lexicon's phone
/// alphabet.
///
/// Disambiguation symbols carry no phonetic content; they exist so that
/// lexicons with homophones or prefix words stay determinizable. The set is
/// loaded once and shared read-only for the compiler's lifetime.
#[derive(Debug, Clone, Default)]
pub struct DisambigSymbols {
    symbols: Vec<Label>,
}

impl DisambigSymbols {
    /// An empty symbol set, for lexicons built without disambiguation.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the set from explicit symbol ids. Duplicates are dropped and
    /// the symbols are kept sorted; symbol 0 is rejected since it would
    /// collide with epsilon.
    pub fn from_symbols(symbols: impl IntoIterator<Item = Label>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut symbols: Vec<Label> = symbols
            .into_iter()
            .filter(|s| seen.insert(*s))
            .collect();
        if symbols.contains(&EPSILON) {
            return Err(GraphError::Config(
                "disambiguation symbol 0 collides with epsilon".to_string(),
            ));
        }
        symbols.sort_unstable();
        Ok(Self { symbols })
    }

    /// Load the set from a text file with one integer symbol id per line.
    /// Blank lines are ignored; any other non-integer content is a fatal
    /// configuration error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read disambiguation symbols {}", path.display()))?;
        let mut symbols = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let symbol: Label = line.parse().map_err(|_| {
                GraphError::Resource(format!(
                    "bad disambiguation symbol {:?} in {}",
                    line,
                    path.display()
                ))
            })?;
            symbols.push(symbol);
        }
        Self::from_symbols(symbols)
    }

    /// Whether `label` is a disambiguation symbol.
    pub fn contains(&self, label: Label) -> bool {
        self.symbols.binary_search(&label).is_ok()
    }

    /// The largest symbol in the set, if any.
    pub fn max(&self) -> Option<Label> {
        self.symbols.last().copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The symbols in ascending order.
    pub fn symbols(&self) -> &[Label] {
        &self.symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disambig_from_symbols_sorts_and_dedups() {
        let set = DisambigSymbols::from_symbols([7, 5, 7, 6]).unwrap();
        assert_eq!(set.symbols(), &[5, 6, 7]);
        assert_eq!(set.max(), Some(7));
        assert!(set.contains(6));
        assert!(!set.contains(4));
    }

    #[test]
    fn test_disambig_rejects_epsilon() {
        assert!(DisambigSymbols::from_symbols([0, 5]).is_err());
    }

    #[test]
    fn test_disambig_parse_from_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disambig.int");
        std::fs::write(&path, "5\n\n6\n").unwrap();
        let set = DisambigSymbols::load_from_file(&path).unwrap();
        assert_eq!(set.symbols(), &[5, 6]);

        std::fs::write(&path, "5\nnot-a-number\n").unwrap();
        assert!(DisambigSymbols::load_from_file(&path).is_err());
    }

    #[test]
    fn test_empty_outcome_yields_empty_fst() {
        let fst = GraphOutcome::Empty.into_fst();
        assert_eq!(fst.num_states(), 0);
        assert!(fst.start().is_none());
        assert!(!GraphOutcome::Empty.is_success());
    }
}
