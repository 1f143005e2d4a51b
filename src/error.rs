//! Custom error types for the training-graph compiler.
//!
//! This module provides a centralized error handling system using the
//! `thiserror` crate to define structured, typed errors with clear messages
//! and proper error conversion.
//!
//! Every variant of [`GraphError`] is fatal to the run. A grammar that
//! merely fails to compile is not an error; it is reported as
//! [`GraphOutcome::Empty`](crate::types::GraphOutcome) so the stream can
//! continue past bad utterances.

use std::io;
use thiserror::Error;

use crate::types::{Phone, TransitionId};

/// Primary error type for the crate, covering every unrecoverable fault.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Invalid option values or inconsistent run configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A resource file (tree, model, lexicon, symbol list) could not be
    /// read or parsed.
    #[error("resource error: {0}")]
    Resource(String),

    /// A keyed archive could not be read or written. Raised for decode
    /// failures and truncated streams as well; stream integrity is a
    /// resource property, never a per-utterance one.
    #[error("archive error: {0}")]
    Archive(String),

    /// Determinization failed, usually because the lexicon lacks
    /// disambiguation symbols.
    #[error("determinization failed: {0}")]
    Determinize(String),

    /// The context-dependency tree has no transition ids for a phone
    /// window; the lexicon and the tree disagree about the phone alphabet.
    #[error("no transition ids for context window {0:?}")]
    UnresolvedWindow(Vec<Phone>),

    /// A transition id produced by the tree has no transition-model entry.
    #[error("transition id {0} missing from the transition model")]
    UnresolvedTransitionId(TransitionId),

    /// A batch produced the wrong number of graphs. This signals a bug,
    /// not a data problem.
    #[error("batch produced {got} graphs for {expected} grammars")]
    BatchMismatch { expected: usize, got: usize },

    /// Errors bubbled up from the transducer library.
    #[error(transparent)]
    Fst(#[from] anyhow::Error),

    /// Errors from the underlying IO system.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience type alias for Results with GraphError.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to the error.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to the error.
    fn with_static_context(self, context: &'static str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| GraphError::Resource(format!("{}: {}", f(), e)))
    }

    fn with_static_context(self, context: &'static str) -> Result<T> {
        self.map_err(|e| GraphError::Resource(format!("{}: {}", context, e)))
    }
}
