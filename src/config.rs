//! Run configuration and built-in defaults.
//!
//! This module centralizes the configuration surface of the compiler:
//! default option values and the validated per-run settings assembled from
//! command-line arguments.

use std::path::PathBuf;

use crate::error::{GraphError, Result};

/// Built-in option defaults.
pub mod defaults {
    /// Scale on transition probabilities. Zero omits them entirely, the
    /// expected mode for training graphs since probabilities are
    /// reintroduced during alignment.
    pub const TRANSITION_SCALE: f32 = 0.0;

    /// Scale on self-loop probabilities. Zero omits them, as above.
    pub const SELF_LOOP_SCALE: f32 = 0.0;

    /// Utterances compiled per internal batch. Larger values trade memory
    /// for fewer repeated setup costs.
    pub const BATCH_SIZE: usize = 250;
}

/// Validated settings for one compilation run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Context-dependency tree file.
    pub tree_path: PathBuf,

    /// Transition model file.
    pub model_path: PathBuf,

    /// Lexicon transducer file.
    pub lexicon_path: PathBuf,

    /// Input archive of per-utterance grammar transducers.
    pub grammars_path: PathBuf,

    /// Output archive of decoding graphs.
    pub graphs_path: PathBuf,

    /// Optional file listing disambiguation symbol ids, one per line.
    pub disambig_path: Option<PathBuf>,

    /// Scale on transition probabilities.
    pub transition_scale: f32,

    /// Scale on self-loop probabilities.
    pub self_loop_scale: f32,

    /// Utterances per internal batch. A batch size of one routes every
    /// utterance through the single-graph path.
    pub batch_size: usize,
}

impl RunConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(GraphError::Config(
                "batch size must be at least 1".to_string(),
            ));
        }

        for (name, scale) in [
            ("transition scale", self.transition_scale),
            ("self-loop scale", self.self_loop_scale),
        ] {
            if !scale.is_finite() {
                return Err(GraphError::Config(format!("{} must be finite", name)));
            }
            if scale < 0.0 {
                return Err(GraphError::Config(format!(
                    "{} must not be negative, got {}",
                    name, scale
                )));
            }
        }

        Ok(())
    }
}
