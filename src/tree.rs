//! The context-dependency tree: phone windows to transition ids.
//!
//! The tree is built externally by acoustic-state clustering; this module
//! consumes it as a read-only lookup service. A window of `context_width`
//! phones (with [`NO_PHONE`](crate::types::NO_PHONE) for missing boundary
//! context) maps to the ordered transition ids of the HMM states realizing
//! the window's central phone. The mapping is deterministic: the same
//! window always yields the same ids.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, GraphError, Result};
use crate::types::{Phone, TransitionId};

/// Read-only mapping from phonetic context windows to transition ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextDependency {
    context_width: usize,
    central_position: usize,
    max_phone: Phone,
    windows: HashMap<Vec<Phone>, Vec<TransitionId>>,
}

impl ContextDependency {
    /// Build a tree from an explicit window table.
    ///
    /// `context_width` is the window length (1 for monophone, 3 for
    /// triphone), `central_position` the zero-based index of the phone a
    /// window describes, and `max_phone` the upper bound of the phone
    /// alphabet. Every window must have exactly `context_width` phones in
    /// `0..=max_phone` and at least one transition id; id 0 is reserved.
    pub fn new(
        context_width: usize,
        central_position: usize,
        max_phone: Phone,
        windows: HashMap<Vec<Phone>, Vec<TransitionId>>,
    ) -> Result<Self> {
        if context_width == 0 {
            return Err(GraphError::Resource(
                "context width must be at least 1".to_string(),
            ));
        }
        if central_position >= context_width {
            return Err(GraphError::Resource(format!(
                "central position {} outside context width {}",
                central_position, context_width
            )));
        }
        for (window, ids) in &windows {
            if window.len() != context_width {
                return Err(GraphError::Resource(format!(
                    "window {:?} has length {}, expected {}",
                    window,
                    window.len(),
                    context_width
                )));
            }
            if window.iter().any(|&p| p > max_phone) {
                return Err(GraphError::Resource(format!(
                    "window {:?} exceeds phone bound {}",
                    window, max_phone
                )));
            }
            if ids.is_empty() {
                return Err(GraphError::Resource(format!(
                    "window {:?} has no transition ids",
                    window
                )));
            }
            if ids.contains(&0) {
                return Err(GraphError::Resource(format!(
                    "window {:?} uses reserved transition id 0",
                    window
                )));
            }
        }
        Ok(Self {
            context_width,
            central_position,
            max_phone,
            windows,
        })
    }

    /// Deserialize a tree from its binary file form.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open tree file {}", path.display()))?;
        let tree: ContextDependency = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("failed to decode tree file {}", path.display()))?;
        // Re-run the constructor checks; the file may come from anywhere.
        Self::new(
            tree.context_width,
            tree.central_position,
            tree.max_phone,
            tree.windows,
        )
    }

    /// Serialize the tree to its binary file form.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create tree file {}", path.display()))?;
        bincode::serialize_into(BufWriter::new(file), self)
            .with_context(|| format!("failed to encode tree file {}", path.display()))
    }

    /// The ordered transition ids realizing `window`'s central phone, or
    /// `None` when the tree has no entry for the window.
    pub fn transition_ids(&self, window: &[Phone]) -> Option<&[TransitionId]> {
        self.windows.get(window).map(Vec::as_slice)
    }

    /// Window length.
    pub fn context_width(&self) -> usize {
        self.context_width
    }

    /// Zero-based index of the central phone within a window.
    pub fn central_position(&self) -> usize {
        self.central_position
    }

    /// Whether windows extend past the central phone, i.e. a phone's
    /// realization depends on what follows it.
    pub fn has_right_context(&self) -> bool {
        self.central_position + 1 < self.context_width
    }

    /// Upper bound of the phone alphabet.
    pub fn max_phone(&self) -> Phone {
        self.max_phone
    }

    /// Number of distinct windows.
    pub fn num_windows(&self) -> usize {
        self.windows.len()
    }

    /// Iterate over all (window, transition ids) entries.
    pub fn windows(&self) -> impl Iterator<Item = (&[Phone], &[TransitionId])> {
        self.windows
            .iter()
            .map(|(w, ids)| (w.as_slice(), ids.as_slice()))
    }
}
