//! The transition model: per-transition-id HMM topology.
//!
//! Estimated externally alongside the tree; consumed here as a read-only
//! lookup service. Transition ids are dense starting at 1, and every id the
//! tree can produce must resolve in this model. An id that does not resolve
//! is a configuration inconsistency that aborts the whole run.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rustfst::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, GraphError, Result};
use crate::types::{Phone, TransitionId};

/// Topology of one transition id: its phone and the probabilities of
/// staying put versus moving forward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionInfo {
    /// The phone this id belongs to.
    pub phone: Phone,
    /// Probability of the self-loop; zero means the HMM state has no loop.
    pub self_loop_prob: f32,
    /// Probability of the forward transition out of the HMM state.
    pub forward_prob: f32,
}

impl TransitionInfo {
    /// Weight of the forward arc under `scale`.
    ///
    /// A scale of exactly zero yields the identity weight, injecting no
    /// probability mass beyond the grammar's own; this is checked before
    /// the logarithm so a zero probability cannot poison the result.
    pub fn forward_weight(&self, scale: f32) -> TropicalWeight {
        if scale == 0.0 {
            return TropicalWeight::one();
        }
        TropicalWeight::new(scale * -self.forward_prob.ln())
    }

    /// Weight of the self-loop arc under `scale`, or `None` when the HMM
    /// state has no self-loop at all.
    pub fn self_loop_weight(&self, scale: f32) -> Option<TropicalWeight> {
        if self.self_loop_prob <= 0.0 {
            return None;
        }
        if scale == 0.0 {
            return Some(TropicalWeight::one());
        }
        Some(TropicalWeight::new(scale * -self.self_loop_prob.ln()))
    }
}

/// Read-only mapping from transition ids to their topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionModel {
    // records[i] describes transition id i + 1; id 0 is reserved.
    records: Vec<TransitionInfo>,
}

impl TransitionModel {
    /// Build a model from dense records; record `i` describes transition
    /// id `i + 1`.
    pub fn new(records: Vec<TransitionInfo>) -> Result<Self> {
        for (i, record) in records.iter().enumerate() {
            for (name, p) in [
                ("self-loop", record.self_loop_prob),
                ("forward", record.forward_prob),
            ] {
                if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                    return Err(GraphError::Resource(format!(
                        "transition id {}: {} probability {} outside [0, 1]",
                        i + 1,
                        name,
                        p
                    )));
                }
            }
        }
        Ok(Self { records })
    }

    /// Deserialize a model from its binary file form.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open transition model {}", path.display()))?;
        let model: TransitionModel = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("failed to decode transition model {}", path.display()))?;
        Self::new(model.records)
    }

    /// Serialize the model to its binary file form.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create transition model {}", path.display()))?;
        bincode::serialize_into(BufWriter::new(file), self)
            .with_context(|| format!("failed to encode transition model {}", path.display()))
    }

    /// Topology of `id`, or a fatal error when the id does not resolve.
    pub fn info(&self, id: TransitionId) -> Result<&TransitionInfo> {
        if id == 0 {
            return Err(GraphError::UnresolvedTransitionId(id));
        }
        self.records
            .get(id as usize - 1)
            .ok_or(GraphError::UnresolvedTransitionId(id))
    }

    /// Number of transition ids; valid ids are `1..=num_transition_ids()`.
    pub fn num_transition_ids(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_state_model() -> TransitionModel {
        TransitionModel::new(vec![
            TransitionInfo {
                phone: 1,
                self_loop_prob: 0.5,
                forward_prob: 0.5,
            },
            TransitionInfo {
                phone: 2,
                self_loop_prob: 0.0,
                forward_prob: 1.0,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_lookup_and_unresolved() {
        let model = two_state_model();
        assert_eq!(model.info(1).unwrap().phone, 1);
        assert_eq!(model.info(2).unwrap().phone, 2);
        assert!(matches!(
            model.info(0),
            Err(GraphError::UnresolvedTransitionId(0))
        ));
        assert!(matches!(
            model.info(3),
            Err(GraphError::UnresolvedTransitionId(3))
        ));
    }

    #[test]
    fn test_zero_scale_yields_identity_weights() {
        let model = two_state_model();
        let info = model.info(1).unwrap();
        assert_eq!(info.forward_weight(0.0), TropicalWeight::one());
        assert_eq!(info.self_loop_weight(0.0), Some(TropicalWeight::one()));
    }

    #[test]
    fn test_scaled_weights() {
        let model = two_state_model();
        let info = model.info(1).unwrap();
        let w = info.forward_weight(1.0);
        assert!((*w.value() - 0.5_f32.ln().abs()).abs() < 1e-6);
        let w = info.forward_weight(0.5);
        assert!((*w.value() - 0.5 * 0.5_f32.ln().abs()).abs() < 1e-6);
    }

    #[test]
    fn test_loopless_state_has_no_loop_weight() {
        let model = two_state_model();
        assert_eq!(model.info(2).unwrap().self_loop_weight(1.0), None);
    }

    #[test]
    fn test_rejects_bad_probabilities() {
        assert!(TransitionModel::new(vec![TransitionInfo {
            phone: 1,
            self_loop_prob: 1.5,
            forward_prob: 0.5,
        }])
        .is_err());
        assert!(TransitionModel::new(vec![TransitionInfo {
            phone: 1,
            self_loop_prob: f32::NAN,
            forward_prob: 0.5,
        }])
        .is_err());
    }

    #[test]
    fn test_binary_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let model = two_state_model();
        model.write(&path).unwrap();
        let loaded = TransitionModel::read(&path).unwrap();
        assert_eq!(loaded.num_transition_ids(), 2);
        assert_eq!(loaded.info(1).unwrap(), model.info(1).unwrap());
    }
}
