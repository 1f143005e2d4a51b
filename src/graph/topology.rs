//! HMM topology insertion: context windows to transition ids.
//!
//! The H transducer maps transition-id sequences to context-window indices.
//! It has a single loop state; every window of the shared
//! [`IlabelTable`](crate::graph::IlabelTable) contributes a chain of forward
//! arcs that leaves the loop state and returns to it, emitting the window's
//! index on the first arc. Disambiguation entries get fresh input labels
//! past the transition-id range so the composed graph stays determinizable;
//! the labels are erased again after determinization.
//!
//! Self-loops are deliberately absent from H. Determinizing a graph whose
//! states all carry self-loops blows up, so the loops are attached by
//! [`add_self_loops`] as the last pipeline step.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use rustfst::prelude::*;

use crate::error::{GraphError, Result};
use crate::graph::context::{IlabelEntry, IlabelTable};
use crate::model::TransitionModel;
use crate::tree::ContextDependency;
use crate::types::{StdVectorFst, TransitionId, EPSILON};

/// The H transducer for one batch, with the label range reserved for
/// disambiguation entries.
#[derive(Debug)]
pub struct HTransducer {
    /// Transition ids in, context-window indices out, sorted on output
    /// labels for composition.
    pub fst: StdVectorFst,
    /// First input label standing in for a disambiguation symbol. Labels at
    /// or above this are erased by [`remove_disambig_symbols`] once
    /// determinization is done.
    pub first_disambig_label: Label,
}

/// Build the H transducer covering every entry of `table`.
///
/// Windows the tree cannot resolve and transition ids the model does not
/// know are fatal; they mean the tree and model were not trained together.
/// Chains are shared between table entries whose windows map to the same
/// transition ids, which happens routinely under tied context trees.
pub fn build_h(
    table: &IlabelTable,
    tree: &ContextDependency,
    model: &TransitionModel,
    transition_scale: f32,
) -> Result<HTransducer> {
    let mut fst = StdVectorFst::new();
    let loop_state = fst.add_state();
    fst.set_start(loop_state)?;
    fst.set_final(loop_state, TropicalWeight::one())?;

    let first_disambig_label = model.num_transition_ids() as Label + 1;
    let mut next_disambig = first_disambig_label;

    // Chain tails keyed by transition-id sequence; the value is the state
    // the entry arc from the loop state points at.
    let mut chains: HashMap<Vec<TransitionId>, StateId> = HashMap::new();

    for (index, entry) in table.iter() {
        match entry {
            IlabelEntry::Epsilon => {}
            IlabelEntry::Disambig(_) => {
                fst.add_tr(
                    loop_state,
                    Tr::new(next_disambig, index, TropicalWeight::one(), loop_state),
                )?;
                next_disambig += 1;
            }
            IlabelEntry::Window(window) => {
                let ids = tree
                    .transition_ids(window)
                    .ok_or_else(|| GraphError::UnresolvedWindow(window.clone()))?;

                let target = match chains.entry(ids.to_vec()) {
                    Entry::Occupied(occupied) => *occupied.get(),
                    Entry::Vacant(vacant) => {
                        let target = if ids.len() == 1 {
                            loop_state
                        } else {
                            let first = fst.add_state();
                            let mut prev = first;
                            for (i, &id) in ids.iter().enumerate().skip(1) {
                                let weight =
                                    model.info(id)?.forward_weight(transition_scale);
                                let next = if i + 1 == ids.len() {
                                    loop_state
                                } else {
                                    fst.add_state()
                                };
                                fst.add_tr(prev, Tr::new(id, EPSILON, weight, next))?;
                                prev = next;
                            }
                            first
                        };
                        vacant.insert(target);
                        target
                    }
                };

                let weight = model.info(ids[0])?.forward_weight(transition_scale);
                fst.add_tr(loop_state, Tr::new(ids[0], index, weight, target))?;
            }
        }
    }

    tr_sort(&mut fst, OLabelCompare {});
    Ok(HTransducer {
        fst,
        first_disambig_label,
    })
}

/// Replace the temporary disambiguation input labels with epsilon.
///
/// State ids and everything else are preserved; only input labels at or
/// above `first_disambig_label` change.
pub fn remove_disambig_symbols(
    fst: &StdVectorFst,
    first_disambig_label: Label,
) -> Result<StdVectorFst> {
    let mut out = StdVectorFst::new();
    out.add_states(fst.num_states());
    if let Some(start) = fst.start() {
        out.set_start(start)?;
    }
    for state in fst.states_iter() {
        if let Some(weight) = fst.final_weight(state)? {
            out.set_final(state, weight)?;
        }
        for tr in fst.get_trs(state)?.trs() {
            let ilabel = if tr.ilabel >= first_disambig_label {
                EPSILON
            } else {
                tr.ilabel
            };
            out.add_tr(state, Tr::new(ilabel, tr.olabel, tr.weight, tr.nextstate))?;
        }
    }
    Ok(out)
}

/// Incoming-arc class of a state copy. `None` covers epsilon arcs and the
/// start state; `Some(id)` covers arcs labelled with transition id `id`,
/// whose copy carries that id's self-loop.
type LoopClass = Option<TransitionId>;

/// Attach self-loops to a graph whose input labels are transition ids.
///
/// A transition id's self-loop belongs on the states reached by its forward
/// arcs. A state reachable through several different ids is split into one
/// copy per id so each copy loops with the right weight; all copies keep
/// the state's outgoing arcs and final weight. Ids whose HMM state has no
/// self-loop probability contribute a copy without a loop arc.
pub fn add_self_loops(
    fst: &StdVectorFst,
    model: &TransitionModel,
    self_loop_scale: f32,
) -> Result<StdVectorFst> {
    let start = match fst.start() {
        Some(start) => start,
        None => return Ok(StdVectorFst::new()),
    };

    let mut classes: Vec<BTreeSet<LoopClass>> = vec![BTreeSet::new(); fst.num_states()];
    classes[start as usize].insert(None);
    for state in fst.states_iter() {
        for tr in fst.get_trs(state)?.trs() {
            let class = if tr.ilabel == EPSILON {
                None
            } else {
                Some(tr.ilabel)
            };
            classes[tr.nextstate as usize].insert(class);
        }
    }

    let mut out = StdVectorFst::new();
    let mut copies: HashMap<(StateId, LoopClass), StateId> = HashMap::new();
    for state in fst.states_iter() {
        for &class in &classes[state as usize] {
            let copy = out.add_state();
            copies.insert((state, class), copy);
            if let Some(weight) = fst.final_weight(state)? {
                out.set_final(copy, weight)?;
            }
            if let Some(id) = class {
                if let Some(weight) = model.info(id)?.self_loop_weight(self_loop_scale) {
                    out.add_tr(copy, Tr::new(id, EPSILON, weight, copy))?;
                }
            }
        }
    }
    out.set_start(copies[&(start, None)])?;

    for state in fst.states_iter() {
        for tr in fst.get_trs(state)?.trs() {
            let class = if tr.ilabel == EPSILON {
                None
            } else {
                Some(tr.ilabel)
            };
            let target = copies[&(tr.nextstate, class)];
            for &source_class in &classes[state as usize] {
                let source = copies[&(state, source_class)];
                out.add_tr(source, Tr::new(tr.ilabel, tr.olabel, tr.weight, target))?;
            }
        }
    }

    Ok(out)
}
