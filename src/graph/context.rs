//! Context expansion: phone labels to context-window labels.
//!
//! The expansion rewrites an LG transducer (phones in, words out) into CLG
//! (context-window indices in, words out). A phone's acoustic realization
//! depends on its neighbors, so each phone label fans out into one label
//! per surrounding context; that fan-out is a product construction against
//! an implicit context transducer whose states are the last
//! `context_width - 1` phones seen. The context transducer's state space is
//! unbounded, so it is discovered lazily by breadth-first search instead of
//! materialized for a generic library composition.
//!
//! Output labels are indices into an [`IlabelTable`] shared by all
//! utterances of a batch, which is what lets the H transducer be built once
//! per batch rather than once per utterance.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use rustfst::prelude::*;

use crate::error::Result;
use crate::tree::ContextDependency;
use crate::types::{DisambigSymbols, Phone, StdVectorFst, EPSILON, NO_PHONE};

/// One entry of the context-expansion output alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IlabelEntry {
    /// The epsilon entry, always at index 0.
    Epsilon,
    /// A full context window whose central phone is realized.
    Window(Vec<Phone>),
    /// A disambiguation symbol passed through the expansion unchanged.
    Disambig(Label),
}

/// Dense numbering of the symbols produced by context expansion.
///
/// The table grows as windows are first seen and never forgets an entry,
/// so indices stay stable across the utterances sharing it.
#[derive(Debug)]
pub struct IlabelTable {
    entries: Vec<IlabelEntry>,
    index: HashMap<IlabelEntry, Label>,
}

impl IlabelTable {
    pub fn new() -> Self {
        let mut table = IlabelTable {
            entries: vec![IlabelEntry::Epsilon],
            index: HashMap::new(),
        };
        table.index.insert(IlabelEntry::Epsilon, EPSILON);
        table
    }

    /// Index of `entry`, assigning the next free index on first sight.
    pub fn intern(&mut self, entry: IlabelEntry) -> Label {
        if let Some(&idx) = self.index.get(&entry) {
            return idx;
        }
        let idx = self.entries.len() as Label;
        self.entries.push(entry.clone());
        self.index.insert(entry, idx);
        idx
    }

    /// The entry at `label`, if assigned.
    pub fn get(&self, label: Label) -> Option<&IlabelEntry> {
        self.entries.get(label as usize)
    }

    /// Iterate entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Label, &IlabelEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i as Label, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for IlabelTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand `lg` against the context-dependency tree.
///
/// Expander states are pairs of an LG state and a history of the last
/// `context_width - 1` phones, initialized to [`NO_PHONE`]. Consuming a
/// phone forms the window `history ++ [phone]`; the arc emits the window's
/// table index when the central slot is a real phone and epsilon while the
/// window is still filling. The subsequential symbol participates as
/// [`NO_PHONE`], which is how pending right context drains at path end.
/// Disambiguation symbols and epsilon pass through without advancing the
/// history.
///
/// A pair state is final iff its LG state is final and nothing right of
/// the central slot remains unemitted. The result is trimmed; an empty
/// result means this utterance's grammar has no path through the lexicon,
/// which the caller treats as a per-utterance failure.
pub fn expand_context(
    lg: StdVectorFst,
    tree: &ContextDependency,
    disambig: &DisambigSymbols,
    subseq_symbol: Label,
    table: &mut IlabelTable,
) -> Result<StdVectorFst> {
    let width = tree.context_width();
    let central = tree.central_position();

    let mut out = StdVectorFst::new();
    let lg_start = match lg.start() {
        Some(s) => s,
        None => return Ok(out),
    };

    let mut state_map: HashMap<(StateId, Vec<Phone>), StateId> = HashMap::new();
    let mut queue: VecDeque<(StateId, Vec<Phone>, StateId)> = VecDeque::new();

    let init_hist = vec![NO_PHONE; width - 1];
    let start = out.add_state();
    out.set_start(start)?;
    state_map.insert((lg_start, init_hist.clone()), start);
    queue.push_back((lg_start, init_hist, start));

    while let Some((lg_state, hist, current)) = queue.pop_front() {
        if hist[central..].iter().all(|&p| p == NO_PHONE) {
            if let Some(weight) = lg.final_weight(lg_state)? {
                if weight != TropicalWeight::zero() {
                    out.set_final(current, weight)?;
                }
            }
        }

        for tr in lg.get_trs(lg_state)?.trs() {
            let (ilabel, next_hist) = if tr.ilabel == EPSILON {
                (EPSILON, hist.clone())
            } else if disambig.contains(tr.ilabel) {
                (table.intern(IlabelEntry::Disambig(tr.ilabel)), hist.clone())
            } else {
                let phone = if tr.ilabel == subseq_symbol {
                    NO_PHONE
                } else {
                    tr.ilabel
                };
                let mut window = Vec::with_capacity(width);
                window.extend_from_slice(&hist);
                window.push(phone);
                let ilabel = if window[central] != NO_PHONE {
                    table.intern(IlabelEntry::Window(window.clone()))
                } else {
                    EPSILON
                };
                let next_hist = window[1..].to_vec();
                (ilabel, next_hist)
            };

            // Flush arcs that emit nothing and reach no new state would
            // only add epsilon self-loops.
            if tr.ilabel == subseq_symbol
                && ilabel == EPSILON
                && tr.nextstate == lg_state
                && next_hist == hist
            {
                continue;
            }

            let target = match state_map.entry((tr.nextstate, next_hist)) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    let state = out.add_state();
                    queue.push_back((entry.key().0, entry.key().1.clone(), state));
                    entry.insert(state);
                    state
                }
            };

            out.add_tr(current, Tr::new(ilabel, tr.olabel, tr.weight, target))?;
        }
    }

    connect(&mut out)?;
    Ok(out)
}
