//! Shared test resources: a small cat/hat lexicon with a matching triphone
//! tree and transition model, plus graph comparison helpers.
//!
//! The tree covers every context window reachable from sequences over the
//! two words, so tests can compile multi-word grammars without tripping
//! over missing windows.

use std::collections::HashMap;

use rustfst::prelude::*;

use crate::model::{TransitionInfo, TransitionModel};
use crate::tree::ContextDependency;
use crate::types::{DisambigSymbols, Phone, StdVectorFst, WordId, EPSILON};

pub(crate) const K: Phone = 1;
pub(crate) const AE: Phone = 2;
pub(crate) const T: Phone = 3;
pub(crate) const HH: Phone = 4;

pub(crate) const WORD_CAT: WordId = 1;
pub(crate) const WORD_HAT: WordId = 2;
pub(crate) const WORD_DOG: WordId = 3;

pub(crate) const DISAMBIG_ONE: Label = 5;

/// Triphone tree with one transition id per window, covering all windows
/// over cat/hat word sequences.
pub(crate) fn triphone_tree() -> ContextDependency {
    let windows = HashMap::from([
        (vec![0, K, AE], vec![1]),
        (vec![K, AE, T], vec![2]),
        (vec![AE, T, 0], vec![3]),
        (vec![0, HH, AE], vec![4]),
        (vec![HH, AE, T], vec![5]),
        (vec![AE, T, K], vec![6]),
        (vec![AE, T, HH], vec![7]),
        (vec![T, K, AE], vec![8]),
        (vec![T, HH, AE], vec![9]),
    ]);
    ContextDependency::new(3, 1, HH, windows).unwrap()
}

/// Transition model matching [`triphone_tree`]; every HMM state has
/// half/half loop and forward probability.
pub(crate) fn transition_model() -> TransitionModel {
    let phones = [K, AE, T, HH, AE, T, T, K, HH];
    let records = phones
        .iter()
        .map(|&phone| TransitionInfo {
            phone,
            self_loop_prob: 0.5,
            forward_prob: 0.5,
        })
        .collect();
    TransitionModel::new(records).unwrap()
}

pub(crate) fn disambig() -> DisambigSymbols {
    DisambigSymbols::from_symbols([DISAMBIG_ONE]).unwrap()
}

/// Lexicon accepting any sequence over {cat, hat}, each pronunciation
/// closed by the disambiguation symbol and returning to the root.
pub(crate) fn lexicon() -> StdVectorFst {
    let mut fst = StdVectorFst::new();
    let root = fst.add_state();
    fst.set_start(root).unwrap();
    fst.set_final(root, TropicalWeight::one()).unwrap();
    add_pronunciation(&mut fst, root, WORD_CAT, &[K, AE, T]);
    add_pronunciation(&mut fst, root, WORD_HAT, &[HH, AE, T]);
    fst
}

fn add_pronunciation(fst: &mut StdVectorFst, root: StateId, word: WordId, phones: &[Phone]) {
    let mut state = root;
    for (i, &phone) in phones.iter().enumerate() {
        let olabel = if i == 0 { word } else { EPSILON };
        let next = fst.add_state();
        fst.add_tr(state, Tr::new(phone, olabel, TropicalWeight::one(), next))
            .unwrap();
        state = next;
    }
    fst.add_tr(
        state,
        Tr::new(DISAMBIG_ONE, EPSILON, TropicalWeight::one(), root),
    )
    .unwrap();
}

/// Linear grammar acceptor over the given word sequence, all weights one.
pub(crate) fn grammar(words: &[WordId]) -> StdVectorFst {
    let mut fst = StdVectorFst::new();
    let mut state = fst.add_state();
    fst.set_start(state).unwrap();
    for &word in words {
        let next = fst.add_state();
        fst.add_tr(state, Tr::new(word, word, TropicalWeight::one(), next))
            .unwrap();
        state = next;
    }
    fst.set_final(state, TropicalWeight::one()).unwrap();
    fst
}

/// Cheapest accepting path of `fst` as its non-epsilon input labels,
/// non-epsilon output labels, and total cost including the final weight.
///
/// Plain label-correcting relaxation; with non-negative weights the
/// self-loops the pipeline adds never improve a path, so the parent chain
/// stays acyclic.
pub(crate) fn best_path(fst: &StdVectorFst) -> Option<(Vec<Label>, Vec<Label>, f32)> {
    let start = fst.start()?;
    let n = fst.num_states();
    let mut dist = vec![f32::INFINITY; n];
    let mut parent: Vec<Option<(StateId, Tr<TropicalWeight>)>> = vec![None; n];
    dist[start as usize] = 0.0;

    for _ in 0..n {
        let mut changed = false;
        for state in fst.states_iter() {
            let from = dist[state as usize];
            if from.is_infinite() {
                continue;
            }
            for tr in fst.get_trs(state).unwrap().trs() {
                let candidate = from + *tr.weight.value();
                if candidate < dist[tr.nextstate as usize] {
                    dist[tr.nextstate as usize] = candidate;
                    parent[tr.nextstate as usize] = Some((state, tr.clone()));
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut best: Option<(StateId, f32)> = None;
    for state in fst.states_iter() {
        if let Some(weight) = fst.final_weight(state).unwrap() {
            let at = dist[state as usize];
            if at.is_infinite() {
                continue;
            }
            let total = at + *weight.value();
            if best.map_or(true, |(_, cost)| total < cost) {
                best = Some((state, total));
            }
        }
    }
    let (final_state, cost) = best?;

    let mut arcs = Vec::new();
    let mut cursor = final_state;
    while cursor != start {
        let (prev, tr) = parent[cursor as usize].clone()?;
        arcs.push(tr);
        cursor = prev;
    }
    arcs.reverse();

    let ilabels = arcs
        .iter()
        .map(|tr| tr.ilabel)
        .filter(|&l| l != EPSILON)
        .collect();
    let olabels = arcs
        .iter()
        .map(|tr| tr.olabel)
        .filter(|&l| l != EPSILON)
        .collect();
    Some((ilabels, olabels, cost))
}

fn signature(fst: &StdVectorFst) -> (Vec<(Label, Label, u32)>, Vec<u32>) {
    let mut arcs = Vec::new();
    let mut finals = Vec::new();
    for state in fst.states_iter() {
        for tr in fst.get_trs(state).unwrap().trs() {
            arcs.push((tr.ilabel, tr.olabel, tr.weight.value().to_bits()));
        }
        if let Some(weight) = fst.final_weight(state).unwrap() {
            finals.push(weight.value().to_bits());
        }
    }
    arcs.sort_unstable();
    finals.sort_unstable();
    (arcs, finals)
}

/// Structural equality up to state renumbering: state and arc counts,
/// label/weight multisets, final-weight multiset, and the best path.
pub(crate) fn canonical_eq(a: &StdVectorFst, b: &StdVectorFst) -> bool {
    if a.num_states() != b.num_states() {
        return false;
    }
    if signature(a) != signature(b) {
        return false;
    }
    match (best_path(a), best_path(b)) {
        (None, None) => true,
        (Some((ia, oa, ca)), Some((ib, ob, cb))) => {
            ia == ib && oa == ob && ca.to_bits() == cb.to_bits()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_path_prefers_cheaper_arcs() {
        let mut fst = StdVectorFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.add_tr(s0, Tr::new(1, 1, TropicalWeight::new(0.5), s1))
            .unwrap();
        fst.add_tr(s0, Tr::new(2, 2, TropicalWeight::new(0.2), s1))
            .unwrap();
        fst.set_final(s1, TropicalWeight::new(0.1)).unwrap();

        let (ilabels, olabels, cost) = best_path(&fst).unwrap();
        assert_eq!(ilabels, vec![2]);
        assert_eq!(olabels, vec![2]);
        assert!((cost - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_best_path_ignores_self_loops() {
        let mut fst = StdVectorFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.add_tr(s0, Tr::new(1, 0, TropicalWeight::one(), s1))
            .unwrap();
        fst.add_tr(s1, Tr::new(1, 0, TropicalWeight::one(), s1))
            .unwrap();
        fst.set_final(s1, TropicalWeight::one()).unwrap();

        let (ilabels, _, cost) = best_path(&fst).unwrap();
        assert_eq!(ilabels, vec![1]);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn test_canonical_eq_spots_weight_differences() {
        let make = |weight: f32| {
            let mut fst = StdVectorFst::new();
            let s0 = fst.add_state();
            let s1 = fst.add_state();
            fst.set_start(s0).unwrap();
            fst.add_tr(s0, Tr::new(1, 1, TropicalWeight::new(weight), s1))
                .unwrap();
            fst.set_final(s1, TropicalWeight::one()).unwrap();
            fst
        };
        assert!(canonical_eq(&make(0.5), &make(0.5)));
        assert!(!canonical_eq(&make(0.5), &make(0.6)));
    }
}
