//! Lexicon transducer preparation.
//!
//! The raw lexicon maps words to phone sequences and already carries the
//! disambiguation symbols its builder inserted. Before it can serve as the
//! left operand of per-utterance compositions it needs two one-time fixes:
//! a subsequential loop so right context can be flushed at word-sequence
//! end, and an output-label sort so composition with grammars is fast.
//! This runs once per compiler lifetime, never per utterance.

use rustfst::prelude::*;

use crate::error::{GraphError, Result};
use crate::tree::ContextDependency;
use crate::types::{DisambigSymbols, StdVectorFst, EPSILON};

/// The reserved label consumed when flushing right context, one past every
/// phone and disambiguation symbol.
pub fn subsequential_symbol(tree: &ContextDependency, disambig: &DisambigSymbols) -> Label {
    tree.max_phone().max(disambig.max().unwrap_or(0)) + 1
}

/// Prepare a raw lexicon transducer for composition.
///
/// When the tree looks at right context, every final state gets an arc
/// consuming `subseq_symbol` (carrying its final weight) to a new
/// superfinal state that loops on the symbol, so any number of flushes is
/// admissible; original final states stay final. The result is sorted on
/// output labels. A lexicon without a start state, or one whose input
/// labels fall outside the tree's phone alphabet and the disambiguation
/// set, was not built for these resources and fails fatally.
pub fn prepare_lexicon(
    mut lexicon: StdVectorFst,
    tree: &ContextDependency,
    disambig: &DisambigSymbols,
    subseq_symbol: Label,
) -> Result<StdVectorFst> {
    if lexicon.start().is_none() {
        return Err(GraphError::Resource(
            "lexicon transducer has no start state".to_string(),
        ));
    }
    check_phone_alphabet(&lexicon, tree, disambig)?;

    if tree.has_right_context() {
        add_subsequential_loop(&mut lexicon, subseq_symbol)?;
    }

    tr_sort(&mut lexicon, OLabelCompare {});
    Ok(lexicon)
}

fn check_phone_alphabet(
    fst: &StdVectorFst,
    tree: &ContextDependency,
    disambig: &DisambigSymbols,
) -> Result<()> {
    for state in fst.states_iter() {
        for tr in fst.get_trs(state)?.trs() {
            if tr.ilabel != EPSILON
                && tr.ilabel > tree.max_phone()
                && !disambig.contains(tr.ilabel)
            {
                return Err(GraphError::Resource(format!(
                    "lexicon input label {} is neither a phone within bound {} nor a disambiguation symbol",
                    tr.ilabel,
                    tree.max_phone()
                )));
            }
        }
    }
    Ok(())
}

fn add_subsequential_loop(fst: &mut StdVectorFst, subseq_symbol: Label) -> Result<()> {
    let mut finals = Vec::new();
    for state in fst.states_iter() {
        if let Some(weight) = fst.final_weight(state)? {
            if weight != TropicalWeight::zero() {
                finals.push((state, weight));
            }
        }
    }

    let superfinal = fst.add_state();
    fst.add_tr(
        superfinal,
        Tr::new(subseq_symbol, EPSILON, TropicalWeight::one(), superfinal),
    )?;
    fst.set_final(superfinal, TropicalWeight::one())?;

    for (state, weight) in finals {
        fst.add_tr(state, Tr::new(subseq_symbol, EPSILON, weight, superfinal))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ContextDependency;
    use std::collections::HashMap;

    fn triphone_tree() -> ContextDependency {
        let mut windows = HashMap::new();
        windows.insert(vec![0, 1, 0], vec![1]);
        ContextDependency::new(3, 1, 2, windows).unwrap()
    }

    fn monophone_tree() -> ContextDependency {
        let mut windows = HashMap::new();
        windows.insert(vec![1], vec![1]);
        ContextDependency::new(1, 0, 2, windows).unwrap()
    }

    /// One word, one phone: 0 -(1:10)-> 1, final weight 0.25.
    fn tiny_lexicon() -> StdVectorFst {
        let mut fst = StdVectorFst::new();
        let s0 = fst.add_state();
        let s1 = fst.add_state();
        fst.set_start(s0).unwrap();
        fst.add_tr(s0, Tr::new(1, 10, TropicalWeight::one(), s1))
            .unwrap();
        fst.set_final(s1, TropicalWeight::new(0.25)).unwrap();
        fst
    }

    #[test]
    fn test_subsequential_symbol_past_phones_and_disambig() {
        let tree = triphone_tree();
        let disambig = DisambigSymbols::from_symbols([5]).unwrap();
        assert_eq!(subsequential_symbol(&tree, &disambig), 6);
        let empty = DisambigSymbols::empty();
        assert_eq!(subsequential_symbol(&tree, &empty), 3);
    }

    #[test]
    fn test_loop_added_with_right_context() {
        let tree = triphone_tree();
        let prepared =
            prepare_lexicon(tiny_lexicon(), &tree, &DisambigSymbols::empty(), 6).unwrap();

        // One new superfinal state.
        assert_eq!(prepared.num_states(), 3);
        let superfinal = 2;
        assert_eq!(
            prepared.final_weight(superfinal).unwrap(),
            Some(TropicalWeight::one())
        );

        // The old final state keeps its weight and gains the flush arc.
        assert_eq!(
            prepared.final_weight(1).unwrap(),
            Some(TropicalWeight::new(0.25))
        );
        let trs = prepared.get_trs(1).unwrap();
        let flush: Vec<_> = trs.trs().iter().filter(|tr| tr.ilabel == 6).collect();
        assert_eq!(flush.len(), 1);
        assert_eq!(flush[0].olabel, EPSILON);
        assert_eq!(flush[0].weight, TropicalWeight::new(0.25));
        assert_eq!(flush[0].nextstate, superfinal);

        // The superfinal state loops on the subsequential symbol.
        let trs = prepared.get_trs(superfinal).unwrap();
        let loops: Vec<_> = trs.trs().iter().collect();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].ilabel, 6);
        assert_eq!(loops[0].nextstate, superfinal);
    }

    #[test]
    fn test_no_loop_without_right_context() {
        let tree = monophone_tree();
        let prepared =
            prepare_lexicon(tiny_lexicon(), &tree, &DisambigSymbols::empty(), 3).unwrap();
        assert_eq!(prepared.num_states(), 2);
    }

    #[test]
    fn test_startless_lexicon_is_fatal() {
        let tree = triphone_tree();
        let result = prepare_lexicon(StdVectorFst::new(), &tree, &DisambigSymbols::empty(), 6);
        assert!(matches!(result, Err(GraphError::Resource(_))));
    }

    #[test]
    fn test_label_outside_tree_alphabet_is_fatal() {
        // Phone bound is 2; label 9 belongs to neither the alphabet nor the
        // disambiguation set.
        let tree = triphone_tree();
        let mut lexicon = tiny_lexicon();
        lexicon
            .add_tr(0, Tr::new(9, 10, TropicalWeight::one(), 1))
            .unwrap();

        let result = prepare_lexicon(lexicon.clone(), &tree, &DisambigSymbols::empty(), 6);
        assert!(matches!(result, Err(GraphError::Resource(_))));

        // The same label is fine once declared as a disambiguation symbol.
        let disambig = DisambigSymbols::from_symbols([9]).unwrap();
        assert!(prepare_lexicon(lexicon, &tree, &disambig, 10).is_ok());
    }
}
