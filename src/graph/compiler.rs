//! The training-graph compiler tying the pipeline stages together.
//!
//! One compiler instance serves a whole run. It owns the prepared lexicon
//! and borrows the context tree and transition model read-only, so
//! compilation calls never contend on anything and the instance can be
//! shared across threads freely.

use rustfst::algorithms::compose::compose;
use rustfst::algorithms::determinize::determinize;
use rustfst::algorithms::rm_epsilon::rm_epsilon;
use rustfst::fst_impls::VectorFst;
use rustfst::prelude::*;
use tracing::debug;

use crate::config::defaults;
use crate::error::{GraphError, Result};
use crate::graph::context::{expand_context, IlabelTable};
use crate::graph::lexicon::{prepare_lexicon, subsequential_symbol};
use crate::graph::topology::{add_self_loops, build_h, remove_disambig_symbols, HTransducer};
use crate::model::TransitionModel;
use crate::tree::ContextDependency;
use crate::types::{DisambigSymbols, GraphOutcome, StdVectorFst};

/// Weight scales applied when HMM topology is inserted.
///
/// A scale of zero leaves the corresponding probabilities out of the graph
/// entirely, which is the usual choice for training graphs.
#[derive(Debug, Clone, Copy)]
pub struct CompilerOptions {
    /// Scale on forward-transition probabilities.
    pub transition_scale: f32,
    /// Scale on self-loop probabilities.
    pub self_loop_scale: f32,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            transition_scale: defaults::TRANSITION_SCALE,
            self_loop_scale: defaults::SELF_LOOP_SCALE,
        }
    }
}

/// Compiles per-utterance grammar transducers into decoding graphs.
///
/// Construction prepares the lexicon once (subsequential loop plus arc
/// sort); afterwards the compiler is immutable and every compilation is a
/// pure function of it and the grammar, so concurrent calls are safe.
pub struct TrainingGraphCompiler<'a> {
    tree: &'a ContextDependency,
    model: &'a TransitionModel,
    lexicon: StdVectorFst,
    disambig: DisambigSymbols,
    subseq_symbol: Label,
    options: CompilerOptions,
}

impl<'a> TrainingGraphCompiler<'a> {
    /// Take ownership of the lexicon transducer and prepare it for
    /// composition. Fails if the lexicon has no start state.
    pub fn new(
        tree: &'a ContextDependency,
        model: &'a TransitionModel,
        lexicon: StdVectorFst,
        disambig: DisambigSymbols,
        options: CompilerOptions,
    ) -> Result<Self> {
        let subseq_symbol = subsequential_symbol(tree, &disambig);
        let lexicon = prepare_lexicon(lexicon, tree, &disambig, subseq_symbol)?;
        debug!(
            "compiler ready: {} lexicon states, subsequential symbol {}",
            lexicon.num_states(),
            subseq_symbol
        );
        Ok(Self {
            tree,
            model,
            lexicon,
            disambig,
            subseq_symbol,
            options,
        })
    }

    /// Compile one grammar into a decoding graph.
    ///
    /// A grammar with no path through the lexicon (out-of-vocabulary words,
    /// no reachable final state) is a property of that utterance's data,
    /// reported as [`GraphOutcome::Empty`] rather than an error. Errors
    /// mean the shared resources are inconsistent and the run should stop.
    pub fn compile_graph(&self, grammar: &StdVectorFst) -> Result<GraphOutcome> {
        let mut table = IlabelTable::new();
        let clg = match self.build_clg(grammar, &mut table)? {
            Some(clg) => clg,
            None => return Ok(GraphOutcome::Empty),
        };
        let h = build_h(&table, self.tree, self.model, self.options.transition_scale)?;
        self.finish_graph(clg, &h)
    }

    /// Compile a batch of grammars, returning one outcome per grammar in
    /// input order.
    ///
    /// The batch shares a single window table and a single H transducer
    /// across its members, which is the entire point of batching; the
    /// resulting graphs are identical to per-grammar [`compile_graph`]
    /// calls up to state numbering.
    ///
    /// [`compile_graph`]: TrainingGraphCompiler::compile_graph
    pub fn compile_graphs(&self, grammars: &[StdVectorFst]) -> Result<Vec<GraphOutcome>> {
        let mut table = IlabelTable::new();
        let mut expanded = Vec::with_capacity(grammars.len());
        for grammar in grammars {
            expanded.push(self.build_clg(grammar, &mut table)?);
        }

        let h = build_h(&table, self.tree, self.model, self.options.transition_scale)?;
        let mut graphs = Vec::with_capacity(expanded.len());
        for clg in expanded {
            graphs.push(match clg {
                Some(clg) => self.finish_graph(clg, &h)?,
                None => GraphOutcome::Empty,
            });
        }
        debug!(
            "batch of {} grammars compiled against {} context windows",
            grammars.len(),
            table.len()
        );
        Ok(graphs)
    }

    /// Compose the grammar with the lexicon and expand phone context,
    /// interning windows into `table`. `None` means the grammar admits no
    /// complete path.
    fn build_clg(
        &self,
        grammar: &StdVectorFst,
        table: &mut IlabelTable,
    ) -> Result<Option<StdVectorFst>> {
        if grammar.start().is_none() {
            debug!("grammar has no start state");
            return Ok(None);
        }
        let mut grammar = grammar.clone();
        tr_sort(&mut grammar, ILabelCompare {});

        let mut lg: StdVectorFst = compose::<TropicalWeight, VectorFst<_>, VectorFst<_>, _, _, _>(
            &self.lexicon,
            &grammar,
        )?;
        connect(&mut lg)?;
        if lg.start().is_none() {
            debug!("grammar does not compose with the lexicon");
            return Ok(None);
        }

        let clg = expand_context(lg, self.tree, &self.disambig, self.subseq_symbol, table)?;
        if clg.start().is_none() {
            return Ok(None);
        }
        Ok(Some(clg))
    }

    /// Insert HMM topology and reduce to the final transition-id graph.
    fn finish_graph(&self, mut clg: StdVectorFst, h: &HTransducer) -> Result<GraphOutcome> {
        tr_sort(&mut clg, ILabelCompare {});
        let hclg: StdVectorFst = compose::<TropicalWeight, VectorFst<_>, VectorFst<_>, _, _, _>(
            &h.fst,
            &clg,
        )?;

        let determinized: StdVectorFst =
            determinize(&hclg).map_err(|e| GraphError::Determinize(e.to_string()))?;

        let mut graph = remove_disambig_symbols(&determinized, h.first_disambig_label)?;
        rm_epsilon(&mut graph)?;
        connect(&mut graph)?;
        let graph = add_self_loops(&graph, self.model, self.options.self_loop_scale)?;
        Ok(GraphOutcome::Graph(graph))
    }
}
