//! The graph-composition pipeline.
//!
//! This module contains the stages that rewrite a word-level grammar
//! transducer into a transition-id-level decoding graph: lexicon
//! preparation, context expansion, HMM topology insertion, and the
//! orchestrating compiler.

mod compiler;
mod context;
mod lexicon;
mod topology;

pub use compiler::{CompilerOptions, TrainingGraphCompiler};
pub use context::{expand_context, IlabelEntry, IlabelTable};
pub use lexicon::{prepare_lexicon, subsequential_symbol};
pub use topology::{add_self_loops, build_h, HTransducer};
