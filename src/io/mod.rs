//! Reading and writing the compiler's on-disk formats.
//!
//! Grammars come in and graphs go out through keyed archives of serialized
//! transducers; the lexicon travels as a standalone record. The text module
//! parses the plain-text forms the packing tool accepts.

mod archive;
mod text;

pub use archive::{read_fst_file, write_fst_file, ArchiveReader, ArchiveWriter};
pub use text::{parse_fst_text, parse_model_text, parse_tree_text, SymbolMap};
