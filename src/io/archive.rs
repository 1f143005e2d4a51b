//! Keyed archives of serialized transducers.
//!
//! An archive is a flat stream of bincode records, each a key string plus
//! one transducer, in write order. Readers iterate sequentially; the end of
//! the stream is probed before each record so a clean end is distinguished
//! from a record cut off mid-way, which is a fatal archive error.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rustfst::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, GraphError, Result};
use crate::types::StdVectorFst;

#[derive(Debug, Serialize, Deserialize)]
struct ArcRecord {
    ilabel: Label,
    olabel: Label,
    weight: f32,
    nextstate: StateId,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    final_weight: Option<f32>,
    arcs: Vec<ArcRecord>,
}

/// Serialized form of one transducer: dense states with their final
/// weights and outgoing arcs, plus the start state.
#[derive(Debug, Serialize, Deserialize)]
struct FstRecord {
    start: Option<StateId>,
    states: Vec<StateRecord>,
}

impl FstRecord {
    fn from_fst(fst: &StdVectorFst) -> Result<Self> {
        let mut states = Vec::with_capacity(fst.num_states());
        for state in fst.states_iter() {
            let arcs = fst
                .get_trs(state)?
                .trs()
                .iter()
                .map(|tr| ArcRecord {
                    ilabel: tr.ilabel,
                    olabel: tr.olabel,
                    weight: *tr.weight.value(),
                    nextstate: tr.nextstate,
                })
                .collect();
            let final_weight = fst.final_weight(state)?.map(|w| *w.value());
            states.push(StateRecord { final_weight, arcs });
        }
        Ok(FstRecord {
            start: fst.start(),
            states,
        })
    }

    fn into_fst(self) -> Result<StdVectorFst> {
        let num_states = self.states.len();
        let mut fst = StdVectorFst::new();
        fst.add_states(num_states);
        if let Some(start) = self.start {
            if start as usize >= num_states {
                return Err(GraphError::Archive(format!(
                    "start state {} out of range for {} states",
                    start, num_states
                )));
            }
            fst.set_start(start)?;
        }
        for (state, record) in self.states.into_iter().enumerate() {
            let state = state as StateId;
            if let Some(weight) = record.final_weight {
                fst.set_final(state, TropicalWeight::new(weight))?;
            }
            for arc in record.arcs {
                if arc.nextstate as usize >= num_states {
                    return Err(GraphError::Archive(format!(
                        "arc target {} out of range for {} states",
                        arc.nextstate, num_states
                    )));
                }
                fst.add_tr(
                    state,
                    Tr::new(
                        arc.ilabel,
                        arc.olabel,
                        TropicalWeight::new(arc.weight),
                        arc.nextstate,
                    ),
                )?;
            }
        }
        Ok(fst)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveRecord {
    key: String,
    fst: FstRecord,
}

/// Writes keyed transducer records to a stream in call order.
pub struct ArchiveWriter<W: Write> {
    writer: W,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Create an archive file, truncating any existing one.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create archive {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Append one record. An empty transducer is a valid record; failed
    /// utterances are written that way so the key set stays complete.
    pub fn write(&mut self, key: &str, fst: &StdVectorFst) -> Result<()> {
        let record = ArchiveRecord {
            key: key.to_string(),
            fst: FstRecord::from_fst(fst)?,
        };
        bincode::serialize_into(&mut self.writer, &record).map_err(|e| {
            GraphError::Archive(format!("failed to write record {:?}: {}", key, e))
        })?;
        Ok(())
    }

    /// Flush buffered records to the underlying stream.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Iterates keyed transducer records from a stream in archive order.
pub struct ArchiveReader<R: BufRead> {
    reader: R,
}

impl ArchiveReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open archive {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ArchiveReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    fn read_record(&mut self) -> Result<Option<(String, StdVectorFst)>> {
        if self.reader.fill_buf()?.is_empty() {
            return Ok(None);
        }
        let record: ArchiveRecord = bincode::deserialize_from(&mut self.reader)
            .map_err(|e| GraphError::Archive(format!("malformed archive record: {}", e)))?;
        Ok(Some((record.key, record.fst.into_fst()?)))
    }
}

impl<R: BufRead> Iterator for ArchiveReader<R> {
    type Item = Result<(String, StdVectorFst)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Write a single transducer as a standalone record file.
pub fn write_fst_file<P: AsRef<Path>>(path: P, fst: &StdVectorFst) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("failed to create FST file {}", path.display()))?;
    let record = FstRecord::from_fst(fst)?;
    bincode::serialize_into(BufWriter::new(file), &record).map_err(|e| {
        GraphError::Archive(format!("failed to write {}: {}", path.display(), e))
    })?;
    Ok(())
}

/// Read a transducer from a standalone record file.
pub fn read_fst_file<P: AsRef<Path>>(path: P) -> Result<StdVectorFst> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open FST file {}", path.display()))?;
    let record: FstRecord = bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| GraphError::Archive(format!("malformed FST file {}: {}", path.display(), e)))?;
    record.into_fst()
}
