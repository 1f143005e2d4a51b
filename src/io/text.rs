//! Parsers for the plain-text forms consumed by the packing tool.
//!
//! Transducers use the usual textual arc format, one arc per line as
//! `src dst ilabel olabel [weight]` with final states as `state [weight]`;
//! the source state of the first line is the start state. Labels may be
//! written as integers or as names resolved through a [`SymbolMap`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use rustfst::prelude::*;

use crate::error::{ErrorContext, GraphError, Result};
use crate::model::{TransitionInfo, TransitionModel};
use crate::tree::ContextDependency;
use crate::types::{Phone, StdVectorFst, TransitionId};

/// Mapping from symbol names to label ids, one `name id` pair per line.
#[derive(Debug, Default)]
pub struct SymbolMap {
    entries: HashMap<String, Label>,
}

impl SymbolMap {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read symbol table {}", path.display()))?;
        let mut entries = HashMap::new();
        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let (name, id) = match (tokens.next(), tokens.next(), tokens.next()) {
                (Some(name), Some(id), None) => (name, id),
                _ => {
                    return Err(GraphError::Resource(format!(
                        "{} line {}: expected `name id`",
                        path.display(),
                        lineno + 1
                    )))
                }
            };
            let id = parse_number(id, "label id", lineno + 1)?;
            entries.insert(name.to_string(), id);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<Label> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_number<T: FromStr>(token: &str, what: &str, lineno: usize) -> Result<T> {
    token
        .parse()
        .map_err(|_| GraphError::Resource(format!("line {}: bad {} {:?}", lineno, what, token)))
}

fn parse_weight(token: Option<&str>, lineno: usize) -> Result<TropicalWeight> {
    match token {
        None => Ok(TropicalWeight::one()),
        Some(token) => Ok(TropicalWeight::new(parse_number(token, "weight", lineno)?)),
    }
}

fn resolve_label(token: &str, symbols: Option<&SymbolMap>, lineno: usize) -> Result<Label> {
    if let Ok(label) = token.parse() {
        return Ok(label);
    }
    symbols.and_then(|map| map.get(token)).ok_or_else(|| {
        GraphError::Resource(format!("line {}: unknown symbol {:?}", lineno, token))
    })
}

fn ensure_state(fst: &mut StdVectorFst, state: StateId) {
    while fst.num_states() <= state as usize {
        fst.add_state();
    }
}

/// Parse a transducer from textual arc format.
pub fn parse_fst_text(
    text: &str,
    isymbols: Option<&SymbolMap>,
    osymbols: Option<&SymbolMap>,
) -> Result<StdVectorFst> {
    let mut fst = StdVectorFst::new();
    let mut start_set = false;
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let lineno = index + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.len() {
            1 | 2 => {
                let state = parse_number(tokens[0], "state id", lineno)?;
                ensure_state(&mut fst, state);
                if !start_set {
                    fst.set_start(state)?;
                    start_set = true;
                }
                fst.set_final(state, parse_weight(tokens.get(1).copied(), lineno)?)?;
            }
            4 | 5 => {
                let src = parse_number(tokens[0], "state id", lineno)?;
                let dst = parse_number(tokens[1], "state id", lineno)?;
                ensure_state(&mut fst, src);
                ensure_state(&mut fst, dst);
                if !start_set {
                    fst.set_start(src)?;
                    start_set = true;
                }
                let ilabel = resolve_label(tokens[2], isymbols, lineno)?;
                let olabel = resolve_label(tokens[3], osymbols, lineno)?;
                let weight = parse_weight(tokens.get(4).copied(), lineno)?;
                fst.add_tr(src, Tr::new(ilabel, olabel, weight, dst))?;
            }
            found => {
                return Err(GraphError::Resource(format!(
                    "line {}: expected an arc or final-state line, found {} fields",
                    lineno, found
                )))
            }
        }
    }
    Ok(fst)
}

/// Parse a context tree from text: a `width central max-phone` header, then
/// one `phones... : ids...` line per window.
pub fn parse_tree_text(text: &str) -> Result<ContextDependency> {
    let mut header: Option<(usize, usize, Phone)> = None;
    let mut windows = HashMap::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let lineno = index + 1;
        if header.is_none() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != 3 {
                return Err(GraphError::Resource(format!(
                    "line {}: expected `width central max-phone` header",
                    lineno
                )));
            }
            header = Some((
                parse_number(tokens[0], "context width", lineno)?,
                parse_number(tokens[1], "central position", lineno)?,
                parse_number(tokens[2], "phone bound", lineno)?,
            ));
            continue;
        }
        let (left, right) = line.split_once(':').ok_or_else(|| {
            GraphError::Resource(format!("line {}: expected `phones : ids`", lineno))
        })?;
        let window: Vec<Phone> = left
            .split_whitespace()
            .map(|tok| parse_number(tok, "phone", lineno))
            .collect::<Result<_>>()?;
        let ids: Vec<TransitionId> = right
            .split_whitespace()
            .map(|tok| parse_number(tok, "transition id", lineno))
            .collect::<Result<_>>()?;
        windows.insert(window, ids);
    }
    let (width, central, max_phone) =
        header.ok_or_else(|| GraphError::Resource("empty tree text".to_string()))?;
    ContextDependency::new(width, central, max_phone, windows)
}

/// Parse a transition model from text: one `phone self-loop forward` line
/// per transition id, ids assigned in line order starting at 1.
pub fn parse_model_text(text: &str) -> Result<TransitionModel> {
    let mut records = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let lineno = index + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 3 {
            return Err(GraphError::Resource(format!(
                "line {}: expected `phone self-loop forward`",
                lineno
            )));
        }
        records.push(TransitionInfo {
            phone: parse_number(tokens[0], "phone", lineno)?,
            self_loop_prob: parse_number(tokens[1], "self-loop probability", lineno)?,
            forward_prob: parse_number(tokens[2], "forward probability", lineno)?,
        });
    }
    TransitionModel::new(records)
}
