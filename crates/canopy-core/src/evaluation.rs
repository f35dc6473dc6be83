//! Evaluation selection: one evaluation per requested geography.
//!
//! Purpose must match the measure being estimated; an evaluation published
//! for another purpose assigns a different plot set. Ties are never broken
//! arbitrarily: without `most_recent` any multiplicity is an
//! `AmbiguityError`, and with it the latest `END_INVYR` wins, then full
//! coverage over partial. Anything still tied is ambiguous.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use crate::error::{EstimationError, Result};
use crate::tables::{Coverage, EvalId, EvalType, Evaluation};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationRequest {
    /// State (geography) codes.
    pub geography: Vec<u16>,
    /// Resolve multiple matches to the most recent evaluation.
    pub most_recent: bool,
    /// Explicit evaluation ids, used verbatim when non-empty.
    pub evalid: Vec<EvalId>,
}

impl EvaluationRequest {
    pub fn most_recent(geography: &[u16]) -> Self {
        Self {
            geography: geography.to_vec(),
            most_recent: true,
            evalid: Vec::new(),
        }
    }

    pub fn explicit(evalid: &[EvalId]) -> Self {
        Self {
            geography: Vec::new(),
            most_recent: false,
            evalid: evalid.to_vec(),
        }
    }

    pub fn is_explicit(&self) -> bool {
        !self.evalid.is_empty()
    }
}

/// Resolve a request to evaluation ids, sorted ascending.
pub fn select_evaluations(
    evaluations: &[Evaluation],
    request: &EvaluationRequest,
    purpose: EvalType,
) -> Result<Vec<EvalId>> {
    if request.is_explicit() {
        let ids: BTreeSet<EvalId> = request.evalid.iter().copied().collect();
        return Ok(ids.into_iter().collect());
    }

    let geographies: BTreeSet<u16> = request.geography.iter().copied().collect();
    if geographies.is_empty() {
        return Err(EstimationError::Configuration(
            "evaluation request names neither a geography nor an evaluation id".into(),
        ));
    }

    let mut selected = Vec::with_capacity(geographies.len());
    for geography in geographies {
        let evalid = select_for_geography(evaluations, geography, purpose, request.most_recent)?;
        info!(evalid, geography, purpose = ?purpose, "resolved evaluation");
        selected.push(evalid);
    }
    selected.sort_unstable();
    Ok(selected)
}

fn select_for_geography(
    evaluations: &[Evaluation],
    geography: u16,
    purpose: EvalType,
    most_recent: bool,
) -> Result<EvalId> {
    // Repeated rows for the same EVALID are one candidate, first row kept.
    let mut seen = BTreeSet::new();
    let candidates: Vec<&Evaluation> = evaluations
        .iter()
        .filter(|e| e.statecd == geography && e.eval_typ == purpose)
        .filter(|e| seen.insert(e.evalid))
        .collect();

    match candidates.as_slice() {
        [] => Err(EstimationError::Configuration(format!(
            "no {purpose:?} evaluation for geography {geography}"
        ))),
        [only] => Ok(only.evalid),
        _ if !most_recent => Err(ambiguity(geography, &candidates)),
        _ => {
            let latest = candidates.iter().map(|e| e.end_invyr).max().unwrap_or(0);
            let newest: Vec<&Evaluation> = candidates
                .iter()
                .copied()
                .filter(|e| e.end_invyr == latest)
                .collect();
            if let [only] = newest.as_slice() {
                return Ok(only.evalid);
            }
            let full: Vec<&Evaluation> = newest
                .iter()
                .copied()
                .filter(|e| e.coverage == Coverage::Full)
                .collect();
            match full.as_slice() {
                [only] => Ok(only.evalid),
                [] => Err(ambiguity(geography, &newest)),
                _ => Err(ambiguity(geography, &full)),
            }
        }
    }
}

fn ambiguity(geography: u16, candidates: &[&Evaluation]) -> EstimationError {
    let mut ids: Vec<EvalId> = candidates.iter().map(|e| e.evalid).collect();
    ids.sort_unstable();
    EstimationError::Ambiguity { geography, candidates: ids }
}
