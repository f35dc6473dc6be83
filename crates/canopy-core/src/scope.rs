use std::sync::Arc;

use crate::error::Result;
use crate::evaluation::{select_evaluations, EvaluationRequest};
use crate::stratification::StratificationTable;
use crate::tables::{EvalId, EvalType, InventoryTables};

/// Resolved evaluation and stratification for a run of estimates.
///
/// Built once and passed by reference into every estimation call. Nothing
/// downstream mutates it, so one scope serves any number of grouped or
/// filtered estimates in a session. Stratification is shared behind an
/// `Arc` so clones are cheap and never re-resolve.
#[derive(Debug, Clone)]
pub struct EstimationScope {
    evalids: Vec<EvalId>,
    /// Purpose the evaluations were selected for; `None` for explicit ids.
    purpose: Option<EvalType>,
    stratification: Arc<StratificationTable>,
}

impl EstimationScope {
    /// Select evaluations for `purpose` and resolve their stratification.
    pub fn resolve(
        tables: &InventoryTables,
        request: &EvaluationRequest,
        purpose: EvalType,
    ) -> Result<Self> {
        let evalids = select_evaluations(&tables.evaluations, request, purpose)?;
        let stratification =
            StratificationTable::resolve(&evalids, &tables.strata, &tables.assignments)?;
        Ok(Self {
            evalids,
            purpose: (!request.is_explicit()).then_some(purpose),
            stratification: Arc::new(stratification),
        })
    }

    /// Scope over an already-resolved stratification.
    pub fn from_parts(
        evalids: Vec<EvalId>,
        purpose: Option<EvalType>,
        stratification: StratificationTable,
    ) -> Self {
        Self {
            evalids,
            purpose,
            stratification: Arc::new(stratification),
        }
    }

    pub fn evalids(&self) -> &[EvalId] {
        &self.evalids
    }

    pub fn purpose(&self) -> Option<EvalType> {
        self.purpose
    }

    pub fn stratification(&self) -> &StratificationTable {
        &self.stratification
    }
}
