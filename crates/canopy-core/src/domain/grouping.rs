use std::collections::BTreeSet;

use crate::error::{EstimationError, Result};
use crate::measure::{MeasureSpec, RecordSource};
use crate::tables::{Condition, InventoryTables, Record, Tree};
use crate::value::Value;

/// One value per grouping column, in configured order.
pub type GroupKey = Vec<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLevel {
    Condition,
    Tree,
}

/// Resolved grouping columns.
///
/// Condition columns win when a name exists at both levels (`PLT_CN`,
/// `CONDID`). Tree columns are only valid for tree-based measures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grouping {
    columns: Vec<(String, ColumnLevel)>,
}

impl Grouping {
    pub fn resolve(names: &[String], spec: &MeasureSpec, tables: &InventoryTables) -> Result<Self> {
        let cond_cols = tables.condition_columns();
        let tree_cols = tables.tree_columns();
        let mut seen = BTreeSet::new();
        let mut columns = Vec::with_capacity(names.len());

        for name in names {
            let upper = name.trim().to_ascii_uppercase();
            if !seen.insert(upper.clone()) {
                return Err(EstimationError::expression(name, "grouping column listed twice"));
            }
            let level = if cond_cols.contains(&upper) {
                ColumnLevel::Condition
            } else if tree_cols.contains(&upper) {
                if spec.source != RecordSource::Tree {
                    return Err(EstimationError::expression(
                        name,
                        format!("tree column cannot group a {:?} estimate", spec.kind),
                    ));
                }
                ColumnLevel::Tree
            } else {
                return Err(EstimationError::expression(name, "unknown grouping column"));
            };
            columns.push((upper, level));
        }
        Ok(Self { columns })
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn has_tree_columns(&self) -> bool {
        self.columns.iter().any(|(_, l)| *l == ColumnLevel::Tree)
    }

    /// Group of a condition. Tree-level columns read as null here; callers
    /// only use this when the grouping is condition-level.
    pub fn condition_key(&self, cond: &Condition) -> GroupKey {
        self.columns
            .iter()
            .map(|(name, level)| match level {
                ColumnLevel::Condition => cond.column(name).unwrap_or(Value::Null),
                ColumnLevel::Tree => Value::Null,
            })
            .collect()
    }

    /// Group of a tree, reading condition-level columns from its condition.
    pub fn tree_key(&self, tree: &Tree, cond: &Condition) -> GroupKey {
        self.columns
            .iter()
            .map(|(name, level)| {
                let v = match level {
                    ColumnLevel::Condition => cond.column(name),
                    ColumnLevel::Tree => tree.column(name),
                };
                v.unwrap_or(Value::Null)
            })
            .collect()
    }
}
