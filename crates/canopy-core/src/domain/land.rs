//! Land classification of conditions.

use serde::{Deserialize, Serialize};

use crate::columns;
use crate::config::{LandType, UniverseRule};
use crate::tables::Condition;

/// Productive site classes (SITECLCD 1..=6, at least 20 ft³/acre/yr).
const PRODUCTIVE_SITE_CLASSES: std::ops::RangeInclusive<i32> = 1..=6;

/// Derived land category of a condition; the value of the `LAND_TYPE` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LandCategory {
    Timber,
    OtherForest,
    NonForest,
    Water,
    NonSampled,
}

impl LandCategory {
    pub fn classify(cond: &Condition) -> Self {
        match cond.cond_status_cd {
            1 if is_timberland(cond) => LandCategory::Timber,
            1 => LandCategory::OtherForest,
            2 => LandCategory::NonForest,
            3 | 4 => LandCategory::Water,
            _ => LandCategory::NonSampled,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LandCategory::Timber => columns::land::TIMBER,
            LandCategory::OtherForest => columns::land::OTHER_FOREST,
            LandCategory::NonForest => columns::land::NON_FOREST,
            LandCategory::Water => columns::land::WATER,
            LandCategory::NonSampled => columns::land::NON_SAMPLED,
        }
    }
}

/// Forest, productive and not reserved.
fn is_timberland(cond: &Condition) -> bool {
    cond.cond_status_cd == 1
        && cond
            .siteclcd
            .is_some_and(|s| PRODUCTIVE_SITE_CLASSES.contains(&s))
        && cond.reservcd == Some(0)
}

impl LandType {
    /// Whether `cond` belongs to this land type. `All` means every
    /// in-universe condition.
    pub fn matches(self, cond: &Condition, universe: &UniverseRule) -> bool {
        match self {
            LandType::Forest => cond.cond_status_cd == 1,
            LandType::Timber => is_timberland(cond),
            LandType::All => universe.contains(cond),
        }
    }
}
