/// Column-name constants for inventory records.
/// Filters and grouping keys refer to these names (case-insensitive).

// ── Condition columns ────────────────────────────────────────────────────────
pub mod cond {
    pub const PLT_CN: &str = "PLT_CN";
    pub const CONDID: &str = "CONDID";
    pub const COND_STATUS_CD: &str = "COND_STATUS_CD";
    pub const CONDPROP_UNADJ: &str = "CONDPROP_UNADJ";
    pub const PROP_BASIS: &str = "PROP_BASIS";
    pub const SITECLCD: &str = "SITECLCD";
    pub const RESERVCD: &str = "RESERVCD";
    pub const OWNGRPCD: &str = "OWNGRPCD";
    pub const FORTYPCD: &str = "FORTYPCD";
    pub const STDSZCD: &str = "STDSZCD";
    /// Derived land category (see `domain::land::LandCategory`).
    pub const LAND_TYPE: &str = "LAND_TYPE";

    pub const ALL: [&str; 11] = [
        PLT_CN,
        CONDID,
        COND_STATUS_CD,
        CONDPROP_UNADJ,
        PROP_BASIS,
        SITECLCD,
        RESERVCD,
        OWNGRPCD,
        FORTYPCD,
        STDSZCD,
        LAND_TYPE,
    ];
}

// ── Tree columns ─────────────────────────────────────────────────────────────
pub mod tree {
    pub const PLT_CN: &str = "PLT_CN";
    pub const CONDID: &str = "CONDID";
    pub const TREE: &str = "TREE";
    pub const STATUSCD: &str = "STATUSCD";
    pub const SPCD: &str = "SPCD";
    pub const DIA: &str = "DIA";
    pub const TREE_BASIS: &str = "TREE_BASIS";
    pub const TPA_UNADJ: &str = "TPA_UNADJ";
    pub const VOLCFNET: &str = "VOLCFNET";
    pub const VOLCFGRS: &str = "VOLCFGRS";
    pub const DRYBIO_AG: &str = "DRYBIO_AG";
    pub const TPAGROW_UNADJ: &str = "TPAGROW_UNADJ";
    pub const TPAMORT_UNADJ: &str = "TPAMORT_UNADJ";
    pub const GROWCFAL: &str = "GROWCFAL";
    pub const COMPONENT: &str = "COMPONENT";

    pub const ALL: [&str; 15] = [
        PLT_CN,
        CONDID,
        TREE,
        STATUSCD,
        SPCD,
        DIA,
        TREE_BASIS,
        TPA_UNADJ,
        VOLCFNET,
        VOLCFGRS,
        DRYBIO_AG,
        TPAGROW_UNADJ,
        TPAMORT_UNADJ,
        GROWCFAL,
        COMPONENT,
    ];
}

// ── Land category labels (values of LAND_TYPE) ──────────────────────────────
pub mod land {
    pub const TIMBER: &str = "Timber";
    pub const OTHER_FOREST: &str = "OtherForest";
    pub const NON_FOREST: &str = "NonForest";
    pub const WATER: &str = "Water";
    pub const NON_SAMPLED: &str = "NonSampled";
}
