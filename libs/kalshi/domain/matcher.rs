use crate::domain::catalog::LegCatalog;
use crate::domain::models::CommandError;
use std::collections::BTreeSet;

/// How a target set is compared against an RFQ's legs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Match when the target is a subset of the RFQ's legs
    #[default]
    Superset,
    /// Match only when the leg sets are identical
    Exact,
}

/// Holds the operator's target leg set and decides which RFQs match it
#[derive(Debug, Default)]
pub struct TargetMatcher {
    target: BTreeSet<String>,
    mode: MatchMode,
}

impl TargetMatcher {
    pub fn new(mode: MatchMode) -> Self {
        Self {
            target: BTreeSet::new(),
            mode,
        }
    }

    /// Replace the target set wholesale
    ///
    /// Every id must already exist in the catalog; on the first unknown id
    /// the previous target is left untouched. Ids are normalized to upper
    /// case before validation.
    pub fn set_target(
        &mut self,
        leg_ids: impl IntoIterator<Item = String>,
        catalog: &LegCatalog,
    ) -> Result<(), CommandError> {
        let normalized: BTreeSet<String> =
            leg_ids.into_iter().map(|id| id.to_uppercase()).collect();

        for id in &normalized {
            if !catalog.contains(id) {
                return Err(CommandError::UnknownLeg(id.clone()));
            }
        }

        self.target = normalized;
        Ok(())
    }

    /// Current target ids, sorted
    pub fn target(&self) -> Vec<String> {
        self.target.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// True iff the target is non-empty and the RFQ's legs satisfy the
    /// configured match mode. An empty target never matches anything.
    pub fn matches(&self, rfq_leg_ids: &[String]) -> bool {
        if self.target.is_empty() {
            return false;
        }

        let rfq_set: BTreeSet<String> = rfq_leg_ids.iter().map(|id| id.to_uppercase()).collect();

        match self.mode {
            MatchMode::Superset => self.target.is_subset(&rfq_set),
            MatchMode::Exact => self.target == rfq_set,
        }
    }
}
