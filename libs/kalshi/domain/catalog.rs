use crate::domain::models::Leg;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Append-only catalog of every leg ever seen on the feed
///
/// Legs are keyed by their normalized `SIDE:MARKET_TICKER` id. Insertion is
/// idempotent and nothing is ever removed, so any leg id accepted into a
/// target stays resolvable for the life of the process.
#[derive(Debug, Default)]
pub struct LegCatalog {
    legs: HashMap<String, Leg>,
}

impl LegCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert any unseen legs from an RFQ, returning their ids in feed order
    ///
    /// Re-observing a known leg is a no-op; the first-seen entry wins.
    pub fn observe<'a>(&mut self, legs: impl IntoIterator<Item = &'a Leg>) -> Vec<String> {
        let mut ids = Vec::new();
        for leg in legs {
            if !self.legs.contains_key(&leg.id) {
                debug!("New leg: {} ({} -> {})", leg.id, leg.sport, leg.category);
                self.legs.insert(leg.id.clone(), leg.clone());
            }
            ids.push(leg.id.clone());
        }
        ids
    }

    pub fn contains(&self, leg_id: &str) -> bool {
        self.legs.contains_key(leg_id)
    }

    pub fn get(&self, leg_id: &str) -> Option<&Leg> {
        self.legs.get(leg_id)
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Legs grouped sport -> category -> sorted list, for the snapshot surface
    pub fn grouped(&self) -> BTreeMap<String, BTreeMap<String, Vec<Leg>>> {
        let mut grouped: BTreeMap<String, BTreeMap<String, Vec<Leg>>> = BTreeMap::new();
        for leg in self.legs.values() {
            grouped
                .entry(leg.sport.clone())
                .or_default()
                .entry(leg.category.clone())
                .or_default()
                .push(leg.clone());
        }
        for categories in grouped.values_mut() {
            for legs in categories.values_mut() {
                legs.sort_by(|a, b| a.id.cmp(&b.id));
            }
        }
        grouped
    }
}
