//! In-memory match storage.
//!
//! [`MatchStore`] keeps every match of one tournament, addressable by id in
//! constant time while preserving bracket creation order for listings. The
//! store is wrapped by [`crate::Tournament`]; all mutation goes through the
//! advancement state machine.

use std::collections::HashMap;

use cue_tournament_core::{Match, MatchId};

#[derive(Clone, Debug)]
pub struct MatchStore {
    order: Vec<MatchId>,
    matches: HashMap<MatchId, Match>,
}

impl MatchStore {
    pub(crate) fn new(matches: Vec<Match>) -> Self {
        let order: Vec<MatchId> = matches.iter().map(|m| m.id).collect();
        let matches = matches.into_iter().map(|m| (m.id, m)).collect();

        Self { order, matches }
    }

    #[inline]
    pub fn get(&self, id: MatchId) -> Option<&Match> {
        self.matches.get(&id)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: MatchId) -> Option<&mut Match> {
        self.matches.get_mut(&id)
    }

    #[inline]
    pub fn contains(&self, id: MatchId) -> bool {
        self.matches.contains_key(&id)
    }

    /// Appends a match materialized after the initial build, i.e. a bracket
    /// reset.
    pub(crate) fn insert(&mut self, m: Match) {
        debug_assert!(!self.contains(m.id));

        self.order.push(m.id);
        self.matches.insert(m.id, m);
    }

    pub(crate) fn remove(&mut self, id: MatchId) -> Option<Match> {
        self.order.retain(|other| *other != id);
        self.matches.remove(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Iterates over all matches in bracket creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Match> + '_ {
        self.order.iter().filter_map(|id| self.matches.get(id))
    }

    /// A point-in-time copy of all matches, in bracket creation order.
    pub fn snapshot(&self) -> Vec<Match> {
        self.iter().cloned().collect()
    }
}
