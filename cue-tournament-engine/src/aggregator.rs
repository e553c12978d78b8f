//! Cross-group aggregation.
//!
//! In the grouped-32 format the group finals and the grand final are fed by
//! matches from different parts of the bracket. The advancement state machine
//! seats those slots synchronously as results come in; the aggregator is the
//! reconciliation sweep run after every completion in a grouped tournament.
//! It re-derives every finals-stage slot from the completed feeder matches,
//! so a re-delivered completion event is a no-op and a partially seated
//! finals stage is healed instead of corrupted.

use cue_tournament_core::{
    BracketGraph, BracketMode, Entrant, Group, MatchId, MatchStatus, ParticipantId, Section, Side,
    Slot,
};

use crate::event::MatchCompleted;
use crate::store::MatchStore;

pub struct GroupAggregator;

impl GroupAggregator {
    /// Seats every finals-stage slot whose feeder match has been decided.
    ///
    /// Idempotent: slots that already hold a participant are left untouched,
    /// and feeders that are still undecided leave their slots pending.
    pub(crate) fn observe(store: &mut MatchStore, graph: &BracketGraph, event: &MatchCompleted) {
        if graph.mode() != BracketMode::Grouped32 {
            return;
        }

        log::trace!("Aggregating finals stage after {}", event.id);

        let finals: Vec<MatchId> = store
            .iter()
            .filter(|m| {
                m.status == MatchStatus::Pending
                    && matches!(
                        m.id.section,
                        Section::GroupFinal | Section::GrandFinal | Section::GrandFinalReset
                    )
            })
            .map(|m| m.id)
            .collect();

        for id in finals {
            for slot_index in 0..2 {
                let (feeder, wants_winner) = match store.get(id).map(|m| m.slots[slot_index]) {
                    Some(Slot::WinnerOf(feeder)) => (feeder, true),
                    Some(Slot::LoserOf(feeder)) => (feeder, false),
                    _ => continue,
                };

                let seated = {
                    let Some(feeder) = store.get(feeder) else {
                        continue;
                    };
                    if feeder.status != MatchStatus::Completed {
                        continue;
                    }

                    if wants_winner {
                        match feeder.winner.and_then(|w| feeder.entrant(w).copied()) {
                            Some(entrant) => entrant,
                            None => continue,
                        }
                    } else {
                        match feeder.loser {
                            Some(loser) => Entrant::new(loser, Side::Losers),
                            None => continue,
                        }
                    }
                };

                if let Some(target) = store.get_mut(id) {
                    log::debug!(
                        "Seating {} into {} slot {}",
                        seated.participant,
                        id,
                        slot_index
                    );
                    target.seat(slot_index, seated);
                }
            }
        }
    }

    /// The decided champion of `group`, if any.
    ///
    /// With full double-elimination groups a materialized bracket reset takes
    /// over from the first group-final match: until the reset is played the
    /// group has no champion.
    pub(crate) fn group_champion(
        store: &MatchStore,
        graph: &BracketGraph,
        group: Group,
    ) -> Option<ParticipantId> {
        let f1 = MatchId::group_final(group, 1);

        if let Some(reset) = graph.reset_of(f1) {
            if let Some(reset) = store.get(reset) {
                return reset.winner;
            }
        }

        store.get(f1).and_then(|m| m.winner)
    }
}
