//! A single running tournament.
//!
//! [`Tournament`] owns the match store, the immutable advancement graph and
//! the outbound event channel. All mutation funnels through
//! [`Tournament::complete_match`] and [`Tournament::void_match`]; the
//! [`crate::Engine`] serializes callers so each of those runs as one atomic
//! step: validate, record, propagate, publish. Observers never see a winner
//! recorded whose advancement has not happened yet.

use cue_tournament_core::seeding::{self, Participant, SeedingMethod};
use cue_tournament_core::{
    topology, BracketGraph, BracketMode, BracketOptions, Entrant, Group, Match, MatchId,
    MatchStatus, ParticipantId, Score, Section, Side, Slot, SlotRef, TournamentId,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::aggregator::GroupAggregator;
use crate::event::{Event, MatchCompleted, MatchVoided, TournamentCompleted};
use crate::store::MatchStore;
use crate::{Error, Result};

/// Events buffered per tournament before a slow subscriber starts lagging.
const EVENT_BUFFER: usize = 64;

/// The lifecycle of a tournament.
///
/// Registration happens before the engine is involved; every tournament the
/// engine holds starts in `Seeded`. Transitions move strictly forward,
/// except that voiding a deciding match reopens a `Completed` tournament to
/// `InProgress`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentState {
    /// The bracket is built and the opening round is playable.
    Seeded,
    /// At least one result has been recorded.
    InProgress,
    /// The champion is decided and no playable match remains.
    Completed,
}

/// Coarse progress of a tournament, for listings and live overlays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub state: TournamentState,
    pub stage: Stage,
    pub total: usize,
    pub completed: usize,
    pub sections: Vec<SectionProgress>,
}

/// The earliest bracket stage that still has undecided matches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    WinnersBracket,
    LosersBracket,
    GroupFinals,
    GrandFinal,
    Complete,
}

/// Match counts for one bracket section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionProgress {
    pub group: Option<Group>,
    pub section: Section,
    pub total: usize,
    pub completed: usize,
}

pub struct Tournament {
    id: TournamentId,
    state: TournamentState,
    store: MatchStore,
    graph: BracketGraph,
    champion: Option<ParticipantId>,
    events: broadcast::Sender<Event>,
}

impl Tournament {
    /// Seeds the roster, builds the bracket and returns the tournament in
    /// [`TournamentState::Seeded`]. All-or-nothing: any error leaves nothing
    /// behind.
    pub(crate) fn new(
        id: TournamentId,
        capacity: usize,
        mode: BracketMode,
        participants: &[Participant],
        method: &SeedingMethod,
        options: &BracketOptions,
    ) -> Result<Self> {
        let seeds = seeding::seed(participants, method, capacity)?;
        let bracket = topology::build(mode, options, &seeds)?;
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        log::info!(
            "Tournament {} seeded: {:?}, {} participants, {} matches",
            id,
            mode,
            capacity,
            bracket.matches.len()
        );

        Ok(Self {
            id,
            state: TournamentState::Seeded,
            store: MatchStore::new(bracket.matches),
            graph: bracket.graph,
            champion: None,
            events,
        })
    }

    #[inline]
    pub fn id(&self) -> TournamentId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> TournamentState {
        self.state
    }

    #[inline]
    pub fn champion(&self) -> Option<ParticipantId> {
        self.champion
    }

    #[inline]
    pub fn store(&self) -> &MatchStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn group_champion(&self, group: Group) -> Option<ParticipantId> {
        GroupAggregator::group_champion(&self.store, &self.graph, group)
    }

    /// Records the result of a match and propagates it through the bracket.
    ///
    /// Retrying a completion with the identical winner and score is a no-op
    /// returning the original event, so a caller that lost the first response
    /// can safely resubmit.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMatch`] if `id` does not exist,
    /// [`Error::InvalidCompletion`] if the match is not ready,
    /// [`Error::NotAParticipant`] if `winner` is not seated in it, and
    /// [`Error::ResultAlreadyFinalized`] on a retry with a different result.
    pub fn complete_match(
        &mut self,
        id: MatchId,
        winner: ParticipantId,
        score: Score,
    ) -> Result<MatchCompleted> {
        let m = self.store.get(id).ok_or(Error::UnknownMatch(id))?;

        if m.status == MatchStatus::Completed {
            if let (Some(recorded), Some(loser), Some(recorded_score)) =
                (m.winner, m.loser, m.score)
            {
                if recorded == winner && recorded_score == score {
                    log::debug!("Match {} already recorded with this result", id);

                    return Ok(MatchCompleted {
                        tournament: self.id,
                        id,
                        winner,
                        loser,
                        score,
                    });
                }
            }

            return Err(Error::ResultAlreadyFinalized { id });
        }

        if m.status != MatchStatus::Ready {
            return Err(Error::InvalidCompletion {
                id,
                status: m.status,
                expected: MatchStatus::Ready,
            });
        }

        // Ready implies both slots are seated.
        let (winner_entrant, loser_entrant) =
            match (m.slots[0].entrant().copied(), m.slots[1].entrant().copied()) {
                (Some(first), Some(second)) if first.participant == winner => (first, second),
                (Some(first), Some(second)) if second.participant == winner => (second, first),
                _ => {
                    return Err(Error::NotAParticipant {
                        id,
                        participant: winner,
                    })
                }
            };

        let advances_winner = m.advances_winner_to;
        let advances_loser = m.advances_loser_to;

        if let Some(m) = self.store.get_mut(id) {
            m.status = MatchStatus::Completed;
            m.winner = Some(winner_entrant.participant);
            m.loser = Some(loser_entrant.participant);
            m.score = Some(score);
        }

        log::debug!(
            "Match {}: {} defeats {} ({})",
            id,
            winner_entrant.participant,
            loser_entrant.participant,
            score
        );

        if self.state == TournamentState::Seeded {
            self.state = TournamentState::InProgress;
        }

        // A bracket reset is owed when the losers-side finalist beats the
        // winners-side finalist: both then stand at one loss.
        let mut reset_materialized = false;
        if let Some(reset) = self.graph.reset_of(id) {
            if winner_entrant.side == Side::Losers && loser_entrant.side == Side::Winners {
                self.materialize_reset(id, reset, winner_entrant, loser_entrant);
                reset_materialized = true;
            }
        }

        if !reset_materialized {
            if let Some(target) = advances_winner {
                self.fill(target, winner_entrant);
            }

            if matches!(id.section, Section::GrandFinal | Section::GrandFinalReset) {
                log::info!(
                    "Tournament {}: champion decided, {}",
                    self.id,
                    winner_entrant.participant
                );
                self.champion = Some(winner_entrant.participant);
            }
        }

        if let Some(target) = advances_loser {
            self.fill(target, Entrant::new(loser_entrant.participant, Side::Losers));
        }

        let event = MatchCompleted {
            tournament: self.id,
            id,
            winner: winner_entrant.participant,
            loser: loser_entrant.participant,
            score,
        };
        let _ = self.events.send(Event::MatchCompleted(event.clone()));

        GroupAggregator::observe(&mut self.store, &self.graph, &event);

        self.try_complete();

        Ok(event)
    }

    /// Administratively reverts a recorded result, returning the match to
    /// `Ready` and its downstream slots to pending references.
    ///
    /// Two-phase: every precondition is checked before any state changes, so
    /// a refused void leaves the tournament untouched.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMatch`] if `id` does not exist,
    /// [`Error::InvalidCompletion`] if the match is not completed, and
    /// [`Error::CannotVoidConsumedResult`] if a downstream match already
    /// consumed the result by completing.
    pub fn void_match(&mut self, id: MatchId) -> Result<MatchVoided> {
        let m = self.store.get(id).ok_or(Error::UnknownMatch(id))?;

        if m.status != MatchStatus::Completed {
            return Err(Error::InvalidCompletion {
                id,
                status: m.status,
                expected: MatchStatus::Completed,
            });
        }

        let advances_winner = m.advances_winner_to;
        let advances_loser = m.advances_loser_to;

        // A materialized reset consumed the winner instead of the regular
        // winner target.
        let reset = self
            .graph
            .reset_of(id)
            .filter(|reset| self.store.contains(*reset));

        let consumed_by = |store: &MatchStore, target: MatchId| {
            (store.get(target).map(|m| m.status) == Some(MatchStatus::Completed))
                .then_some(target)
        };

        let winner_consumer = match reset {
            Some(reset) => consumed_by(&self.store, reset),
            None => advances_winner.and_then(|target| consumed_by(&self.store, target.id)),
        };
        let loser_consumer = advances_loser.and_then(|target| consumed_by(&self.store, target.id));

        if let Some(consumed_by) = winner_consumer.or(loser_consumer) {
            return Err(Error::CannotVoidConsumedResult { id, consumed_by });
        }

        // All checks passed; apply.
        if let Some(reset) = reset {
            log::debug!("Removing unplayed bracket reset {}", reset);
            self.store.remove(reset);
        }

        if let Some(target) = advances_winner {
            self.revert_slot(target, Slot::WinnerOf(id));
        }
        if let Some(target) = advances_loser {
            self.revert_slot(target, Slot::LoserOf(id));
        }

        if let Some(m) = self.store.get_mut(id) {
            m.status = MatchStatus::Ready;
            m.winner = None;
            m.loser = None;
            m.score = None;
        }

        if matches!(id.section, Section::GrandFinal | Section::GrandFinalReset) {
            self.champion = None;
            if self.state == TournamentState::Completed {
                log::info!("Tournament {} reopened by voiding {}", self.id, id);
                self.state = TournamentState::InProgress;
            }
        }

        log::debug!("Match {} voided", id);

        let event = MatchVoided {
            tournament: self.id,
            id,
        };
        let _ = self.events.send(Event::MatchVoided(event.clone()));

        Ok(event)
    }

    pub fn progress(&self) -> Progress {
        let mut sections: Vec<SectionProgress> = Vec::new();
        let mut completed = 0;

        for m in self.store.iter() {
            let done = m.status == MatchStatus::Completed;
            if done {
                completed += 1;
            }

            match sections
                .iter_mut()
                .find(|s| s.group == m.id.group && s.section == m.id.section)
            {
                Some(section) => {
                    section.total += 1;
                    section.completed += usize::from(done);
                }
                None => sections.push(SectionProgress {
                    group: m.id.group,
                    section: m.id.section,
                    total: 1,
                    completed: usize::from(done),
                }),
            }
        }

        let open = |section: Section| {
            sections
                .iter()
                .any(|s| s.section == section && s.completed < s.total)
        };

        let stage = if self.state == TournamentState::Completed {
            Stage::Complete
        } else if open(Section::Winners) {
            Stage::WinnersBracket
        } else if open(Section::LosersA) || open(Section::LosersB) {
            Stage::LosersBracket
        } else if open(Section::GroupFinal) {
            Stage::GroupFinals
        } else {
            Stage::GrandFinal
        };

        Progress {
            state: self.state,
            stage,
            total: self.store.len(),
            completed,
            sections,
        }
    }

    /// Seats `entrant` into the referenced slot. Slots holding a participant
    /// are never overwritten, which makes repeated propagation harmless.
    fn fill(&mut self, target: SlotRef, entrant: Entrant) {
        let Some(m) = self.store.get_mut(target.id) else {
            return;
        };

        if m.slots[target.slot].is_entrant() {
            return;
        }

        log::debug!(
            "Seating {} into {} slot {}",
            entrant.participant,
            target.id,
            target.slot
        );
        m.seat(target.slot, entrant);
    }

    /// Creates the bracket-reset match for `parent` and redirects the slot
    /// downstream of `parent` to wait on the reset instead.
    fn materialize_reset(
        &mut self,
        parent: MatchId,
        reset: MatchId,
        winner: Entrant,
        loser: Entrant,
    ) {
        log::info!(
            "Bracket reset: {} forced {} by winning {}",
            winner.participant,
            reset,
            parent
        );

        let advances = self.graph.advances(reset);
        // Slot 0 holds the winners-side finalist, matching the parent.
        self.store.insert(Match::new(
            reset,
            [Slot::Entrant(loser), Slot::Entrant(winner)],
            advances.winner,
            advances.loser,
        ));

        if let Some(target) = advances.winner {
            if let Some(m) = self.store.get_mut(target.id) {
                if !m.slots[target.slot].is_entrant() {
                    m.slots[target.slot] = Slot::WinnerOf(reset);
                }
            }
        }
    }

    /// Restores a downstream slot to a pending reference, dropping the match
    /// back to `Pending` if it was waiting to be played.
    fn revert_slot(&mut self, target: SlotRef, slot: Slot) {
        let Some(m) = self.store.get_mut(target.id) else {
            return;
        };

        debug_assert_ne!(m.status, MatchStatus::Completed);

        m.slots[target.slot] = slot;
        if m.status == MatchStatus::Ready {
            log::debug!("Match {} is pending again", m.id);
            m.status = MatchStatus::Pending;
        }
    }

    /// Closes the tournament once the champion is decided and every match,
    /// placement matches included, has been played.
    fn try_complete(&mut self) {
        if self.state == TournamentState::Completed {
            return;
        }

        let Some(champion) = self.champion else {
            return;
        };

        if self
            .store
            .iter()
            .all(|m| m.status == MatchStatus::Completed)
        {
            log::info!("Tournament {} completed, champion {}", self.id, champion);
            self.state = TournamentState::Completed;

            let _ = self
                .events
                .send(Event::TournamentCompleted(TournamentCompleted {
                    tournament: self.id,
                    champion,
                }));
        }
    }
}
