//! # cue-tournament-core
//!
//! The pure bracket model for cue-sports tournaments: structured match
//! identifiers, the match/slot data model, participant seeding and the
//! double-elimination topology builder.
//!
//! Important types:
//! - [`MatchId`]: a structured, validated match identifier.
//! - [`Match`]: a match record with two [`Slot`]s and precomputed
//!   advancement targets.
//! - [`Slot`]: a spot within a match, either a seated [`Entrant`] or a
//!   pending reference to the winner or loser of another match.
//! - [`topology::build`]: generates every match placeholder and the
//!   [`BracketGraph`] for a tournament, with all advancement targets
//!   computed once, up front.
//! - [`seeding::seed`]: orders a confirmed roster into the opening slots.
//!
//! The crate performs no I/O and holds no mutable state; the advancement
//! state machine lives in `cue-tournament-engine`.
//!
//! ## Feature Flags
//!
//! `serde`: Adds `Serialize` and `Deserialize` impls to all model types.

pub mod id;
pub mod seeding;
pub mod topology;

pub use id::{Group, MatchId, ParticipantId, Section, TournamentId};
pub use topology::{Bracket, BracketGraph, BracketMode, BracketOptions, GroupFinalPairing};

use std::fmt::{self, Display, Formatter};
use std::result;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A `Result<T>` using [`enum@Error`] as an error type.
pub type Result<T> = result::Result<T, Error>;

/// Errors raised while setting a bracket up. Setup is all-or-nothing: any of
/// these aborts bracket creation without a partial bracket.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("unsupported capacity {found}: single mode supports 8, 16 or 32, grouped mode exactly 32")]
    UnsupportedCapacity { found: usize },
    #[error("roster does not match capacity: expected {expected} participants, found {found}")]
    InsufficientParticipants { expected: usize, found: usize },
    #[error("invalid seeding method `{0}`")]
    InvalidMethod(String),
}

/// Which half of the bracket a participant currently stands in.
///
/// Every participant starts on the winners side and moves to the losers side
/// with their first loss. The tag travels with the participant through every
/// slot they are seated into, which is what makes the bracket-reset rule
/// decidable when a grand finalist arrives via a group final.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Side {
    Winners,
    Losers,
}

/// A seated participant together with their current [`Side`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entrant {
    pub participant: ParticipantId,
    pub side: Side,
}

impl Entrant {
    #[inline]
    pub fn new(participant: ParticipantId, side: Side) -> Self {
        Self { participant, side }
    }
}

/// A spot within a match.
///
/// A slot is never silently empty: before it is filled it names the exact
/// match whose outcome will fill it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Slot {
    /// Waiting for the winner of the referenced match.
    WinnerOf(MatchId),
    /// Waiting for the loser of the referenced match.
    LoserOf(MatchId),
    /// A seated participant.
    Entrant(Entrant),
}

impl Slot {
    /// Returns `true` if the slot holds a seated participant.
    #[inline]
    pub fn is_entrant(&self) -> bool {
        matches!(self, Self::Entrant(_))
    }

    /// Returns the seated entrant, if any.
    #[inline]
    pub fn entrant(&self) -> Option<&Entrant> {
        match self {
            Self::Entrant(entrant) => Some(entrant),
            _ => None,
        }
    }
}

/// The lifecycle of a single match. Transitions only move forward, except
/// through an explicit administrative void.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatchStatus {
    /// At least one slot is still a pending reference.
    Pending,
    /// Both slots are seated; a result can be reported.
    Ready,
    /// A result has been recorded and propagated.
    Completed,
}

impl Display for MatchStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Ready => f.write_str("ready"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// Racks won per slot. Opaque to the engine beyond equality; a completed
/// match has exactly one winner regardless of the score reported with it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Score(pub u16, pub u16);

impl Display for Score {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// A reference to one slot of a downstream match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotRef {
    pub id: MatchId,
    /// Slot index within the target match, 0 or 1.
    pub slot: usize,
}

impl SlotRef {
    #[inline]
    pub fn new(id: MatchId, slot: usize) -> Self {
        debug_assert!(slot < 2);

        Self { id, slot }
    }
}

/// A match record: the unit of work of a tournament.
///
/// `advances_winner_to` and `advances_loser_to` are computed once when the
/// topology is built and never recalculated afterwards. A match without
/// `advances_loser_to` is a final elimination for its loser.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub id: MatchId,
    pub slots: [Slot; 2],
    pub status: MatchStatus,
    pub winner: Option<ParticipantId>,
    pub loser: Option<ParticipantId>,
    pub score: Option<Score>,
    pub advances_winner_to: Option<SlotRef>,
    pub advances_loser_to: Option<SlotRef>,
}

impl Match {
    /// Creates a new match. The initial status is derived from the slots:
    /// `Ready` if both are seated, `Pending` otherwise.
    pub fn new(
        id: MatchId,
        slots: [Slot; 2],
        advances_winner_to: Option<SlotRef>,
        advances_loser_to: Option<SlotRef>,
    ) -> Self {
        let status = if slots.iter().all(Slot::is_entrant) {
            MatchStatus::Ready
        } else {
            MatchStatus::Pending
        };

        Self {
            id,
            slots,
            status,
            winner: None,
            loser: None,
            score: None,
            advances_winner_to,
            advances_loser_to,
        }
    }

    /// Returns the seated entrant matching `participant`, if any.
    pub fn entrant(&self, participant: ParticipantId) -> Option<&Entrant> {
        self.slots
            .iter()
            .filter_map(Slot::entrant)
            .find(|entrant| entrant.participant == participant)
    }

    /// Returns the seated entrant other than `participant`, if any.
    pub fn opponent_of(&self, participant: ParticipantId) -> Option<&Entrant> {
        self.slots
            .iter()
            .filter_map(Slot::entrant)
            .find(|entrant| entrant.participant != participant)
    }

    /// Seats `entrant` into the slot at `index` and flips the match to
    /// `Ready` once both slots are seated.
    pub fn seat(&mut self, index: usize, entrant: Entrant) {
        self.slots[index] = Slot::Entrant(entrant);

        if self.status == MatchStatus::Pending && self.slots.iter().all(Slot::is_entrant) {
            log::debug!("Match {} is ready", self.id);
            self.status = MatchStatus::Ready;
        }
    }
}
