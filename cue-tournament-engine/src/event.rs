//! Outbound events.
//!
//! Every state change that matters to a consumer (live scoreboards, result
//! feeds) is published exactly once per transition on a broadcast channel.
//! Voiding a match emits a new [`MatchVoided`] event; the original
//! [`MatchCompleted`] event is never retracted.

use cue_tournament_core::{MatchId, ParticipantId, Score, TournamentId};
use serde::{Deserialize, Serialize};

/// A state change of a tournament.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    MatchCompleted(MatchCompleted),
    MatchVoided(MatchVoided),
    TournamentCompleted(TournamentCompleted),
}

/// A result was recorded and propagated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCompleted {
    pub tournament: TournamentId,
    pub id: MatchId,
    pub winner: ParticipantId,
    pub loser: ParticipantId,
    pub score: Score,
}

/// A previously recorded result was administratively reverted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchVoided {
    pub tournament: TournamentId,
    pub id: MatchId,
}

/// The champion is decided and no playable match remains.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentCompleted {
    pub tournament: TournamentId,
    pub champion: ParticipantId,
}
