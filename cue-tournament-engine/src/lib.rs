//! # cue-tournament-engine
//!
//! The stateful half of the tournament system: holds every running
//! tournament, applies match results through the advancement state machine
//! and publishes the resulting events.
//!
//! [`Engine`] is the entry point. It is cheap to share behind an `Arc`; all
//! methods take `&self`. Mutations of one tournament are serialized through a
//! per-tournament lock, so two referees reporting results for the same
//! bracket at the same time can never corrupt it, while unrelated
//! tournaments proceed in parallel.
//!
//! ```no_run
//! use cue_tournament_core::{BracketMode, BracketOptions, Score, TournamentId};
//! use cue_tournament_core::seeding::SeedingMethod;
//! use cue_tournament_engine::Engine;
//!
//! # fn run(participants: &[cue_tournament_core::seeding::Participant]) -> cue_tournament_engine::Result<()> {
//! let engine = Engine::new();
//!
//! let matches = engine.build_bracket(
//!     TournamentId(1),
//!     8,
//!     BracketMode::Single,
//!     participants,
//!     &SeedingMethod::RegistrationOrder,
//!     &BracketOptions::default(),
//! )?;
//!
//! let opener = matches[0].id;
//! let winner = matches[0].slots[0].entrant().unwrap().participant;
//! engine.complete_match(TournamentId(1), opener, winner, Score(5, 3))?;
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod store;

pub mod event;
pub mod tournament;

pub use event::{Event, MatchCompleted, MatchVoided, TournamentCompleted};
pub use store::MatchStore;
pub use tournament::{Progress, SectionProgress, Stage, Tournament, TournamentState};

use std::collections::HashMap;
use std::result;
use std::sync::Arc;

use cue_tournament_core::seeding::{Participant, SeedingMethod};
use cue_tournament_core::{
    BracketMode, BracketOptions, Group, Match, MatchId, MatchStatus, ParticipantId, Score,
    TournamentId,
};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

/// A `Result<T>` using [`enum@Error`] as an error type.
pub type Result<T> = result::Result<T, Error>;

/// Errors returned by the engine. Every rejected operation leaves the
/// tournament exactly as it was.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("unknown tournament {0}")]
    UnknownTournament(TournamentId),
    #[error("tournament {0} already exists")]
    TournamentExists(TournamentId),
    #[error("unknown match {0}")]
    UnknownMatch(MatchId),
    #[error("match {id} is {status}, expected {expected}")]
    InvalidCompletion {
        id: MatchId,
        status: MatchStatus,
        expected: MatchStatus,
    },
    #[error("{participant} is not seated in match {id}")]
    NotAParticipant {
        id: MatchId,
        participant: ParticipantId,
    },
    #[error("match {id} was already decided with a different result")]
    ResultAlreadyFinalized { id: MatchId },
    #[error("the result of {id} was already consumed by completed match {consumed_by}")]
    CannotVoidConsumedResult { id: MatchId, consumed_by: MatchId },
    #[error(transparent)]
    Setup(#[from] cue_tournament_core::Error),
}

/// The tournament registry and the single mutation entry point.
#[derive(Default)]
pub struct Engine {
    tournaments: RwLock<HashMap<TournamentId, Arc<Mutex<Tournament>>>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `participants` and creates the full bracket for a new
    /// tournament, returning every generated match. All-or-nothing: on error
    /// no tournament is registered.
    ///
    /// # Errors
    ///
    /// [`Error::TournamentExists`] if `id` is already registered, or a
    /// [`Error::Setup`] error from seeding or the topology builder.
    pub fn build_bracket(
        &self,
        id: TournamentId,
        capacity: usize,
        mode: BracketMode,
        participants: &[Participant],
        method: &SeedingMethod,
        options: &BracketOptions,
    ) -> Result<Vec<Match>> {
        let mut tournaments = self.tournaments.write();

        if tournaments.contains_key(&id) {
            return Err(Error::TournamentExists(id));
        }

        let tournament = Tournament::new(id, capacity, mode, participants, method, options)?;
        let matches = tournament.store().snapshot();

        tournaments.insert(id, Arc::new(Mutex::new(tournament)));

        Ok(matches)
    }

    /// Removes a finished (or abandoned) tournament from the registry.
    /// Tournaments are never dropped implicitly; this is the only way out.
    pub fn archive(&self, id: TournamentId) -> Result<()> {
        match self.tournaments.write().remove(&id) {
            Some(_) => {
                log::info!("Tournament {} archived", id);
                Ok(())
            }
            None => Err(Error::UnknownTournament(id)),
        }
    }

    /// Records the result of a match. See [`Tournament::complete_match`].
    pub fn complete_match(
        &self,
        tournament: TournamentId,
        id: MatchId,
        winner: ParticipantId,
        score: Score,
    ) -> Result<MatchCompleted> {
        let tournament = self.tournament(tournament)?;
        let mut tournament = tournament.lock();
        tournament.complete_match(id, winner, score)
    }

    /// Reverts a recorded result. See [`Tournament::void_match`].
    pub fn void_match(&self, tournament: TournamentId, id: MatchId) -> Result<MatchVoided> {
        let tournament = self.tournament(tournament)?;
        let mut tournament = tournament.lock();
        tournament.void_match(id)
    }

    /// A point-in-time copy of every match, in bracket creation order.
    pub fn matches(&self, tournament: TournamentId) -> Result<Vec<Match>> {
        let tournament = self.tournament(tournament)?;
        let tournament = tournament.lock();
        Ok(tournament.store().snapshot())
    }

    pub fn get_match(&self, tournament: TournamentId, id: MatchId) -> Result<Match> {
        let tournament = self.tournament(tournament)?;
        let tournament = tournament.lock();
        tournament
            .store()
            .get(id)
            .cloned()
            .ok_or(Error::UnknownMatch(id))
    }

    pub fn state(&self, tournament: TournamentId) -> Result<TournamentState> {
        Ok(self.tournament(tournament)?.lock().state())
    }

    pub fn champion(&self, tournament: TournamentId) -> Result<Option<ParticipantId>> {
        Ok(self.tournament(tournament)?.lock().champion())
    }

    pub fn group_champion(
        &self,
        tournament: TournamentId,
        group: Group,
    ) -> Result<Option<ParticipantId>> {
        Ok(self.tournament(tournament)?.lock().group_champion(group))
    }

    pub fn progress(&self, tournament: TournamentId) -> Result<Progress> {
        Ok(self.tournament(tournament)?.lock().progress())
    }

    /// Subscribes to the tournament's event stream. Events published before
    /// the subscription are not replayed.
    pub fn subscribe(&self, tournament: TournamentId) -> Result<broadcast::Receiver<Event>> {
        Ok(self.tournament(tournament)?.lock().subscribe())
    }

    fn tournament(&self, id: TournamentId) -> Result<Arc<Mutex<Tournament>>> {
        self.tournaments
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownTournament(id))
    }
}
