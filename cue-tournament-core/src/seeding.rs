//! Participant seeding.
//!
//! Orders a confirmed roster into the opening-round slots of a bracket. The
//! roster must match the bracket capacity exactly: registration is closed
//! before a bracket is built, so a short roster is a registration bug and is
//! reported as such instead of being papered over with byes.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, ParticipantId, Result};

/// A confirmed tournament participant with their seeding keys.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Participant {
    pub id: ParticipantId,
    pub registered_at: DateTime<Utc>,
    pub rating: u32,
}

/// How the opening-round slots are assigned.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SeedingMethod {
    /// Stable order by registration timestamp.
    RegistrationOrder,
    /// Fisher-Yates shuffle. The seed is logged so a draw can be reproduced;
    /// when `None` a fresh one is drawn from the OS.
    Random { seed: Option<u64> },
    /// Descending by rating, folded into standard bracket positions so the
    /// top seeds cannot meet before the late rounds.
    RatingBased,
}

impl FromStr for SeedingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "registration_order" => Ok(Self::RegistrationOrder),
            "random" => Ok(Self::Random { seed: None }),
            "rating_based" => Ok(Self::RatingBased),
            _ => Err(Error::InvalidMethod(s.to_owned())),
        }
    }
}

/// Assigns each opening-round slot a participant.
///
/// The returned vector has length `capacity`; slots `2i` and `2i + 1` meet in
/// the `i`-th opening match. In grouped mode the first half of the slots is
/// group A, the second half group B.
///
/// # Errors
///
/// Returns [`Error::UnsupportedCapacity`] when `capacity` is not a power of
/// two, and [`Error::InsufficientParticipants`] when the roster size differs
/// from `capacity`.
pub fn seed(
    participants: &[Participant],
    method: &SeedingMethod,
    capacity: usize,
) -> Result<Vec<ParticipantId>> {
    // Brackets only exist for powers of two; the fold below assumes it.
    if capacity == 0 || !capacity.is_power_of_two() {
        return Err(Error::UnsupportedCapacity { found: capacity });
    }

    if participants.len() != capacity {
        return Err(Error::InsufficientParticipants {
            expected: capacity,
            found: participants.len(),
        });
    }

    let mut slots: Vec<ParticipantId> = match method {
        SeedingMethod::RegistrationOrder => {
            let mut ordered: Vec<&Participant> = participants.iter().collect();
            ordered.sort_by_key(|p| (p.registered_at, p.id));
            ordered.iter().map(|p| p.id).collect()
        }
        SeedingMethod::Random { seed } => {
            let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
            log::info!("Shuffling {} participants with seed {}", capacity, seed);

            let mut rng = StdRng::seed_from_u64(seed);
            let mut ids: Vec<ParticipantId> = participants.iter().map(|p| p.id).collect();
            ids.shuffle(&mut rng);
            ids
        }
        SeedingMethod::RatingBased => {
            let mut ordered: Vec<&Participant> = participants.iter().collect();
            ordered.sort_by_key(|p| (std::cmp::Reverse(p.rating), p.registered_at, p.id));

            seeding_order(capacity)
                .into_iter()
                .map(|rank| ordered[rank].id)
                .collect()
        }
    };

    debug_assert_eq!(slots.len(), capacity);
    slots.shrink_to_fit();
    Ok(slots)
}

/// The standard bracket fold: returns, per slot, the rank of the seed placed
/// there, such that seeds 1 and 2 can only meet in the last round, 1-4 in the
/// last two, and so on. For 8 slots this yields `1v8, 4v5, 2v7, 3v6`.
fn seeding_order(capacity: usize) -> Vec<usize> {
    let mut order = vec![0];

    let mut size = 1;
    while size < capacity {
        size *= 2;

        let mut next = Vec::with_capacity(size);
        for &rank in &order {
            next.push(rank);
            next.push(size - 1 - rank);
        }
        order = next;
    }

    order
}
