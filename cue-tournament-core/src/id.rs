//! Typed identifiers.
//!
//! [`MatchId`] is a structured identifier carrying the bracket section, the
//! optional group tag, the round and the match index within the round. It is
//! validated at construction (and when parsed from its canonical string code),
//! so a lookup can never silently miss because an ad-hoc string failed to
//! match a pattern.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! id {
    ($name:ident, $id:ty) => {
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        #[repr(transparent)]
        pub struct $name(pub $id);

        impl Display for $name {
            #[inline]
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<$id> for $name {
            #[inline]
            fn from(id: $id) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = <$id as FromStr>::Err;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse::<$id>()?))
            }
        }
    };
}

id!(TournamentId, u64);
id!(ParticipantId, u64);

/// The group a match belongs to in the grouped-32 format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Group {
    A,
    B,
}

impl Group {
    /// Both groups, in bracket order.
    pub const ALL: [Group; 2] = [Group::A, Group::B];
}

impl Display for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// The bracket section a match belongs to.
///
/// `LosersA` rounds pair players who are already in the losers bracket
/// against each other; `LosersB` rounds seat a fresh drop-in from the winners
/// bracket against a losers-bracket survivor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Section {
    Winners,
    LosersA,
    LosersB,
    GroupFinal,
    GrandFinal,
    GrandFinalReset,
}

/// A structured match identifier, unique within a tournament.
///
/// The canonical string form follows the shorthand used by organizers:
/// `W1M3` (winners round 1, match 3), `A-LA2M1` (group A, losers pairing
/// round 2, match 1), `B-F2` (group B, second group-final match), `FINAL`
/// and `RESET` for the grand final and its bracket reset.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchId {
    pub group: Option<Group>,
    pub section: Section,
    /// Round within the section, starting at 1.
    pub round: u16,
    /// Match within the round, starting at 1.
    pub index: u16,
}

impl MatchId {
    pub fn winners(round: u16, index: u16) -> Self {
        debug_assert!(round >= 1 && index >= 1);

        Self {
            group: None,
            section: Section::Winners,
            round,
            index,
        }
    }

    pub fn losers_a(round: u16, index: u16) -> Self {
        debug_assert!(round >= 1 && index >= 1);

        Self {
            group: None,
            section: Section::LosersA,
            round,
            index,
        }
    }

    pub fn losers_b(round: u16, index: u16) -> Self {
        debug_assert!(round >= 1 && index >= 1);

        Self {
            group: None,
            section: Section::LosersB,
            round,
            index,
        }
    }

    /// The `index`-th group-final match (1 or 2) of `group`.
    pub fn group_final(group: Group, index: u16) -> Self {
        debug_assert!(index == 1 || index == 2);

        Self {
            group: Some(group),
            section: Section::GroupFinal,
            round: 1,
            index,
        }
    }

    pub fn grand_final() -> Self {
        Self {
            group: None,
            section: Section::GrandFinal,
            round: 1,
            index: 1,
        }
    }

    pub fn grand_final_reset() -> Self {
        Self {
            group: None,
            section: Section::GrandFinalReset,
            round: 1,
            index: 1,
        }
    }

    /// Returns the same id tagged with `group`.
    pub fn in_group(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }
}

impl Display for MatchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(group) = self.group {
            write!(f, "{}-", group)?;
        }

        match self.section {
            Section::Winners => write!(f, "W{}M{}", self.round, self.index),
            Section::LosersA => write!(f, "LA{}M{}", self.round, self.index),
            Section::LosersB => write!(f, "LB{}M{}", self.round, self.index),
            Section::GroupFinal => write!(f, "F{}", self.index),
            Section::GrandFinal => f.write_str("FINAL"),
            Section::GrandFinalReset => f.write_str("RESET"),
        }
    }
}

/// The error returned when parsing a [`MatchId`] from its canonical code.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid match id `{0}`")]
pub struct ParseIdError(pub String);

impl FromStr for MatchId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError(s.to_owned());

        let (group, rest) = match s.split_once('-') {
            Some(("A", rest)) => (Some(Group::A), rest),
            Some(("B", rest)) => (Some(Group::B), rest),
            Some(_) => return Err(err()),
            None => (None, s),
        };

        let with_group = |id: MatchId| match group {
            Some(group) => id.in_group(group),
            None => id,
        };

        match rest {
            "FINAL" if group.is_none() => return Ok(Self::grand_final()),
            "RESET" if group.is_none() => return Ok(Self::grand_final_reset()),
            _ => (),
        }

        if let Some(index) = rest.strip_prefix('F') {
            let index: u16 = index.parse().map_err(|_| err())?;
            let group = group.ok_or_else(err)?;

            if index != 1 && index != 2 {
                return Err(err());
            }

            return Ok(Self::group_final(group, index));
        }

        let (section, rest) = if let Some(rest) = rest.strip_prefix("LA") {
            (Section::LosersA, rest)
        } else if let Some(rest) = rest.strip_prefix("LB") {
            (Section::LosersB, rest)
        } else if let Some(rest) = rest.strip_prefix('W') {
            (Section::Winners, rest)
        } else {
            return Err(err());
        };

        let (round, index) = rest.split_once('M').ok_or_else(err)?;
        let round: u16 = round.parse().map_err(|_| err())?;
        let index: u16 = index.parse().map_err(|_| err())?;

        if round == 0 || index == 0 {
            return Err(err());
        }

        Ok(with_group(MatchId {
            group: None,
            section,
            round,
            index,
        }))
    }
}
