//! Bracket topology.
//!
//! [`build`] generates every match placeholder for a tournament, with each
//! match's `advances_winner_to` / `advances_loser_to` computed once, bottom
//! up, and stored on the match. Nothing is derived lazily at advancement
//! time: a completed match always knows exactly which downstream slots its
//! winner and loser move into.
//!
//! The builder first lays out every match with its slots expressed as
//! [`Slot::WinnerOf`] / [`Slot::LoserOf`] references, then inverts those
//! references into the advancement targets. Both views are therefore
//! consistent by construction and every losers-bracket match has exactly two
//! incoming feeds.

use std::collections::HashMap;

use crate::{
    Entrant, Error, Group, Match, MatchId, ParticipantId, Result, Side, Slot, SlotRef,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The shape of a tournament bracket.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BracketMode {
    /// One double-elimination bracket of 8, 16 or 32 players.
    Single,
    /// Two double-elimination groups of 16 feeding a cross-group final.
    Grouped32,
}

/// How the two group-final matches of the grouped-32 format are seated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GroupFinalPairing {
    /// `F1`: winners champion vs losers champion,
    /// `F2`: winners runner-up vs losers runner-up.
    ChampionVsChampion,
    /// `F1`: winners champion vs losers runner-up,
    /// `F2`: winners runner-up vs losers champion.
    ChampionVsRunnerUp,
}

/// Build-time options. The group-final shape was inconsistent across the
/// historical format descriptions, so it is policy here rather than a
/// hardcoded rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BracketOptions {
    pub group_final_pairing: GroupFinalPairing,
    /// When `true` (the default), the winners-final loser and the
    /// losers-final loser qualify for the second group-final match instead
    /// of dropping out, and `F1` alone decides the group champion. When
    /// `false`, each group is a full double elimination: `F1` is the group's
    /// own grand final and `F2` its dormant bracket reset.
    pub runner_up_qualification: bool,
}

impl Default for BracketOptions {
    fn default() -> Self {
        Self {
            group_final_pairing: GroupFinalPairing::ChampionVsChampion,
            runner_up_qualification: true,
        }
    }
}

/// Where a match sends its winner and loser. Absent targets are terminal:
/// no winner target means the match decides a champion or a placement, no
/// loser target means the loser is out of the tournament.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Advances {
    pub winner: Option<SlotRef>,
    pub loser: Option<SlotRef>,
}

/// The immutable advancement graph of a bracket.
///
/// Owned by the topology builder, shared read-only afterwards. Also records
/// the dormant bracket-reset matches, which exist in the graph from the
/// start but are only materialized as match records if they are ever needed.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BracketGraph {
    mode: BracketMode,
    capacity: usize,
    advances: HashMap<MatchId, Advances>,
    resets: HashMap<MatchId, MatchId>,
    grand_final: MatchId,
}

impl BracketGraph {
    #[inline]
    pub fn mode(&self) -> BracketMode {
        self.mode
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn grand_final(&self) -> MatchId {
        self.grand_final
    }

    /// The advancement targets of `id`. Dormant reset matches have an entry
    /// inheriting their parent's winner target.
    #[inline]
    pub fn advances(&self, id: MatchId) -> Advances {
        self.advances.get(&id).copied().unwrap_or_default()
    }

    /// The dormant reset match attached to `id`, if the format defines one.
    #[inline]
    pub fn reset_of(&self, id: MatchId) -> Option<MatchId> {
        self.resets.get(&id).copied()
    }
}

/// A freshly built bracket: all match placeholders plus the graph.
#[derive(Clone, Debug)]
pub struct Bracket {
    pub matches: Vec<Match>,
    pub graph: BracketGraph,
}

impl Bracket {
    /// Structural self-check: match counts, reference integrity and acyclic
    /// winner chains terminating at the grand final (or a terminal placement
    /// match). Primarily a test aid; `build` output always passes.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();

        let expected = match self.graph.mode {
            BracketMode::Single => self.graph.capacity * 2 - 2,
            BracketMode::Grouped32 => 61,
        };
        if self.matches.len() != expected {
            errors.push(format!(
                "expected {} matches, found {}",
                expected,
                self.matches.len()
            ));
        }

        let by_id: HashMap<MatchId, &Match> =
            self.matches.iter().map(|m| (m.id, m)).collect();
        if by_id.len() != self.matches.len() {
            errors.push("duplicate match ids".to_owned());
        }

        // Every pending reference must name an existing match whose stored
        // advancement points straight back at the referencing slot.
        for m in &self.matches {
            for (slot_index, slot) in m.slots.iter().enumerate() {
                let (source, target) = match *slot {
                    Slot::WinnerOf(source) => {
                        (source, by_id.get(&source).and_then(|s| s.advances_winner_to))
                    }
                    Slot::LoserOf(source) => {
                        (source, by_id.get(&source).and_then(|s| s.advances_loser_to))
                    }
                    Slot::Entrant(_) => continue,
                };

                if !by_id.contains_key(&source) {
                    errors.push(format!("{} references unknown match {}", m.id, source));
                } else if target != Some(SlotRef::new(m.id, slot_index)) {
                    errors.push(format!(
                        "{} slot {} and the advancement stored on {} disagree",
                        m.id, slot_index, source
                    ));
                }
            }
        }

        // Winner chains are acyclic and end at the grand final or at a
        // terminal group-final placement match.
        for m in &self.matches {
            let mut current = m.id;
            let mut steps = 0;

            while let Some(next) = self.graph.advances(current).winner {
                current = next.id;
                steps += 1;

                if steps > self.matches.len() {
                    errors.push(format!("winner chain from {} does not terminate", m.id));
                    break;
                }
            }

            let terminal = matches!(
                current.section,
                crate::Section::GrandFinal | crate::Section::GroupFinal
            );
            if steps <= self.matches.len() && !terminal {
                errors.push(format!("winner chain from {} ends at {}", m.id, current));
            }
        }

        ValidationReport { errors }
    }
}

/// The outcome of [`Bracket::validate`].
#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    errors: Vec<String>,
}

impl ValidationReport {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    #[inline]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// The deciding matches of one group's bracket.
struct GroupLayout {
    winners_final: MatchId,
    losers_final: MatchId,
}

/// Builds the full set of match placeholders and the [`BracketGraph`].
///
/// `seeds` is the output of [`crate::seeding::seed`]: slots `2i` and
/// `2i + 1` meet in the `i`-th opening match. For [`BracketMode::Grouped32`]
/// the first 16 seeds are group A, the last 16 group B.
///
/// # Errors
///
/// Returns [`Error::UnsupportedCapacity`] unless the seed count is 8, 16 or
/// 32 in single mode, or exactly 32 in grouped mode.
pub fn build(
    mode: BracketMode,
    options: &BracketOptions,
    seeds: &[ParticipantId],
) -> Result<Bracket> {
    let capacity = seeds.len();

    match (mode, capacity) {
        (BracketMode::Single, 8 | 16 | 32) => {}
        (BracketMode::Grouped32, 32) => {}
        _ => return Err(Error::UnsupportedCapacity { found: capacity }),
    }

    log::debug!(
        "Building a {:?} bracket for {} participants",
        mode,
        capacity
    );

    let mut protos: Vec<(MatchId, [Slot; 2])> = Vec::new();
    let mut resets: HashMap<MatchId, MatchId> = HashMap::new();
    let grand_final = MatchId::grand_final();

    match mode {
        BracketMode::Single => {
            let layout = push_group(&mut protos, None, seeds, true);

            protos.push((
                grand_final,
                [
                    Slot::WinnerOf(layout.winners_final),
                    Slot::WinnerOf(layout.losers_final),
                ],
            ));
        }
        BracketMode::Grouped32 => {
            let full = !options.runner_up_qualification;

            for (group, half) in Group::ALL.into_iter().zip(seeds.chunks_exact(16)) {
                let layout = push_group(&mut protos, Some(group), half, full);

                let f1 = MatchId::group_final(group, 1);
                let f2 = MatchId::group_final(group, 2);

                if options.runner_up_qualification {
                    let champions = (
                        Slot::WinnerOf(layout.winners_final),
                        Slot::WinnerOf(layout.losers_final),
                    );
                    let runner_ups = (
                        Slot::LoserOf(layout.winners_final),
                        Slot::LoserOf(layout.losers_final),
                    );

                    let (first, second) = match options.group_final_pairing {
                        GroupFinalPairing::ChampionVsChampion => (
                            [champions.0, champions.1],
                            [runner_ups.0, runner_ups.1],
                        ),
                        GroupFinalPairing::ChampionVsRunnerUp => (
                            [champions.0, runner_ups.1],
                            [runner_ups.0, champions.1],
                        ),
                    };

                    protos.push((f1, first));
                    protos.push((f2, second));
                } else {
                    protos.push((
                        f1,
                        [
                            Slot::WinnerOf(layout.winners_final),
                            Slot::WinnerOf(layout.losers_final),
                        ],
                    ));
                    resets.insert(f1, f2);
                }
            }

            protos.push((
                grand_final,
                [
                    Slot::WinnerOf(MatchId::group_final(Group::A, 1)),
                    Slot::WinnerOf(MatchId::group_final(Group::B, 1)),
                ],
            ));
        }
    }

    resets.insert(grand_final, MatchId::grand_final_reset());

    // Invert the slot references into per-match advancement targets.
    let mut advances: HashMap<MatchId, Advances> = HashMap::new();
    for (id, slots) in &protos {
        for (slot_index, slot) in slots.iter().enumerate() {
            match *slot {
                Slot::WinnerOf(source) => {
                    let entry = advances.entry(source).or_default();
                    debug_assert!(entry.winner.is_none());
                    entry.winner = Some(SlotRef::new(*id, slot_index));
                }
                Slot::LoserOf(source) => {
                    let entry = advances.entry(source).or_default();
                    debug_assert!(entry.loser.is_none());
                    entry.loser = Some(SlotRef::new(*id, slot_index));
                }
                Slot::Entrant(_) => {}
            }
        }
    }

    // A dormant reset continues its parent's advancement once materialized.
    for (&parent, &reset) in &resets {
        let winner = advances.get(&parent).and_then(|a| a.winner);
        advances.insert(reset, Advances { winner, loser: None });
    }

    let matches: Vec<Match> = protos
        .into_iter()
        .map(|(id, slots)| {
            let adv = advances.get(&id).copied().unwrap_or_default();
            Match::new(id, slots, adv.winner, adv.loser)
        })
        .collect();

    log::debug!("Built {} matches", matches.len());

    Ok(Bracket {
        matches,
        graph: BracketGraph {
            mode,
            capacity,
            advances,
            resets,
            grand_final,
        },
    })
}

/// Lays out one double-elimination group over `seeds` (a power of two).
///
/// With `full` set, the winners-final loser drops into a last losers round
/// and the losers final is that round's single match. Without it the losers
/// bracket ends one round earlier and the winners-final loser is left for
/// the group final to claim.
fn push_group(
    out: &mut Vec<(MatchId, [Slot; 2])>,
    group: Option<Group>,
    seeds: &[ParticipantId],
    full: bool,
) -> GroupLayout {
    let n = seeds.len();
    let k = n.trailing_zeros() as u16;

    let tag = |id: MatchId| match group {
        Some(group) => id.in_group(group),
        None => id,
    };

    // Winners rounds: round r has n / 2^r matches.
    for r in 1..=k {
        for i in 1..=(n >> r) as u16 {
            let slots = if r == 1 {
                let first = seeds[(i as usize - 1) * 2];
                let second = seeds[(i as usize - 1) * 2 + 1];

                [
                    Slot::Entrant(Entrant::new(first, Side::Winners)),
                    Slot::Entrant(Entrant::new(second, Side::Winners)),
                ]
            } else {
                [
                    Slot::WinnerOf(tag(MatchId::winners(r - 1, i * 2 - 1))),
                    Slot::WinnerOf(tag(MatchId::winners(r - 1, i * 2))),
                ]
            };

            out.push((tag(MatchId::winners(r, i)), slots));
        }
    }

    // Losers pairing round 1: winners-round-1 losers meet adjacently.
    for i in 1..=(n >> 2) as u16 {
        out.push((
            tag(MatchId::losers_a(1, i)),
            [
                Slot::LoserOf(tag(MatchId::winners(1, i * 2 - 1))),
                Slot::LoserOf(tag(MatchId::winners(1, i * 2))),
            ],
        ));
    }

    // Alternating drop-in (LB) and pairing (LA) rounds.
    for j in 1..=k - 2 {
        for i in 1..=(n >> (j + 1)) as u16 {
            out.push((
                tag(MatchId::losers_b(j, i)),
                [
                    Slot::WinnerOf(tag(MatchId::losers_a(j, i))),
                    Slot::LoserOf(tag(MatchId::winners(j + 1, i))),
                ],
            ));
        }

        for i in 1..=(n >> (j + 2)) as u16 {
            out.push((
                tag(MatchId::losers_a(j + 1, i)),
                [
                    Slot::WinnerOf(tag(MatchId::losers_b(j, i * 2 - 1))),
                    Slot::WinnerOf(tag(MatchId::losers_b(j, i * 2))),
                ],
            ));
        }
    }

    let winners_final = tag(MatchId::winners(k, 1));

    let losers_final = if full {
        let id = tag(MatchId::losers_b(k - 1, 1));
        out.push((
            id,
            [
                Slot::WinnerOf(tag(MatchId::losers_a(k - 1, 1))),
                Slot::LoserOf(winners_final),
            ],
        ));
        id
    } else {
        tag(MatchId::losers_a(k - 1, 1))
    };

    GroupLayout {
        winners_final,
        losers_final,
    }
}
