use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{TimeZone, Utc};
use cue_tournament_core::seeding::{Participant, SeedingMethod};
use cue_tournament_core::{
    BracketMode, BracketOptions, Entrant, Group, GroupFinalPairing, MatchId, MatchStatus,
    ParticipantId, Score, Side, Slot, TournamentId,
};
use cue_tournament_engine::{Engine, Error, Event, TournamentState};

const T: TournamentId = TournamentId(1);

fn p(id: u64) -> ParticipantId {
    ParticipantId(id)
}

fn roster(n: u64) -> Vec<Participant> {
    (1..=n)
        .map(|i| Participant {
            id: p(i),
            registered_at: Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
            rating: 1000 + (n - i) as u32,
        })
        .collect()
}

fn engine_with(capacity: usize, mode: BracketMode, options: BracketOptions) -> Engine {
    let engine = Engine::new();
    engine
        .build_bracket(
            T,
            capacity,
            mode,
            &roster(capacity as u64),
            &SeedingMethod::RegistrationOrder,
            &options,
        )
        .unwrap();
    engine
}

fn win(engine: &Engine, id: MatchId, winner: u64) {
    engine.complete_match(T, id, p(winner), Score(5, 3)).unwrap();
}

/// Plays every ready match except the `stops`, the lower-numbered participant
/// always winning, until nothing else is playable.
fn play_min_except(engine: &Engine, stops: &[MatchId]) {
    loop {
        let ready: Vec<_> = engine
            .matches(T)
            .unwrap()
            .into_iter()
            .filter(|m| m.status == MatchStatus::Ready && !stops.contains(&m.id))
            .collect();

        if ready.is_empty() {
            break;
        }

        for m in ready {
            let winner = m
                .slots
                .iter()
                .filter_map(Slot::entrant)
                .map(|e| e.participant)
                .min()
                .unwrap();
            engine.complete_match(T, m.id, winner, Score(5, 0)).unwrap();
        }
    }
}

fn play_out(engine: &Engine) {
    play_min_except(engine, &[]);
}

#[test]
fn test_opening_round_advancement() {
    let engine = engine_with(8, BracketMode::Single, BracketOptions::default());

    win(&engine, MatchId::winners(1, 1), 1);
    win(&engine, MatchId::winners(1, 2), 4);
    win(&engine, MatchId::winners(1, 3), 5);
    win(&engine, MatchId::winners(1, 4), 8);

    let entrants = |id: MatchId| {
        engine
            .get_match(T, id)
            .unwrap()
            .slots
            .iter()
            .filter_map(|s| s.entrant().map(|e| e.participant))
            .collect::<Vec<_>>()
    };

    assert_eq!(entrants(MatchId::winners(2, 1)), [p(1), p(4)]);
    assert_eq!(entrants(MatchId::winners(2, 2)), [p(5), p(8)]);
    assert_eq!(entrants(MatchId::losers_a(1, 1)), [p(2), p(3)]);
    assert_eq!(entrants(MatchId::losers_a(1, 2)), [p(6), p(7)]);

    for id in [
        MatchId::winners(2, 1),
        MatchId::winners(2, 2),
        MatchId::losers_a(1, 1),
        MatchId::losers_a(1, 2),
    ] {
        assert_eq!(engine.get_match(T, id).unwrap().status, MatchStatus::Ready);
    }
}

#[test]
fn test_single_8_playthrough() {
    let engine = engine_with(8, BracketMode::Single, BracketOptions::default());
    let mut events = engine.subscribe(T).unwrap();

    play_out(&engine);

    assert_eq!(engine.state(T).unwrap(), TournamentState::Completed);
    assert_eq!(engine.champion(T).unwrap(), Some(p(1)));

    let matches = engine.matches(T).unwrap();
    assert_eq!(matches.len(), 14);
    assert!(matches.iter().all(|m| m.status == MatchStatus::Completed));

    // Nobody is eliminated before their second loss and nobody plays on
    // after it.
    let mut losses: HashMap<ParticipantId, usize> = HashMap::new();
    for m in &matches {
        *losses.entry(m.loser.unwrap()).or_default() += 1;
    }
    assert!(losses.values().all(|count| *count <= 2));
    assert_eq!(losses.values().filter(|count| **count == 2).count(), 7);
    assert_eq!(losses.get(&p(1)), None);

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(received.len(), 15);
    assert!(matches!(
        received.last(),
        Some(Event::TournamentCompleted(done)) if done.champion == p(1)
    ));
}

#[test]
fn test_grand_final_reset() {
    let engine = engine_with(8, BracketMode::Single, BracketOptions::default());
    let grand_final = MatchId::grand_final();
    let reset = MatchId::grand_final_reset();

    play_min_except(&engine, &[grand_final]);

    let gf = engine.get_match(T, grand_final).unwrap();
    assert_eq!(gf.status, MatchStatus::Ready);
    assert_eq!(gf.slots[0].entrant().unwrap().side, Side::Winners);
    assert_eq!(gf.slots[1].entrant().unwrap().side, Side::Losers);
    let losers_finalist = gf.slots[1].entrant().unwrap().participant;
    assert_eq!(losers_finalist, p(2));

    // The losers-side finalist winning evens the losses and forces a second
    // grand final instead of deciding the title.
    win(&engine, grand_final, 2);

    assert_eq!(engine.champion(T).unwrap(), None);
    assert_eq!(engine.state(T).unwrap(), TournamentState::InProgress);

    let reset_match = engine.get_match(T, reset).unwrap();
    assert_eq!(reset_match.status, MatchStatus::Ready);
    assert_eq!(
        reset_match.slots[0].entrant().unwrap().participant,
        p(1)
    );
    assert_eq!(reset_match.slots[1].entrant().unwrap().participant, p(2));

    win(&engine, reset, 2);

    assert_eq!(engine.champion(T).unwrap(), Some(p(2)));
    assert_eq!(engine.state(T).unwrap(), TournamentState::Completed);
    assert_eq!(engine.matches(T).unwrap().len(), 15);
}

#[test]
fn test_no_reset_when_winners_side_prevails() {
    let engine = engine_with(8, BracketMode::Single, BracketOptions::default());
    let grand_final = MatchId::grand_final();

    play_min_except(&engine, &[grand_final]);
    win(&engine, grand_final, 1);

    assert_eq!(engine.champion(T).unwrap(), Some(p(1)));
    assert_eq!(engine.state(T).unwrap(), TournamentState::Completed);
    assert!(engine.get_match(T, MatchId::grand_final_reset()).is_err());
}

#[test]
fn test_voiding_the_grand_final_removes_the_reset() {
    let engine = engine_with(8, BracketMode::Single, BracketOptions::default());
    let grand_final = MatchId::grand_final();
    let reset = MatchId::grand_final_reset();

    play_min_except(&engine, &[grand_final]);
    win(&engine, grand_final, 2);
    assert!(engine.get_match(T, reset).is_ok());

    engine.void_match(T, grand_final).unwrap();

    assert!(engine.get_match(T, reset).is_err());
    assert_eq!(engine.matches(T).unwrap().len(), 14);
    assert_eq!(
        engine.get_match(T, grand_final).unwrap().status,
        MatchStatus::Ready
    );

    // Corrected result: the winners-side finalist defends the bracket.
    win(&engine, grand_final, 1);
    assert_eq!(engine.champion(T).unwrap(), Some(p(1)));
    assert_eq!(engine.state(T).unwrap(), TournamentState::Completed);
}

#[test]
fn test_voiding_a_consumed_grand_final_is_refused() {
    let engine = engine_with(8, BracketMode::Single, BracketOptions::default());
    let grand_final = MatchId::grand_final();
    let reset = MatchId::grand_final_reset();

    play_min_except(&engine, &[grand_final]);
    win(&engine, grand_final, 2);
    win(&engine, reset, 1);

    assert_eq!(
        engine.void_match(T, grand_final),
        Err(Error::CannotVoidConsumedResult {
            id: grand_final,
            consumed_by: reset,
        })
    );

    // The reset itself can be voided, which reopens the title.
    engine.void_match(T, reset).unwrap();
    assert_eq!(engine.champion(T).unwrap(), None);
    assert_eq!(engine.state(T).unwrap(), TournamentState::InProgress);
}

#[test]
fn test_grouped_32_playthrough() {
    let engine = engine_with(32, BracketMode::Grouped32, BracketOptions::default());

    play_out(&engine);

    assert_eq!(engine.state(T).unwrap(), TournamentState::Completed);
    assert_eq!(engine.champion(T).unwrap(), Some(p(1)));
    assert_eq!(engine.group_champion(T, Group::A).unwrap(), Some(p(1)));
    assert_eq!(engine.group_champion(T, Group::B).unwrap(), Some(p(17)));

    let matches = engine.matches(T).unwrap();
    assert_eq!(matches.len(), 61);
    assert!(matches.iter().all(|m| m.status == MatchStatus::Completed));

    // The grand final was seated across the groups.
    let gf = engine.get_match(T, MatchId::grand_final()).unwrap();
    let finalists: Vec<_> = gf
        .slots
        .iter()
        .filter_map(|s| s.entrant().map(|e| e.participant))
        .collect();
    assert_eq!(finalists, [p(1), p(17)]);
}

#[test]
fn test_grouped_final_preserves_losers_side_through_to_the_reset() {
    let engine = engine_with(32, BracketMode::Grouped32, BracketOptions::default());
    let a_f1 = MatchId::group_final(Group::A, 1);
    let grand_final = MatchId::grand_final();

    play_min_except(&engine, &[a_f1]);

    // The group A final: winners-bracket champion vs losers-bracket
    // champion.
    let f1 = engine.get_match(T, a_f1).unwrap();
    assert_eq!(f1.slots[0].entrant().unwrap().side, Side::Winners);
    assert_eq!(f1.slots[1].entrant().unwrap().side, Side::Losers);
    let underdog = f1.slots[1].entrant().unwrap().participant;

    // The losers-bracket champion takes the group and carries their
    // losers-side standing into the grand final.
    engine
        .complete_match(T, a_f1, underdog, Score(5, 4))
        .unwrap();
    play_min_except(&engine, &[grand_final]);

    let gf = engine.get_match(T, grand_final).unwrap();
    assert_eq!(gf.status, MatchStatus::Ready);
    assert_eq!(gf.slots[0].entrant().unwrap().participant, underdog);
    assert_eq!(gf.slots[0].entrant().unwrap().side, Side::Losers);
    assert_eq!(gf.slots[1].entrant().unwrap().side, Side::Winners);

    // Group B's champion never lost, so losing the grand final to the
    // underdog earns them a second match.
    engine
        .complete_match(T, grand_final, underdog, Score(5, 2))
        .unwrap();

    assert_eq!(engine.champion(T).unwrap(), None);
    let reset = engine.get_match(T, MatchId::grand_final_reset()).unwrap();
    assert_eq!(reset.status, MatchStatus::Ready);

    engine
        .complete_match(T, MatchId::grand_final_reset(), underdog, Score(5, 1))
        .unwrap();
    assert_eq!(engine.champion(T).unwrap(), Some(underdog));
    assert_eq!(engine.state(T).unwrap(), TournamentState::Completed);
    assert_eq!(engine.matches(T).unwrap().len(), 62);
}

#[test]
fn test_placement_match_blocks_completion() {
    let engine = engine_with(32, BracketMode::Grouped32, BracketOptions::default());
    let b_f2 = MatchId::group_final(Group::B, 2);

    play_min_except(&engine, &[b_f2]);

    // The title is decided, but the runner-up placement is still owed a
    // result.
    assert_eq!(engine.champion(T).unwrap(), Some(p(1)));
    assert_eq!(engine.state(T).unwrap(), TournamentState::InProgress);

    let placement = engine.get_match(T, b_f2).unwrap();
    assert_eq!(placement.status, MatchStatus::Ready);
    let winner = placement.slots[0].entrant().unwrap().participant;
    engine.complete_match(T, b_f2, winner, Score(5, 3)).unwrap();

    assert_eq!(engine.state(T).unwrap(), TournamentState::Completed);
}

#[test]
fn test_grouped_full_double_elimination_group_reset() {
    let options = BracketOptions {
        group_final_pairing: GroupFinalPairing::ChampionVsChampion,
        runner_up_qualification: false,
    };
    let engine = engine_with(32, BracketMode::Grouped32, options);
    let a_f1 = MatchId::group_final(Group::A, 1);
    let a_f2 = MatchId::group_final(Group::A, 2);

    play_min_except(&engine, &[a_f1]);

    let f1 = engine.get_match(T, a_f1).unwrap();
    let underdog = f1.slots[1].entrant().unwrap().participant;
    assert_eq!(f1.slots[1].entrant().unwrap().side, Side::Losers);

    // In a full double-elimination group, the losers-bracket champion
    // winning the group final forces a group-level bracket reset.
    engine
        .complete_match(T, a_f1, underdog, Score(5, 4))
        .unwrap();

    let group_reset = engine.get_match(T, a_f2).unwrap();
    assert_eq!(group_reset.status, MatchStatus::Ready);
    assert_eq!(engine.group_champion(T, Group::A).unwrap(), None);

    // The grand final waits on the reset, not on the voided-out first final.
    let gf = engine.get_match(T, MatchId::grand_final()).unwrap();
    assert_eq!(gf.slots[0], Slot::WinnerOf(a_f2));

    engine
        .complete_match(T, a_f2, underdog, Score(5, 2))
        .unwrap();
    assert_eq!(engine.group_champion(T, Group::A).unwrap(), Some(underdog));
    assert_eq!(
        engine
            .get_match(T, MatchId::grand_final())
            .unwrap()
            .slots[0]
            .entrant()
            .unwrap()
            .participant,
        underdog
    );
}

#[test]
fn test_registry_errors() {
    let engine = engine_with(8, BracketMode::Single, BracketOptions::default());

    assert_eq!(
        engine
            .build_bracket(
                T,
                8,
                BracketMode::Single,
                &roster(8),
                &SeedingMethod::RegistrationOrder,
                &BracketOptions::default(),
            )
            .unwrap_err(),
        Error::TournamentExists(T)
    );

    let unknown = TournamentId(99);
    assert_eq!(
        engine
            .complete_match(unknown, MatchId::winners(1, 1), p(1), Score(5, 0))
            .unwrap_err(),
        Error::UnknownTournament(unknown)
    );

    // A failed build registers nothing.
    assert!(engine
        .build_bracket(
            TournamentId(2),
            8,
            BracketMode::Single,
            &roster(7),
            &SeedingMethod::RegistrationOrder,
            &BracketOptions::default(),
        )
        .is_err());
    assert_eq!(
        engine
            .build_bracket(
                TournamentId(2),
                6,
                BracketMode::Single,
                &roster(6),
                &SeedingMethod::RatingBased,
                &BracketOptions::default(),
            )
            .unwrap_err(),
        Error::Setup(cue_tournament_core::Error::UnsupportedCapacity { found: 6 })
    );
    assert_eq!(
        engine.state(TournamentId(2)).unwrap_err(),
        Error::UnknownTournament(TournamentId(2))
    );

    engine.archive(T).unwrap();
    assert_eq!(engine.archive(T).unwrap_err(), Error::UnknownTournament(T));
    assert_eq!(engine.state(T).unwrap_err(), Error::UnknownTournament(T));
}

#[test]
fn test_event_stream_order() {
    let engine = engine_with(8, BracketMode::Single, BracketOptions::default());
    let mut events = engine.subscribe(T).unwrap();

    win(&engine, MatchId::winners(1, 1), 1);
    win(&engine, MatchId::winners(1, 2), 3);
    engine.void_match(T, MatchId::winners(1, 2)).unwrap();

    let mut completed = |id: MatchId| match events.try_recv().unwrap() {
        Event::MatchCompleted(event) => assert_eq!(event.id, id),
        other => panic!("unexpected event {:?}", other),
    };
    completed(MatchId::winners(1, 1));
    completed(MatchId::winners(1, 2));

    match events.try_recv().unwrap() {
        Event::MatchVoided(event) => assert_eq!(event.id, MatchId::winners(1, 2)),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(events.try_recv().is_err());
}

#[test]
fn test_concurrent_sibling_completions() {
    for round in 0..8 {
        let engine = Arc::new(Engine::new());
        let id = TournamentId(round);
        engine
            .build_bracket(
                id,
                8,
                BracketMode::Single,
                &roster(8),
                &SeedingMethod::RegistrationOrder,
                &BracketOptions::default(),
            )
            .unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [(MatchId::winners(1, 1), 1u64), (MatchId::winners(1, 2), 4)]
            .into_iter()
            .map(|(match_id, winner)| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);

                thread::spawn(move || {
                    barrier.wait();
                    engine
                        .complete_match(id, match_id, p(winner), Score(5, 3))
                        .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let w2 = engine.get_match(id, MatchId::winners(2, 1)).unwrap();
        assert_eq!(w2.status, MatchStatus::Ready);
        assert_eq!(
            w2.slots,
            [
                Slot::Entrant(Entrant::new(p(1), Side::Winners)),
                Slot::Entrant(Entrant::new(p(4), Side::Winners)),
            ]
        );
    }
}
