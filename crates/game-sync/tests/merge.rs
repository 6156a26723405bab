//! Convergence properties of registry merges.

use chess_game::Position;
use game_sync::{GameRegistry, GameSnapshot, PeerEvent, Room};
use proptest::prelude::*;

fn random_pgn(choices: &[u16]) -> String {
    let mut position = Position::new();
    for &choice in choices {
        let moves = position.legal_moves();
        if moves.is_empty() {
            break;
        }
        position.play(moves[choice as usize % moves.len()]).unwrap();
    }
    position.to_pgn()
}

fn merge_creating(registry: &GameRegistry, remote: &[GameSnapshot]) {
    registry.merge(remote, |pgn, id| {
        if let Ok(position) = Position::from_pgn(pgn) {
            registry.register(id, position);
        }
    });
}

fn snapshot_strategy() -> impl Strategy<Value = Vec<GameSnapshot>> {
    prop::collection::vec(
        (0u32..6, prop::collection::vec(any::<u16>(), 0..24)),
        0..6,
    )
    .prop_map(|entries| {
        let mut seen = Vec::new();
        entries
            .into_iter()
            .filter(|(id, _)| {
                let fresh = !seen.contains(id);
                seen.push(*id);
                fresh
            })
            .map(|(id, choices)| GameSnapshot {
                id,
                pgn: random_pgn(&choices),
            })
            .collect()
    })
}

fn sorted(mut games: Vec<GameSnapshot>) -> Vec<GameSnapshot> {
    games.sort_by_key(|g| g.id);
    games
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn merge_is_idempotent(local in snapshot_strategy(), remote in snapshot_strategy()) {
        let registry = GameRegistry::new();
        merge_creating(&registry, &local);
        merge_creating(&registry, &remote);
        let once = registry.snapshot();

        merge_creating(&registry, &remote);
        prop_assert_eq!(registry.snapshot(), once);
    }

    #[test]
    fn merged_registry_matches_remote(local in snapshot_strategy(), remote in snapshot_strategy()) {
        let registry = GameRegistry::new();
        merge_creating(&registry, &local);
        merge_creating(&registry, &remote);

        let merged = registry.snapshot();
        for game in &remote {
            prop_assert!(merged.contains(game));
        }
        for game in &local {
            if !remote.iter().any(|r| r.id == game.id) {
                prop_assert!(merged.contains(game));
            }
        }
    }

    #[test]
    fn symmetric_merges_converge(a in snapshot_strategy(), b in snapshot_strategy()) {
        let left = GameRegistry::new();
        let right = GameRegistry::new();
        merge_creating(&left, &a);
        merge_creating(&right, &b);

        // Each side announces; the other adopts.
        let from_left = left.snapshot();
        let from_right = right.snapshot();
        merge_creating(&left, &from_right);
        merge_creating(&right, &from_left);

        // Shared ids swapped games; one more announcement settles them.
        merge_creating(&right, &left.snapshot());

        prop_assert_eq!(sorted(left.snapshot()), sorted(right.snapshot()));
    }
}

#[tokio::test]
async fn synchronize_through_a_room() {
    let room = Room::default();
    let alice = room.join();
    let mut bob = room.join();

    let alice_games = GameRegistry::new();
    alice_games.register(0, Position::from_pgn("1. e4 e5 2. Nf3").unwrap());
    alice_games.register(1, Position::from_pgn("1. d4").unwrap());

    let bob_games = GameRegistry::new();
    bob_games.register(0, Position::from_pgn("1. c4").unwrap());

    alice
        .publish(&PeerEvent::Synchronize(alice_games.snapshot()))
        .unwrap();

    let Some(PeerEvent::Synchronize(remote)) = bob.recv().await else {
        panic!("expected a synchronize event");
    };
    let report = bob_games.merge(&remote, |pgn, id| {
        bob_games.register(id, Position::from_pgn(pgn).unwrap());
    });

    assert_eq!(report.replaced, vec![0]);
    assert_eq!(report.created, vec![1]);
    assert_eq!(bob_games.snapshot(), alice_games.snapshot());
}
