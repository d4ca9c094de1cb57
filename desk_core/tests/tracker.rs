use desk_core::tracker::PositionTracker;
use desk_core::{GeometryCfg, SystemState};
use proptest::prelude::*;

fn tracker() -> PositionTracker {
    PositionTracker::new(&GeometryCfg::default(), 70)
}

#[test]
fn up_edges_increment_other_states_decrement() {
    let mut t = tracker();
    let mut reading = false;

    // Seed the last-reading memory; the very first reading is an edge
    // and the state is not Up, so it counts downward.
    assert!(t.on_cycle(reading, SystemState::Calibrating));
    assert_eq!(t.position(), -1);

    for _ in 0..4 {
        reading = !reading;
        assert!(t.on_cycle(reading, SystemState::Up));
    }
    assert_eq!(t.position(), 3);

    for state in [SystemState::Down, SystemState::Hold, SystemState::Calibrating] {
        reading = !reading;
        assert!(t.on_cycle(reading, state));
    }
    assert_eq!(t.position(), 0);
}

#[test]
fn reset_rezeroes_and_height_returns_to_min() {
    let mut t = tracker();
    let mut reading = false;
    for _ in 0..100 {
        reading = !reading;
        t.on_cycle(reading, SystemState::Up);
    }
    assert!(t.height() > 70);
    t.reset();
    assert_eq!(t.position(), 0);
    assert_eq!(t.height(), 70);
}

#[test]
fn height_uses_reference_gearing() {
    // floor(position * 23 / 200) + 70 with the default 4-edge, 50/23 gearing
    let mut t = tracker();
    let mut reading = false;
    for _ in 0..9 {
        reading = !reading;
        t.on_cycle(reading, SystemState::Up);
    }
    // 9 edges -> 9/4/(50/23) = 1.035 cm
    assert_eq!(t.height(), 71);
}

proptest! {
    /// Position moves by exactly one per edge, upward iff the state was
    /// Up at the time of the edge.
    #[test]
    fn position_matches_edge_count_model(
        readings in proptest::collection::vec(any::<bool>(), 1..300),
        states in proptest::collection::vec(0u8..4, 1..300),
    ) {
        let mut t = tracker();
        let mut last: Option<bool> = None;
        let mut expected = 0i32;
        for (r, s) in readings.iter().zip(states.iter().cycle()) {
            let state = match s {
                0 => SystemState::Calibrating,
                1 => SystemState::Up,
                2 => SystemState::Down,
                _ => SystemState::Hold,
            };
            let edge = t.on_cycle(*r, state);
            let model_edge = last != Some(*r);
            prop_assert_eq!(edge, model_edge);
            if model_edge {
                expected += if state == SystemState::Up { 1 } else { -1 };
            }
            last = Some(*r);
            prop_assert_eq!(t.position(), expected);
        }
    }

    /// Height is a monotonic function of position: every upward edge
    /// moves the derived height by zero or one centimeter, never down.
    #[test]
    fn height_is_monotonic_under_up_edges(n in 1usize..2000) {
        let mut t = tracker();
        let mut reading = false;
        let mut prev = t.height();
        for _ in 0..n {
            reading = !reading;
            t.on_cycle(reading, SystemState::Up);
            let h = t.height();
            prop_assert!(h >= prev);
            prop_assert!(h - prev <= 1);
            prev = h;
        }
    }
}
