mod common;

use common::ManualClock;
use desk_core::mocks::{SharedInput, SpyActuator};
use desk_core::{
    CalibrationStatus, Command, Desk, Direction, StopReason, SystemState, TickStatus,
};
use rstest::rstest;

struct Rig {
    desk: Desk,
    spy: SpyActuator,
    endstop: SharedInput,
    sensor: SharedInput,
    clock: ManualClock,
}

/// Build a desk and run it through calibration: the end-stop reads
/// triggered from the start, so homing completes after the debounce
/// window and the controller starts at the floor (height 70).
fn homed_rig() -> Rig {
    let spy = SpyActuator::new();
    let endstop = SharedInput::new(true);
    let sensor = SharedInput::new(false);
    let clock = ManualClock::new();
    let mut cal = Desk::builder()
        .with_actuator(spy.clone())
        .with_endstop(endstop.clone())
        .with_sensor(sensor.clone())
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("build calibrator");
    for _ in 0..10 {
        assert_eq!(cal.step().expect("step"), CalibrationStatus::Lowering);
    }
    assert_eq!(cal.step().expect("step"), CalibrationStatus::Homed);
    let desk = cal.into_controller();
    endstop.set(false);
    Rig {
        desk,
        spy,
        endstop,
        sensor,
        clock,
    }
}

/// Tick once with a fresh sensor edge so position follows the motion.
fn tick_with_edge(rig: &mut Rig) -> TickStatus {
    rig.clock.advance_ms(5);
    rig.sensor.toggle();
    rig.desk.tick().expect("tick")
}

/// Tick once with the sensor unchanged.
fn tick_static(rig: &mut Rig) -> TickStatus {
    rig.clock.advance_ms(5);
    rig.desk.tick().expect("tick")
}

/// Raise the table by `edges` sensor edges.
fn raise_by_edges(rig: &mut Rig, edges: usize) {
    rig.desk.handle_command(Command::Up);
    for _ in 0..edges {
        assert_eq!(
            tick_with_edge(rig),
            TickStatus::Moving(Direction::Raising)
        );
    }
    rig.desk.handle_command(Command::Stop);
    assert_eq!(tick_static(rig), TickStatus::Holding);
}

#[test]
fn starts_holding_at_min_height() {
    let rig = homed_rig();
    assert_eq!(rig.desk.state(), SystemState::Hold);
    assert_eq!(rig.desk.height(), 70);
    assert_eq!(rig.desk.target(), None);
}

#[test]
fn up_command_drives_the_actuator() {
    let mut rig = homed_rig();
    rig.desk.handle_command(Command::Up);
    assert_eq!(tick_static(&mut rig), TickStatus::Moving(Direction::Raising));
    assert_eq!(rig.spy.last_speed(), 255);
}

#[test]
fn stop_command_holds_and_clears_target() {
    let mut rig = homed_rig();
    rig.desk.handle_command(Command::GotoHeight(90));
    assert_eq!(rig.desk.target(), Some(90));
    rig.desk.handle_command(Command::Stop);
    assert_eq!(rig.desk.state(), SystemState::Hold);
    assert_eq!(rig.desk.target(), None);
    assert_eq!(tick_static(&mut rig), TickStatus::Holding);
    assert_eq!(rig.spy.last_speed(), 0);
}

#[test]
fn manual_command_clears_pending_target() {
    let mut rig = homed_rig();
    rig.desk.handle_command(Command::GotoHeight(90));
    rig.desk.handle_command(Command::Down);
    assert_eq!(rig.desk.target(), None);
    assert_eq!(rig.desk.state(), SystemState::Down);
}

#[rstest]
#[case(69)]
#[case(121)]
#[case(0)]
#[case(-5)]
#[case(1000)]
fn out_of_range_goto_is_ignored(#[case] h: i32) {
    let mut rig = homed_rig();
    rig.desk.handle_command(Command::GotoHeight(h));
    assert_eq!(rig.desk.state(), SystemState::Hold);
    assert_eq!(rig.desk.target(), None);
}

#[test]
fn goto_current_height_is_a_noop() {
    let mut rig = homed_rig();
    rig.desk.handle_command(Command::GotoHeight(70));
    assert_eq!(rig.desk.state(), SystemState::Hold);
    assert_eq!(rig.desk.target(), None);

    // Same round-trip away from the floor: whatever height the tracker
    // derives, requesting exactly that height changes nothing.
    raise_by_edges(&mut rig, 20);
    let here = rig.desk.height();
    rig.desk.handle_command(Command::GotoHeight(here));
    assert_eq!(rig.desk.state(), SystemState::Hold);
    assert_eq!(rig.desk.target(), None);
}

#[test]
fn goto_above_raises_until_target_reached() {
    let mut rig = homed_rig();
    rig.desk.handle_command(Command::GotoHeight(90));
    assert_eq!(rig.desk.state(), SystemState::Up);
    assert_eq!(rig.desk.target(), Some(90));

    for _ in 0..400 {
        if rig.desk.height() == 90 {
            break;
        }
        assert_eq!(
            tick_with_edge(&mut rig),
            TickStatus::Moving(Direction::Raising)
        );
    }
    assert_eq!(rig.desk.height(), 90, "target never reached");
    assert_eq!(
        tick_static(&mut rig),
        TickStatus::Stopped(StopReason::TargetReached)
    );
    assert_eq!(rig.desk.state(), SystemState::Hold);
    assert_eq!(rig.desk.target(), None);
    assert_eq!(rig.spy.last_speed(), 0);
}

#[test]
fn goto_below_lowers_until_target_reached() {
    let mut rig = homed_rig();
    raise_by_edges(&mut rig, 20); // height 72

    rig.desk.handle_command(Command::GotoHeight(71));
    assert_eq!(rig.desk.state(), SystemState::Down);
    for _ in 0..100 {
        if rig.desk.height() == 71 {
            break;
        }
        assert_eq!(
            tick_with_edge(&mut rig),
            TickStatus::Moving(Direction::Lowering)
        );
    }
    assert_eq!(rig.desk.height(), 71, "target never reached");
    assert_eq!(
        tick_static(&mut rig),
        TickStatus::Stopped(StopReason::TargetReached)
    );
    assert_eq!(rig.desk.state(), SystemState::Hold);
}

#[test]
fn ceiling_is_enforced_without_a_target() {
    let mut rig = homed_rig();
    rig.desk.handle_command(Command::Up);

    for _ in 0..1000 {
        if rig.desk.height() == 120 {
            break;
        }
        assert_eq!(
            tick_with_edge(&mut rig),
            TickStatus::Moving(Direction::Raising)
        );
    }
    assert_eq!(rig.desk.height(), 120, "ceiling never approached");
    assert_eq!(
        tick_static(&mut rig),
        TickStatus::Stopped(StopReason::UpperLimit)
    );
    assert_eq!(rig.desk.state(), SystemState::Hold);
    assert_eq!(rig.spy.last_speed(), 0);
}

#[test]
fn endstop_while_lowering_stops_and_rezeroes() {
    let mut rig = homed_rig();
    raise_by_edges(&mut rig, 9); // height 71

    rig.desk.handle_command(Command::Down);
    rig.endstop.set(true);
    // Ten debounce cycles pass while still lowering (sensor quiet so the
    // position stays put), then the eleventh confirms.
    for _ in 0..10 {
        assert_eq!(
            tick_static(&mut rig),
            TickStatus::Moving(Direction::Lowering)
        );
    }
    assert_eq!(
        tick_static(&mut rig),
        TickStatus::Stopped(StopReason::Endstop)
    );
    assert_eq!(rig.desk.position(), 0);
    assert_eq!(rig.desk.height(), 70);
    assert_eq!(rig.desk.state(), SystemState::Hold);
    assert_eq!(rig.spy.last_speed(), 0);
}

#[test]
fn endstop_is_ignored_while_raising() {
    let mut rig = homed_rig();
    raise_by_edges(&mut rig, 9);

    rig.desk.handle_command(Command::Up);
    rig.endstop.set(true);
    for _ in 0..15 {
        assert_eq!(
            tick_with_edge(&mut rig),
            TickStatus::Moving(Direction::Raising)
        );
    }
    assert_ne!(rig.desk.position(), 0);
}

#[test]
fn stall_forces_hold_after_both_windows_go_stale() {
    let mut rig = homed_rig();
    // Baseline the hold window, then start raising with a dead sensor.
    assert_eq!(tick_static(&mut rig), TickStatus::Holding);
    rig.desk.handle_command(Command::Up);

    // 300 ms in: hold window stale-ish but not past the 500 ms timeout.
    rig.clock.advance_ms(300);
    assert_eq!(rig.desk.tick().expect("tick"), TickStatus::Moving(Direction::Raising));

    // 600+ ms since the last edge and the last hold: stall.
    rig.clock.advance_ms(300);
    assert_eq!(
        rig.desk.tick().expect("tick"),
        TickStatus::Stopped(StopReason::Stall)
    );
    assert_eq!(rig.desk.state(), SystemState::Hold);
    assert_eq!(rig.spy.last_speed(), 0);
}

#[test]
fn stall_does_not_fire_right_after_leaving_hold() {
    let mut rig = homed_rig();
    // Sit in Hold long enough that the edge window is long stale.
    rig.clock.advance_ms(2000);
    assert_eq!(tick_static(&mut rig), TickStatus::Holding);

    // Leaving Hold: the hold window was just refreshed, so the first
    // cycles of motion must not trip the guard even with a dead sensor.
    rig.desk.handle_command(Command::Up);
    rig.clock.advance_ms(400);
    assert_eq!(
        rig.desk.tick().expect("tick"),
        TickStatus::Moving(Direction::Raising)
    );
}

#[test]
fn edges_while_holding_still_move_the_counter_down() {
    let mut rig = homed_rig();
    assert_eq!(tick_with_edge(&mut rig), TickStatus::Holding);
    assert_eq!(rig.desk.position(), -1);
}

#[test]
fn hardware_read_failure_surfaces_as_hardware_error() {
    use desk_traits::DigitalInput;

    struct FailingInput;
    impl DigitalInput for FailingInput {
        fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
            Err("boom".into())
        }
    }

    let spy = SpyActuator::new();
    let mut cal = Desk::builder()
        .with_actuator(spy)
        .with_endstop(FailingInput)
        .with_sensor(SharedInput::new(false))
        .build()
        .expect("build calibrator");
    let err = cal.step().expect_err("end-stop read should fail");
    let msg = format!("{err:#}");
    assert!(msg.contains("hardware"), "unexpected error: {msg}");
}
