//! Command/acknowledgement handshake against an in-memory device.

use pretty_assertions::assert_eq;
use zengarden_core::mock::{DEFAULT_ACK, MockTransport};
use zengarden_core::{CoordinateMode, Key, Motion, PlotterError, RunState};
use zengarden_test_utils::config::TestConfigBuilder;
use zengarden_test_utils::rig::TestRig;

/// Split a `G01 X.. Y..` line into its numeric fields.
fn linear_fields(command: &str) -> Vec<String> {
    let mut words = command.split(' ');
    assert_eq!(words.next(), Some("G01"));
    words
        .map(|w| {
            let (axis, value) = w.split_at(1);
            assert!(axis == "X" || axis == "Y", "unexpected word {w:?}");
            value.to_string()
        })
        .collect()
}

#[test_log::test]
fn test_moves_carry_two_fields_with_three_decimals() {
    let rig = TestRig::new(TestConfigBuilder::new().build());
    let mut plotter = rig.open().unwrap();
    for (x, y) in [(0.0, 0.0), (12.5, -3.25), (1.0 / 3.0, 299.9996)] {
        plotter.move_xy(x, y).unwrap();
    }

    let moves = rig.moves();
    assert_eq!(moves.len(), 3);
    for command in &moves {
        let fields = linear_fields(command);
        assert_eq!(fields.len(), 2);
        for field in fields {
            let (_, decimals) = field.split_once('.').unwrap();
            assert_eq!(decimals.len(), 3, "{command}");
        }
    }
    assert_eq!(moves[2], "G01 X0.333 Y300.000");
}

#[test_log::test]
fn test_every_command_is_terminated() {
    let rig = TestRig::new(TestConfigBuilder::new().build());
    let mut plotter = rig.open().unwrap();
    plotter.move_xy(5.0, 0.0).unwrap();
    plotter.home().unwrap();
    assert_eq!(rig.probe.written(), b"G90;\nG01 X5.000 Y0.000;\nG28;\n".to_vec());
}

#[test_log::test]
fn test_one_command_in_flight() {
    let rig = TestRig::new(TestConfigBuilder::new().build());
    let mut plotter = rig.open().unwrap();
    for i in 0..5 {
        plotter.move_xy(f64::from(i), 0.0).unwrap();
        // Only the latest command's acknowledgement is outstanding.
        assert_eq!(rig.probe.unread(), DEFAULT_ACK.len());
    }
}

#[test_log::test]
fn test_any_reply_counts_as_ready() {
    let transport = MockTransport::silent();
    transport.push_inbound(b"?");
    let rig = TestRig::with_transport(TestConfigBuilder::new().build(), transport.clone());
    let mut plotter = rig.open().unwrap();

    transport.push_inbound(b"\x00garbage");
    plotter.move_xy(1.0, 1.0).unwrap();
    assert_eq!(rig.probe.unread(), 0);
    assert_eq!(rig.probe.count("G01"), 1);
}

#[test_log::test]
fn test_quit_while_waiting_sends_nothing_more() {
    let transport = MockTransport::silent();
    transport.push_inbound(b"ok\n");
    let rig = TestRig::with_transport(TestConfigBuilder::new().build(), transport);
    let mut plotter = rig.open().unwrap();

    rig.keyboard.press_after(50, Key::Char('Q'));
    let err = plotter.move_xy(10.0, 10.0).unwrap_err();
    assert!(matches!(err, PlotterError::Interrupted));
    assert_eq!(plotter.run_state(), RunState::Shutdown);
    assert_eq!(rig.probe.commands(), vec!["G90".to_string()]);

    plotter.close();
    assert_eq!(rig.probe.close_count(), 1);
}

#[test_log::test]
fn test_relative_moves_round_trip() {
    let config = TestConfigBuilder::new()
        .coordinate_mode(CoordinateMode::Relative)
        .build();
    let rig = TestRig::new(config);
    let mut plotter = rig.open().unwrap();
    plotter.move_xy(20.0, 30.0).unwrap();
    let start = plotter.position();

    for (dx, dy) in [(5.0, 0.0), (0.0, 5.0), (-5.0, 0.0), (0.0, -5.0)] {
        plotter.move_xy(dx, dy).unwrap();
    }
    assert_eq!(plotter.position(), start);
    assert_eq!(rig.probe.commands()[0], "G91");
}

#[test_log::test]
fn test_short_write_fails_without_terminator() {
    let transport = MockTransport::new().with_short_write("G01 X7");
    let rig = TestRig::with_transport(TestConfigBuilder::new().build(), transport);
    let mut plotter = rig.open().unwrap();

    let err = plotter.move_xy(7.0, 7.0).unwrap_err();
    assert!(err.is_recoverable());
    assert!(!rig.probe.written().ends_with(b";\n"));
}
