mod common;

use common::Bench;
use dut_harness::{
    command::{self, CommandError},
    scoreboard::Verdict,
    sequencer::TestCase,
    testcases::{ReadRange, ReadSimple, TestTiming},
    HarnessError,
};

fn simple() -> ReadSimple {
    ReadSimple::new(ReadSimple::DEFAULT_VALUES.to_vec(), TestTiming::immediate())
}

#[test]
fn exact_echo_passes_every_value() {
    let mut bench = Bench::new();

    let checks = simple().checks(&mut bench.dut).unwrap();
    assert_eq!(checks.len(), 6);
    assert!(checks.iter().all(|c| c.verdict == Verdict::Pass));
    assert_eq!(simple().run(&mut bench.dut).unwrap(), Verdict::Pass);

    assert_eq!(&bench.lines()[..6], ["0", "100", "500", "1000", "1500", "2000"]);
}

#[test]
fn dut_is_reset_before_and_after_each_value() {
    let mut bench = Bench::new();
    simple().run(&mut bench.dut).unwrap();
    assert_eq!(bench.resets(), 7);
}

#[test]
fn corrupted_digit_fails_only_that_value() {
    let mut bench = Bench::configured(|dut| {
        dut.corrupt.insert("1000".into(), "1090".into());
    });

    let checks = simple().checks(&mut bench.dut).unwrap();
    for check in &checks {
        let expected = if check.input == "1000" { Verdict::Fail } else { Verdict::Pass };
        assert_eq!(check.verdict, expected, "{}", check.input);
    }
    assert_eq!(simple().run(&mut bench.dut).unwrap(), Verdict::Fail);
}

#[test]
fn out_of_range_value_is_rejected_before_sending() {
    let mut bench = Bench::new();
    let case = ReadSimple::new(vec![100, 2001], TestTiming::immediate());

    let err = case.run(&mut bench.dut).unwrap_err();
    assert!(matches!(err, HarnessError::Command(CommandError::OutOfRange(2001))));
    assert_eq!(bench.lines(), ["100"]);
}

#[test]
fn whole_range_round_trips() {
    let mut bench = Bench::new();

    let checks = ReadRange.checks(&mut bench.dut).unwrap();
    assert_eq!(checks.len(), 2001);
    assert!(checks.iter().all(|c| c.verdict == Verdict::Pass));
    assert_eq!(bench.resets(), 1);

    let lines = bench.lines();
    assert_eq!(lines.len(), 2001);
    assert!(lines.iter().enumerate().all(|(i, l)| *l == i.to_string()));
}

#[test]
fn range_reports_a_single_bad_echo() {
    let mut bench = Bench::configured(|dut| {
        dut.corrupt.insert("1999".into(), "199".into());
    });

    let checks = ReadRange.checks(&mut bench.dut).unwrap();
    let failed: Vec<&str> =
        checks.iter().filter(|c| c.verdict == Verdict::Fail).map(|c| c.input.as_str()).collect();
    assert_eq!(failed, ["1999"]);
    assert_eq!(ReadRange.run(&mut bench.dut).unwrap(), Verdict::Fail);
}

#[test]
fn codec_round_trip_through_simulated_link() {
    let mut bench = Bench::new();
    let serial = bench.dut.board_mut().default_interface().unwrap();

    for value in [0, 7, 42, 999, 2000] {
        command::write_value(serial, value).unwrap();
        let echo = command::read_value(serial).unwrap();
        assert_eq!(echo, format!("{value}\r\n"));
        assert_eq!(command::remove_whitespace(&echo), value.to_string());
    }
}
