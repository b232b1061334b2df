//! The test cases run against the TAMK DUT firmware.
//!
//! The firmware reads a PWM value between 0 and 2000 per `\r` terminated line and echoes
//! it back. Invalid lines are truncated to four characters. The PWM output drives an
//! analog voltage proportional to the value.

use std::time::Duration;

use crate::{
    board::Dut,
    command::{self, is_valid, remove_whitespace, Command},
    communication::pause,
    config::{ConfigError, TestsConfig},
    scoreboard::{check_results, Verdict},
    sequencer::TestCase,
    HarnessResult,
};

/// Settle delays used inside the test cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestTiming {
    /// Pause after each individual value, before the DUT is reset again
    pub sample_settle: Duration,
    /// Pause after each transmitted row of the invalid-input table
    pub invalid_settle: Duration,
    /// Time the analog output needs to follow a new command
    pub voltage_settle: Duration,
}

impl TestTiming {
    pub const fn immediate() -> Self {
        Self {
            sample_settle: Duration::ZERO,
            invalid_settle: Duration::ZERO,
            voltage_settle: Duration::ZERO,
        }
    }
}

impl Default for TestTiming {
    fn default() -> Self {
        Self {
            sample_settle: Duration::from_secs(2),
            invalid_settle: Duration::from_secs(1),
            voltage_settle: Duration::from_millis(100),
        }
    }
}

/// Whether inputs rejected by [`is_valid`] are sent to the DUT at all
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvalidInputPolicy {
    /// Rejected inputs pass without touching the transport
    #[default]
    Skip,
    /// Rejected inputs are sent and must come back truncated to four characters
    Transmit,
}

/// The outcome of one comparison inside a test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCheck {
    pub input: String,
    pub verdict: Verdict,
}

fn fold(checks: &[SubCheck]) -> Verdict {
    let verdicts: Vec<Verdict> = checks.iter().map(|c| c.verdict).collect();
    check_results(&verdicts)
}

/// Compares an echo to what was expected after stripping whitespace from both
fn compare_echo(echo: &str, expected: &str) -> Verdict {
    let got = remove_whitespace(echo);
    let expected = remove_whitespace(expected);
    if got == expected {
        log::debug!("OK! Got: {got}, expected: {expected}");
        Verdict::Pass
    } else {
        log::warn!("incorrect value! Got: {got:?}, expected: {expected:?}");
        Verdict::Fail
    }
}

/// Writes `command` on the default interface and checks the echo
fn echo_check(dut: &mut Dut, command: Command) -> HarnessResult<SubCheck> {
    let interface = dut.board_mut().default_interface()?;
    command::write_command(interface, command)?;
    let echo = command::read_value(interface)?;
    let input = command.to_string();
    Ok(SubCheck { verdict: compare_echo(&echo, &input), input })
}

/// Sets a few individual values, resetting the DUT in between
pub struct ReadSimple {
    values: Vec<i64>,
    timing: TestTiming,
}

impl ReadSimple {
    pub const NAME: &'static str = "Simple reading test for few individual values";
    pub const DEFAULT_VALUES: [i64; 6] = [0, 100, 500, 1000, 1500, 2000];

    pub fn new(values: Vec<i64>, timing: TestTiming) -> Self {
        Self { values, timing }
    }

    pub fn checks(&self, dut: &mut Dut) -> HarnessResult<Vec<SubCheck>> {
        let mut checks = Vec::with_capacity(self.values.len());
        dut.board_mut().reset()?;

        for &value in &self.values {
            let command = Command::new(value)?;
            checks.push(echo_check(dut, command)?);

            pause(self.timing.sample_settle);
            dut.board_mut().reset()?;
        }

        Ok(checks)
    }
}

impl Default for ReadSimple {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VALUES.to_vec(), TestTiming::default())
    }
}

impl TestCase for ReadSimple {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, dut: &mut Dut) -> HarnessResult<Verdict> {
        Ok(fold(&self.checks(dut)?))
    }
}

/// Sets every value from 0 to 2000 without resetting in between
#[derive(Default)]
pub struct ReadRange;

impl ReadRange {
    pub const NAME: &'static str = "Simple reading test for value range";

    pub fn checks(&self, dut: &mut Dut) -> HarnessResult<Vec<SubCheck>> {
        dut.board_mut().reset()?;
        Command::all().map(|command| echo_check(dut, command)).collect()
    }
}

impl TestCase for ReadRange {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, dut: &mut Dut) -> HarnessResult<Verdict> {
        Ok(fold(&self.checks(dut)?))
    }
}

/// Sends a table of valid and invalid inputs
pub struct InvalidValues {
    table: Vec<(String, bool)>,
    policy: InvalidInputPolicy,
    timing: TestTiming,
}

impl InvalidValues {
    pub const NAME: &'static str = "Simple reading test for few invalid values";

    /// Input and whether the DUT shall accept it
    pub const DEFAULT_TABLE: [(&'static str, bool); 13] = [
        ("1234", true),
        (" 1234", false),
        ("4321", false),
        ("test", false),
        ("0est", false),
        ("tes1", false),
        ("01234", false),
        ("012345678", false),
        ("0", true),
        ("100", true),
        ("500", true),
        ("1000", true),
        ("2000", true),
    ];

    pub fn new(table: Vec<(String, bool)>, policy: InvalidInputPolicy, timing: TestTiming) -> Self {
        Self { table, policy, timing }
    }

    pub fn with_default_table(policy: InvalidInputPolicy, timing: TestTiming) -> Self {
        let table = Self::DEFAULT_TABLE.iter().map(|&(t, v)| (t.to_string(), v)).collect();
        Self::new(table, policy, timing)
    }

    pub fn checks(&self, dut: &mut Dut) -> HarnessResult<Vec<SubCheck>> {
        let mut checks = Vec::with_capacity(self.table.len());
        dut.board_mut().reset()?;

        for (input, expect_valid) in &self.table {
            let valid = is_valid(input);
            let verdict = if valid != *expect_valid {
                let prefix = if valid { "" } else { "in" };
                log::warn!("{input:?} is {prefix}valid, table expects otherwise");
                Verdict::Fail
            } else if valid || self.policy == InvalidInputPolicy::Transmit {
                self.transmit(dut, input, valid)?
            } else {
                log::debug!("{input:?} is invalid, not sent");
                Verdict::Pass
            };
            checks.push(SubCheck { input: input.clone(), verdict });
        }

        Ok(checks)
    }

    fn transmit(&self, dut: &mut Dut, input: &str, valid: bool) -> HarnessResult<Verdict> {
        let interface = dut.board_mut().default_interface()?;
        command::write_raw(interface, input)?;
        let echo = command::read_value(interface)?;

        let expected: String = if valid {
            input.to_string()
        } else {
            input.chars().take(Command::MAX_DIGITS).collect()
        };
        let verdict = compare_echo(&echo, &expected);

        pause(self.timing.invalid_settle);
        Ok(verdict)
    }
}

impl TestCase for InvalidValues {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, dut: &mut Dut) -> HarnessResult<Verdict> {
        Ok(fold(&self.checks(dut)?))
    }
}

/// Voltage the analog output shall have for `command`
pub fn expected_voltage(command: Command, full_scale: f64) -> f64 {
    f64::from(command.value()) / f64::from(Command::MAX) * full_scale
}

/// `a` and `b` differ by at most `rel` of the larger magnitude, or by at most `abs`
pub fn approx_eq(a: f64, b: f64, rel: f64, abs: f64) -> bool {
    (a - b).abs() <= f64::max(rel * f64::max(a.abs(), b.abs()), abs)
}

/// Sets PWM values and checks that the measured voltage follows them
pub struct Measure {
    voltmeter: String,
    commands: Vec<Command>,
    full_scale: f64,
    relative_tolerance: f64,
    absolute_tolerance: f64,
    timing: TestTiming,
}

impl Measure {
    pub const NAME: &'static str = "Voltage Measurement task";
    /// Board interface name the sampling instrument is registered under
    pub const VOLTMETER: &'static str = "VoltMeter";

    pub fn new(full_scale: f64, relative_tolerance: f64, timing: TestTiming) -> Self {
        Self {
            voltmeter: Self::VOLTMETER.to_string(),
            commands: Command::all().collect(),
            full_scale,
            relative_tolerance,
            absolute_tolerance: 0.0,
            timing,
        }
    }

    pub fn with_absolute_tolerance(mut self, tolerance: f64) -> Self {
        self.absolute_tolerance = tolerance;
        self
    }

    /// Restricts the measurement to `commands` instead of the full range
    pub fn with_commands(mut self, commands: Vec<Command>) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_voltmeter(mut self, interface: &str) -> Self {
        self.voltmeter = interface.to_string();
        self
    }

    /// Judges one measurement
    pub fn check(&self, command: Command, measured: f64) -> Verdict {
        let expected = expected_voltage(command, self.full_scale);
        if approx_eq(measured, expected, self.relative_tolerance, self.absolute_tolerance) {
            log::debug!("OK! {command}: {measured:.4}V, expected {expected:.4}V");
            Verdict::Pass
        } else {
            log::warn!("incorrect voltage! {command}: {measured:.4}V, expected {expected:.4}V");
            Verdict::Fail
        }
    }

    pub fn checks(&self, dut: &mut Dut) -> HarnessResult<Vec<SubCheck>> {
        let mut checks = Vec::with_capacity(self.commands.len());

        for &command in &self.commands {
            command::write_command(dut.board_mut().default_interface()?, command)?;
            pause(self.timing.voltage_settle);
            let measured = command::read_voltage(dut.board_mut().interface(&self.voltmeter)?)?;
            let verdict = self.check(command, measured);
            checks.push(SubCheck { input: command.to_string(), verdict });
        }

        Ok(checks)
    }
}

impl TestCase for Measure {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, dut: &mut Dut) -> HarnessResult<Verdict> {
        Ok(fold(&self.checks(dut)?))
    }
}

/// Builds the test cases named in `config.enabled`, in the listed order
pub fn from_config(config: &TestsConfig) -> Result<Vec<Box<dyn TestCase>>, ConfigError> {
    let timing = config.timing();
    config
        .enabled
        .iter()
        .map(|name| {
            let case: Box<dyn TestCase> = match name.as_str() {
                "read_simple" => {
                    Box::new(ReadSimple::new(config.individual_values.clone(), timing))
                }
                "read_range" => Box::new(ReadRange),
                "invalid_values" => {
                    Box::new(InvalidValues::with_default_table(config.invalid_policy, timing))
                }
                "measure" => Box::new(
                    Measure::new(config.full_scale_voltage, config.relative_tolerance, timing)
                        .with_absolute_tolerance(config.absolute_tolerance),
                ),
                other => return Err(ConfigError::UnknownTest(other.to_string())),
            };
            Ok(case)
        })
        .collect()
}
