use std::io::Write;

use crate::{
    board::Dut,
    scoreboard::{report_line, Scoreboard, Verdict},
    HarnessError, HarnessResult,
};

/// One step of a test sequence, evaluated against a DUT
pub trait TestCase {
    fn name(&self) -> &str;

    /// Runs the test. An `Err` means the test could not be carried out, e.g. the transport
    /// failed; a mismatch is reported as `Ok(Verdict::Fail)`.
    fn run(&self, dut: &mut Dut) -> HarnessResult<Verdict>;

    fn execute(&self, dut: &mut Dut) -> HarnessResult<TestResult> {
        Ok(TestResult { name: self.name().to_string(), verdict: self.run(dut)? })
    }
}

/// Adapts a closure into a [`TestCase`]
pub struct FnTestCase<F> {
    name: String,
    f: F,
}

impl<F: Fn(&mut Dut) -> HarnessResult<Verdict>> FnTestCase<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F: Fn(&mut Dut) -> HarnessResult<Verdict>> TestCase for FnTestCase<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, dut: &mut Dut) -> HarnessResult<Verdict> {
        (self.f)(dut)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub name: String,
    pub verdict: Verdict,
}

/// What the sequencer does when a test case returns an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the sequence and hand the error to the caller
    #[default]
    Abort,
    /// Record the test case as failed and continue with the next one
    FailTestCase,
}

const SEPARATOR_WIDTH: usize = 78;

/// Runs test cases in order and keeps the scoreboard. Progress is written to `out`.
pub struct Sequencer<W: Write> {
    out: W,
    on_error: ErrorPolicy,
}

impl<W: Write> Sequencer<W> {
    pub fn new(out: W, on_error: ErrorPolicy) -> Self {
        Self { out, on_error }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Executes every case once, in order. A failing case never stops the sequence.
    pub fn run(
        &mut self,
        dut: &mut Dut,
        cases: &[Box<dyn TestCase>],
    ) -> HarnessResult<Scoreboard> {
        let mut scoreboard = Scoreboard::new();
        log::info!("Starting {} test cases on {}", cases.len(), dut.name());

        self.emit(&"*".repeat(SEPARATOR_WIDTH))?;
        for case in cases {
            self.emit(&format!("BEGIN TEST: {}", timestamp()))?;
            let result = match case.execute(dut) {
                Ok(result) => result,
                Err(e) => match self.on_error {
                    ErrorPolicy::Abort => {
                        log::error!("{} aborted the sequence: {e}", case.name());
                        return Err(e);
                    }
                    ErrorPolicy::FailTestCase => {
                        log::error!("{} could not complete: {e}", case.name());
                        TestResult { name: case.name().to_string(), verdict: Verdict::Fail }
                    }
                },
            };
            scoreboard.record(&result.name, result.verdict);

            self.emit(&format!("END TEST: {}", timestamp()))?;
            self.emit(&report_line(&result.name, result.verdict))?;
            self.emit(&"*".repeat(SEPARATOR_WIDTH))?;
        }

        self.emit("Tests completed.")?;
        self.emit("Summary:")?;
        for (name, verdict) in scoreboard.iter() {
            writeln!(self.out, "{}", report_line(name, verdict)).map_err(HarnessError::Report)?;
        }
        log::info!("Overall verdict {}", scoreboard.verdict());

        Ok(scoreboard)
    }

    /// Writes one line of progress output and mirrors it to the log
    pub fn emit(&mut self, line: &str) -> HarnessResult<()> {
        log::info!("{line}");
        writeln!(self.out, "{line}").map_err(HarnessError::Report)
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}
