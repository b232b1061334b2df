use std::fmt::Write;

/// Outcome of a test case or one of its sub-checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Verdict {
    Pass,
    Fail,
    /// Nothing was evaluated
    Unknown,
}

impl Verdict {
    pub fn from_check(passed: bool) -> Self {
        if passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    pub fn is_pass(self) -> bool {
        self == Verdict::Pass
    }
}

/// Folds sub-check verdicts into one: `Unknown` if empty, `Pass` if all passed, `Fail` otherwise
pub fn check_results(results: &[Verdict]) -> Verdict {
    if results.is_empty() {
        Verdict::Unknown
    } else if results.iter().all(|r| r.is_pass()) {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

/// Same as [`check_results`] for textual tokens. Anything other than `PASS` counts as failed.
pub fn check_tokens(results: &[&str]) -> Verdict {
    if results.is_empty() {
        return Verdict::Unknown;
    }
    let passed = results.iter().all(|t| t.parse::<Verdict>() == Ok(Verdict::Pass));
    Verdict::from_check(passed)
}

/// Width the `name: ` column is padded to in reports
pub const NAME_COLUMN: usize = 50;

/// Formats one report line, e.g. `Simple reading test: ...  [PASS]`
pub fn report_line(name: &str, verdict: Verdict) -> String {
    format!("{:<width$}[{}]", format!("{name}: "), verdict, width = NAME_COLUMN)
}

/// Verdicts keyed by test name, in execution order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Scoreboard {
    entries: Vec<(String, Verdict)>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `verdict` under `name`. A repeated name replaces the earlier verdict and keeps its
    /// position.
    pub fn record(&mut self, name: &str, verdict: Verdict) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => {
                log::warn!(
                    "Test name {name:?} recorded twice, replacing {} with {}",
                    entry.1,
                    verdict
                );
                entry.1 = verdict;
            }
            None => self.entries.push((name.to_string(), verdict)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Verdict> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Verdict)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overall verdict over every recorded test
    pub fn verdict(&self) -> Verdict {
        let verdicts: Vec<Verdict> = self.entries.iter().map(|(_, v)| *v).collect();
        check_results(&verdicts)
    }

    /// One report line per test, in execution order
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (name, verdict) in self.iter() {
            let _ = writeln!(out, "{}", report_line(name, verdict));
        }
        out
    }
}
