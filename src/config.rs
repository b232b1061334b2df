use std::{path::Path, str::FromStr, time::Duration};

use crate::communication::{Acquisition, SerialSettings, SettlePolicy};
use crate::sequencer::ErrorPolicy;
use crate::testcases::{InvalidInputPolicy, TestTiming};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Unknown log level {0:?}")]
    LogLevel(String),
    #[error("Unknown test case {0:?}")]
    UnknownTest(String),
}

/// Contents of `config.toml`. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    pub serial_port: String,
    pub baudrate: u32,
    pub firmware_file: String,
    pub firmware_address: u32,
    pub board_name: String,
    pub dut_name: String,
    pub log_path: String,
    pub log_level: String,
    pub on_error: ErrorPolicy,
    pub timing: TimingConfig,
    pub tests: TestsConfig,
    /// Passed to [`crate::communication::VoltMeter::open`] by callers that link a sampling
    /// driver. The `dut-harness` binary registers no voltmeter and ignores this table.
    pub voltmeter: Acquisition,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyACM0".into(),
            baudrate: SerialSettings::DEFAULT_BAUDRATE,
            firmware_file: "./firmware/tamk_1.bin".into(),
            firmware_address: crate::board::Firmware::DEFAULT_ADDRESS,
            board_name: "Nucleo-F446ZE".into(),
            dut_name: "TAMK-dut".into(),
            log_path: "log".into(),
            log_level: "info".into(),
            on_error: ErrorPolicy::default(),
            timing: TimingConfig::default(),
            tests: TestsConfig::default(),
            voltmeter: Acquisition::default(),
        }
    }
}

impl Configuration {
    /// Reads the configuration from `path`, or returns the defaults if the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn log_level(&self) -> Result<log::LevelFilter, ConfigError> {
        log::LevelFilter::from_str(&self.log_level)
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.serial_port.clone(),
            baudrate: self.baudrate,
            timeout: self.timing.read_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    #[serde(rename = "before_write_ms", with = "millis")]
    pub before_write: Duration,
    #[serde(rename = "after_write_ms", with = "millis")]
    pub after_write: Duration,
    #[serde(rename = "drain_poll_ms", with = "millis")]
    pub drain_poll: Duration,
    #[serde(rename = "read_timeout_ms", with = "millis")]
    pub read_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let settle = SettlePolicy::default();
        Self {
            before_write: settle.before_write,
            after_write: settle.after_write,
            drain_poll: settle.drain_poll,
            read_timeout: SerialSettings::DEFAULT_TIMEOUT,
        }
    }
}

impl TimingConfig {
    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy {
            before_write: self.before_write,
            after_write: self.after_write,
            drain_poll: self.drain_poll,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestsConfig {
    /// Test cases to run, in order
    pub enabled: Vec<String>,
    pub individual_values: Vec<i64>,
    pub invalid_policy: InvalidInputPolicy,
    pub full_scale_voltage: f64,
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
    #[serde(rename = "sample_settle_ms", with = "millis")]
    pub sample_settle: Duration,
    #[serde(rename = "invalid_settle_ms", with = "millis")]
    pub invalid_settle: Duration,
    #[serde(rename = "voltage_settle_ms", with = "millis")]
    pub voltage_settle: Duration,
}

impl Default for TestsConfig {
    fn default() -> Self {
        let timing = TestTiming::default();
        Self {
            enabled: ["read_simple", "read_range", "invalid_values", "measure"]
                .map(String::from)
                .to_vec(),
            individual_values: vec![0, 100, 500, 1000, 1500, 2000],
            invalid_policy: InvalidInputPolicy::default(),
            full_scale_voltage: 3.3,
            relative_tolerance: 0.02,
            absolute_tolerance: 0.0,
            sample_settle: timing.sample_settle,
            invalid_settle: timing.invalid_settle,
            voltage_settle: timing.voltage_settle,
        }
    }
}

impl TestsConfig {
    pub fn timing(&self) -> TestTiming {
        TestTiming {
            sample_settle: self.sample_settle,
            invalid_settle: self.invalid_settle,
            voltage_settle: self.voltage_settle,
        }
    }
}

/// Durations are written as integer milliseconds in the configuration file
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
