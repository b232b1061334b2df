use std::time::Duration;

use super::{pause, Capability, ComResult, CommunicationError, Interface, Reading};

/// Acquisition parameters for the analog input of the sampling instrument
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Acquisition {
    pub frequency_hz: f64,
    pub samples: usize,
    pub channel: u8,
    pub range_v: f64,
    pub offset_v: f64,
    /// The input offset needs at least two seconds to stabilize after configuration
    #[serde(rename = "offset_settle_ms", with = "crate::config::millis")]
    pub offset_settle: Duration,
}

impl Default for Acquisition {
    fn default() -> Self {
        Self {
            frequency_hz: 10_000_000.0,
            samples: 4000,
            channel: 0,
            range_v: 5.0,
            offset_v: 2.5,
            offset_settle: Duration::from_secs(2),
        }
    }
}

/// Driver of an analog acquisition device. Implementations wrap the vendor library.
pub trait Sampler {
    /// Driver or device description, used in the interface name
    fn describe(&mut self) -> ComResult<String>;

    fn open(&mut self) -> ComResult<()>;

    fn configure(&mut self, acquisition: &Acquisition) -> ComResult<()>;

    /// Runs one acquisition to completion and returns the sample buffer of `channel`
    fn acquire(&mut self, channel: u8, samples: usize) -> ComResult<Vec<f64>>;

    fn close(&mut self);
}

/// Read-only interface measuring the average DC voltage. Owns its driver and closes it on drop.
pub struct VoltMeter<S: Sampler> {
    name: String,
    endpoint: String,
    sampler: S,
    acquisition: Acquisition,
}

impl<S: Sampler> VoltMeter<S> {
    pub const ENDPOINT_PREFIX: &'static str = "analog-in";

    /// Opens the device, configures the acquisition and waits for the offset to settle
    pub fn open(mut sampler: S, acquisition: Acquisition) -> ComResult<Self> {
        let version = sampler.describe()?;
        log::info!("Opening sampling device {version}");
        sampler.open()?;

        if let Err(e) = sampler.configure(&acquisition) {
            sampler.close();
            return Err(e);
        }
        pause(acquisition.offset_settle);

        Ok(Self {
            name: format!("VoltMeter at {version}"),
            endpoint: format!("{}{}", Self::ENDPOINT_PREFIX, acquisition.channel),
            sampler,
            acquisition,
        })
    }
}

impl<S: Sampler> Interface for VoltMeter<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn capability(&self) -> Capability {
        Capability::ReadOnly
    }

    fn read(&mut self) -> ComResult<Reading> {
        let samples = self.sampler.acquire(self.acquisition.channel, self.acquisition.samples)?;
        if samples.is_empty() {
            return Err(CommunicationError::EmptyAcquisition);
        }

        let dc = samples.iter().sum::<f64>() / samples.len() as f64;
        log::debug!("DC: {dc:.4}V");
        Ok(Reading::Scalar(dc))
    }
}

impl<S: Sampler> Drop for VoltMeter<S> {
    fn drop(&mut self) {
        log::info!("Closing {}", self.name);
        self.sampler.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[derive(Default)]
    struct Log {
        calls: Vec<&'static str>,
    }

    struct ScriptedSampler {
        log: Rc<RefCell<Log>>,
        buffer: Vec<f64>,
        fail_configure: bool,
    }

    impl Sampler for ScriptedSampler {
        fn describe(&mut self) -> ComResult<String> {
            Ok("scripted 1.0".into())
        }

        fn open(&mut self) -> ComResult<()> {
            self.log.borrow_mut().calls.push("open");
            Ok(())
        }

        fn configure(&mut self, _acquisition: &Acquisition) -> ComResult<()> {
            self.log.borrow_mut().calls.push("configure");
            if self.fail_configure {
                Err(CommunicationError::TimedOut)
            } else {
                Ok(())
            }
        }

        fn acquire(&mut self, _channel: u8, _samples: usize) -> ComResult<Vec<f64>> {
            self.log.borrow_mut().calls.push("acquire");
            Ok(self.buffer.clone())
        }

        fn close(&mut self) {
            self.log.borrow_mut().calls.push("close");
        }
    }

    fn quick() -> Acquisition {
        Acquisition { offset_settle: Duration::ZERO, ..Default::default() }
    }

    #[test]
    fn read_averages_the_buffer() {
        let log = Rc::new(RefCell::new(Log::default()));
        let sampler = ScriptedSampler {
            log: log.clone(),
            buffer: vec![1.0, 2.0, 3.0],
            fail_configure: false,
        };
        let mut meter = VoltMeter::open(sampler, quick()).unwrap();

        assert_eq!(meter.name(), "VoltMeter at scripted 1.0");
        assert_eq!(meter.read().unwrap(), Reading::Scalar(2.0));
        drop(meter);

        assert_eq!(log.borrow().calls, ["open", "configure", "acquire", "close"]);
    }

    #[test]
    fn write_is_refused() {
        let log = Rc::new(RefCell::new(Log::default()));
        let sampler = ScriptedSampler { log, buffer: vec![0.0], fail_configure: false };
        let mut meter = VoltMeter::open(sampler, quick()).unwrap();

        assert_eq!(meter.capability(), Capability::ReadOnly);
        assert!(matches!(meter.write("100\r"), Err(CommunicationError::ReadOnly(_))));
    }

    #[test]
    fn empty_buffer_is_an_error() {
        let log = Rc::new(RefCell::new(Log::default()));
        let sampler = ScriptedSampler { log, buffer: vec![], fail_configure: false };
        let mut meter = VoltMeter::open(sampler, quick()).unwrap();

        assert!(matches!(meter.read(), Err(CommunicationError::EmptyAcquisition)));
    }

    #[test]
    fn failed_configuration_closes_device() {
        let log = Rc::new(RefCell::new(Log::default()));
        let sampler = ScriptedSampler { log: log.clone(), buffer: vec![], fail_configure: true };

        assert!(VoltMeter::open(sampler, quick()).is_err());
        assert_eq!(log.borrow().calls, ["open", "configure", "close"]);
    }
}
