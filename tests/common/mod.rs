#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    io::{Read, Write},
    path::Path,
    rc::Rc,
};

use dut_harness::{
    board::{Board, BoardResult, Dut, Firmware, Programmer},
    communication::{
        Acquisition, ComResult, CommunicationError, Sampler, SerialInterface, SerialLink,
        SettlePolicy, VoltMeter,
    },
    testcases::Measure,
};

/// Everything the simulated DUT has seen and will answer
#[derive(Default)]
pub struct DutState {
    /// Complete lines received, without the trailing `\r`
    pub lines: Vec<String>,
    /// Echo overrides, keyed by received line
    pub corrupt: HashMap<String, String>,
    /// Echo the line unchanged instead of truncating it to four characters
    pub no_truncation: bool,
    /// Every read fails once this many lines have been received
    pub fail_after: Option<usize>,
    pub resets: usize,
    pub flashed: Vec<(String, u32)>,
    /// Last value the firmware accepted, drives the analog output
    pub pwm: Option<u16>,
    /// Settings the sampler was configured with
    pub acquisition: Option<Acquisition>,
    /// `(channel, samples)` of every acquisition
    pub acquired: Vec<(u8, usize)>,
    partial: Vec<u8>,
    rx: VecDeque<u8>,
}

pub type SharedState = Rc<RefCell<DutState>>;

/// Serial side of the simulated DUT firmware. Echoes every `\r` terminated line followed by `\r\n`.
pub struct SimulatedLink(pub SharedState);

impl Read for SimulatedLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = self.0.borrow_mut();
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SimulatedLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.0.borrow_mut();
        for &byte in buf {
            if byte != b'\r' {
                state.partial.push(byte);
                continue;
            }

            let line: String = state.partial.drain(..).map(char::from).collect();
            let mut echo: String =
                if state.no_truncation { line.clone() } else { line.chars().take(4).collect() };
            if let Some(corrupted) = state.corrupt.get(&line) {
                echo = corrupted.clone();
            }
            if let Ok(value) = line.parse::<u16>() {
                if value <= 2000 && line.len() <= 4 {
                    state.pwm = Some(value);
                }
            }

            state.rx.extend(echo.bytes());
            state.rx.extend(b"\r\n");
            state.lines.push(line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SerialLink for SimulatedLink {
    fn bytes_to_read(&self) -> std::io::Result<u32> {
        let state = self.0.borrow();
        if state.fail_after.is_some_and(|n| state.lines.len() >= n) {
            return Err(std::io::ErrorKind::BrokenPipe.into());
        }
        Ok(state.rx.len() as u32)
    }

    fn bytes_to_write(&self) -> std::io::Result<u32> {
        Ok(0)
    }
}

pub struct SimulatedProgrammer(pub SharedState);

impl Programmer for SimulatedProgrammer {
    fn write_firmware(&mut self, file_path: &Path, address: u32) -> BoardResult<()> {
        self.0.borrow_mut().flashed.push((file_path.display().to_string(), address));
        Ok(())
    }

    fn reset_board(&mut self) -> BoardResult<()> {
        let mut state = self.0.borrow_mut();
        state.resets += 1;
        state.pwm = None;
        state.rx.clear();
        Ok(())
    }
}

/// Analog input following the simulated PWM output
pub struct SimulatedSampler {
    pub state: SharedState,
    /// Voltage produced for a PWM value
    pub output: Box<dyn Fn(u16) -> f64>,
    pub closed: Rc<RefCell<bool>>,
}

impl Sampler for SimulatedSampler {
    fn describe(&mut self) -> ComResult<String> {
        Ok("simulated analog input".into())
    }

    fn open(&mut self) -> ComResult<()> {
        Ok(())
    }

    fn configure(&mut self, acquisition: &Acquisition) -> ComResult<()> {
        self.state.borrow_mut().acquisition = Some(*acquisition);
        Ok(())
    }

    fn acquire(&mut self, channel: u8, samples: usize) -> ComResult<Vec<f64>> {
        let mut state = self.state.borrow_mut();
        state.acquired.push((channel, samples));
        let pwm = state.pwm.ok_or(CommunicationError::TimedOut)?;
        let v = (self.output)(pwm);
        // Alternate around the mean like ripple on the filtered output
        Ok((0..samples).map(|i| if i % 2 == 0 { v + 0.001 } else { v - 0.001 }).collect())
    }

    fn close(&mut self) {
        *self.closed.borrow_mut() = true;
    }
}

/// A DUT on the simulated bench
pub struct Bench {
    pub dut: Dut,
    pub state: SharedState,
    pub voltmeter_closed: Rc<RefCell<bool>>,
    _firmware: tempfile::NamedTempFile,
}

impl Bench {
    pub fn new() -> Self {
        Self::configured(|_| {})
    }

    /// Builds the bench after `setup` adjusted the DUT behaviour
    pub fn configured(setup: impl FnOnce(&mut DutState)) -> Self {
        let state = SharedState::default();
        setup(&mut *state.borrow_mut());

        let file = tempfile::NamedTempFile::new().unwrap();
        let firmware = Firmware::new(file.path()).unwrap();
        let mut board =
            Board::new("Nucleo-F446ZE", Box::new(SimulatedProgrammer(state.clone())));
        let link = SimulatedLink(state.clone());
        let serial = SerialInterface::with_link("sim0", link, SettlePolicy::immediate());
        board.add_interface("Serial", Box::new(serial)).unwrap();
        board.set_default_interface("Serial").unwrap();
        board.program(&firmware, Firmware::DEFAULT_ADDRESS).unwrap();

        Self {
            dut: Dut::new(firmware, board, "TAMK-dut"),
            state,
            voltmeter_closed: Rc::new(RefCell::new(false)),
            _firmware: file,
        }
    }

    /// Attaches a voltmeter reading `output(pwm)`
    pub fn with_voltmeter(self, output: impl Fn(u16) -> f64 + 'static) -> Self {
        let acquisition = Acquisition {
            samples: 8,
            offset_settle: std::time::Duration::ZERO,
            ..Default::default()
        };
        self.with_acquisition(acquisition, output)
    }

    pub fn with_acquisition(
        mut self,
        acquisition: Acquisition,
        output: impl Fn(u16) -> f64 + 'static,
    ) -> Self {
        let sampler = SimulatedSampler {
            state: self.state.clone(),
            output: Box::new(output),
            closed: self.voltmeter_closed.clone(),
        };
        let meter = VoltMeter::open(sampler, acquisition).unwrap();
        self.dut.board_mut().add_interface(Measure::VOLTMETER, Box::new(meter)).unwrap();
        self
    }

    pub fn lines(&self) -> Vec<String> {
        self.state.borrow().lines.clone()
    }

    pub fn resets(&self) -> usize {
        self.state.borrow().resets
    }
}

/// PWM output of a DUT with an ideal 3.3 V full scale
pub fn linear(pwm: u16) -> f64 {
    f64::from(pwm) / 2000.0 * 3.3
}
