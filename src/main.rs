use anyhow::Context;
use simplelog as sl;
use std::process::ExitCode;

use dut_harness::{
    board::{self, Board, Dut, Firmware},
    communication::SerialInterface,
    config::Configuration,
    scoreboard::Verdict,
    sequencer::Sequencer,
    testcases::{self, Measure},
};

const CONFIG_PATH: &str = "./config.toml";

fn main() -> ExitCode {
    match run() {
        Ok(verdict) => {
            log::info!("Sequence finished with {verdict}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e:#}");
            println!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<Verdict> {
    let config_found = std::path::Path::new(CONFIG_PATH).exists();
    let mut config = Configuration::load(CONFIG_PATH)?;
    // Overrides the configured firmware file
    if let Some(firmware_file) = std::env::args().nth(1) {
        config.firmware_file = firmware_file;
    }
    init_logging(&config)?;
    if !config_found {
        log::warn!("{CONFIG_PATH} not found, using default configuration");
    }

    let mut board = Board::new(&config.board_name, board::detect()?);
    let serial = SerialInterface::open(&config.serial_settings(), config.timing.settle_policy())
        .map_err(|source| board::BoardError::SerialPort {
            port: config.serial_port.clone(),
            source,
        })?;
    board.add_interface("Serial", Box::new(serial))?;
    board.set_default_interface("Serial")?;

    let firmware = Firmware::new(&config.firmware_file)?;
    board.program(&firmware, config.firmware_address).context("Programming the DUT")?;

    let mut dut = Dut::new(firmware, board, &config.dut_name);
    let interface_name = dut.board_mut().default_interface()?.name().to_string();
    let mut sequencer = Sequencer::new(std::io::stdout(), config.on_error);
    sequencer.emit(&format!(
        "Set-up: DUT: {} FW {} on HW {} connected with {}",
        dut.name(),
        dut.firmware().name(),
        dut.board().name(),
        interface_name
    ))?;

    let mut cases = testcases::from_config(&config.tests)?;
    // No sampling driver is linked into this binary
    if !dut.board().interface_names().any(|n| n == Measure::VOLTMETER) {
        let before = cases.len();
        cases.retain(|c| c.name() != Measure::NAME);
        if cases.len() != before {
            log::warn!(
                "No {} interface registered, skipping \"{}\"",
                Measure::VOLTMETER,
                Measure::NAME
            );
        }
    }

    let scoreboard = sequencer.run(&mut dut, &cases)?;
    Ok(scoreboard.verdict())
}

fn init_logging(config: &Configuration) -> anyhow::Result<()> {
    let level = config.log_level()?;
    let file = std::fs::File::create(&config.log_path)
        .with_context(|| format!("Creating log file {}", config.log_path))?;

    sl::CombinedLogger::init(vec![
        sl::WriteLogger::new(level, sl::Config::default(), file),
        sl::TermLogger::new(
            sl::LevelFilter::Warn,
            sl::Config::default(),
            sl::TerminalMode::Stderr,
            sl::ColorChoice::Auto,
        ),
    ])
    .context("Initialising logger")?;

    Ok(())
}
