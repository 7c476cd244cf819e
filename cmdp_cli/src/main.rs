use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use libcmdp::config::Config;
use libcmdp::process::process;
use libcmdp::worker_status::{BarColor, WorkerStatus};

const LOG_FILE_NAME: &str = "cmdp.log";

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

fn bar_style(color: BarColor) -> ProgressStyle {
    let template = match color {
        BarColor::CYAN => "{msg:>22} [{bar:40.cyan/blue}] {pos:>3}%",
        BarColor::GREEN => "{msg:>22} [{bar:40.green/blue}] {pos:>3}%",
    };
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn update_bar(pb: &ProgressBar, status: &WorkerStatus, current: &mut Option<(u32, BarColor)>) {
    if *current != Some((status.scan_number, status.color)) {
        let phase = match status.color {
            BarColor::CYAN => "Reducing",
            BarColor::GREEN => "Writing",
        };
        pb.set_style(bar_style(status.color));
        pb.set_message(format!("{phase} scan {}", status.scan_number));
        *current = Some((status.scan_number, status.color));
    }
    pb.set_position((status.progress.clamp(0.0, 1.0) * 100.0) as u64);
}

fn cli() -> Command {
    Command::new("cmdp_cli")
        .about("Reconstruct microdiffraction raster scans into HDF5 images and maps")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .global(true)
                .help("Path to the configuration file"),
        )
}

fn main() {
    // Create a cli
    let matches = cli().get_matches();

    // Initialize feedback
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = vec![simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )];
    let log_file_error = match File::create(LOG_FILE_NAME) {
        Ok(file) => {
            loggers.push(simplelog::WriteLogger::new(
                simplelog::LevelFilter::Info,
                simplelog::Config::default(),
                file,
            ));
            None
        }
        Err(e) => Some(e),
    };
    let logger = simplelog::CombinedLogger::new(loggers);

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }
    if let Some(e) = log_file_error {
        log::warn!("Could not create log file {LOG_FILE_NAME}, logging to terminal only: {e}");
    }

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A configuration path is required");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Failed to write template config: {e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Raw Path: {}", config.raw_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!(
        "Calibration Path: {}",
        config.calibration_path.to_string_lossy()
    );
    log::info!(
        "First Scan: {} Last Scan: {}",
        config.first_scan_number,
        config.last_scan_number
    );
    log::info!(
        "Scan Mode: {} Output Kind: {}",
        config.scan_mode,
        config.output_kind
    );
    log::info!(
        "Detectors: {:?} Reference: {}",
        config.detectors,
        config.reference_detector
    );
    log::info!("Number of Threads: {}", config.n_threads);

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    pb.set_style(bar_style(BarColor::CYAN));
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    // Spawn the task!
    let handle = std::thread::spawn(move || process(config, tx));

    let mut current = None;
    loop {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(status) => update_bar(&pb, &status, &mut current),
            Err(RecvTimeoutError::Timeout) => (),
            // The sender is dropped once processing returns
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    pb.finish();

    match handle.join() {
        Ok(result) => match result {
            Ok(_) => log::info!("Successfully processed data!"),
            Err(e) => log::error!("Processing failed with error: {e}"),
        },
        Err(_) => log::error!("Failed to join processing task!"),
    }

    log::info!("Done.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_accepted_around_subcommand() {
        for args in [
            ["cmdp_cli", "new", "-p", "config.yml"],
            ["cmdp_cli", "-p", "config.yml", "new"],
        ] {
            let matches = cli().try_get_matches_from(args).unwrap();
            let Some(("new", sub_matches)) = matches.subcommand() else {
                panic!("expected the new subcommand for {args:?}");
            };
            assert_eq!(
                sub_matches.get_one::<String>("path").map(String::as_str),
                Some("config.yml")
            );
        }

        let matches = cli()
            .try_get_matches_from(["cmdp_cli", "--path", "config.yml"])
            .unwrap();
        assert!(matches.subcommand().is_none());
        assert_eq!(
            matches.get_one::<String>("path").map(String::as_str),
            Some("config.yml")
        );
    }
}
