//! # cmdp
//!
//! cmdp is the coherent microdiffraction data processor, written in Rust. It takes the raw
//! data of a raster scan (a motor log and the frame files written by the Lambda detectors)
//! and reconstructs either the masked detector images of every scan position or a
//! normalized intensity map of the scanned area, written to a single HDF5 file per scan.
//!
//! ## Installation
//!
//! The only method of install is from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### HDF5
//!
//! Before building and running cmdp, HDF5 must be installed. Typically this will be
//! installed using a package manager (homebrew, apt, etc), and the Rust libraries will
//! auto detect the location of the HDF install. If HDF5 lives in a custom location, write
//! the following snippet into the file `.cargo/config.toml` in the cmdp repository:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./cmdp_cli` from the top level
//! repository. The source of `cmdp_cli` is also the reference example of driving the
//! library.
//!
//! ## Input Layout
//!
//! A beamtime directory (`raw_path`) is expected to contain
//!
//! ```text
//! raw/Scans/Scan_#.log                    motor log of scan #
//! raw/scanFrames/Scan_#/*_LambdaUp.nxs    frame files of each detector
//! raw/scanFrames/Scan_#/*_LambdaFar.nxs
//! raw/scanFrames/Scan_#/*_LambdaDown.nxs
//! ```
//!
//! Frame files hold their frames at `/entry/instrument/detector/data`. They are processed
//! in lexicographic order, which must be the acquisition order. Step scans record one
//! file per raster position, fly scans one file per fast line.
//!
//! The calibration file (`calibration_path`) is an HDF5 file holding the pixel masks
//! `pixelmask_up`, `pixelmask_far` and `pixelmask_down`, where any nonzero flag marks a
//! bad pixel.
//!
//! ## Configuration
//!
//! - raw_path: Beamtime directory laid out as above
//! - output_path: Directory to which the results are written. Must exist.
//! - calibration_path: HDF5 file with the detector pixel masks
//! - scan_mode: `step` or `fly`
//! - output_kind: `full_data` (masked images) or `summary_map` (normalized maps)
//! - first_scan_number/last_scan_number: The scan range (inclusive). Scans without a log
//! are skipped.
//! - n_threads: Number of worker threads reducing frame files. Must be at least 1.
//! - parse_policy: `strict` fails on a malformed log line, `lenient` skips it with a warning
//! - detectors: Detectors to process
//! - reference_detector: Detector every summary map is divided by
//! - compression_level: gzip level (0-9) of full data image stacks, 0 disables it
//!
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! raw_path: None
//! output_path: None
//! calibration_path: None
//! scan_mode: step
//! output_kind: summary_map
//! first_scan_number: 0
//! last_scan_number: 0
//! n_threads: 1
//! parse_policy: strict
//! detectors:
//! - lambda_up
//! - lambda_far
//! - lambda_down
//! reference_detector: lambda_far
//! compression_level: 4
//! ```
//!
//! ## Output
//!
//! Each scan is written to `<output_path>/Scan_#/scan_#_data.h5` (full data) or
//! `<output_path>/Scan_#/scan_#.h5` (summary map). The data format is as follows:
//!
//! ```text
//! scan_#.h5 - version, mode, kind
//! |---- detector_data
//! |    |---- lambda_up(dset)
//! |    |---- lambda_far(dset)
//! |    |---- lambda_down(dset)
//! |---- motor_coordinates
//! |    |---- fast_coordinates(dset)
//! |    |---- slow_coordinates(dset)
//! |---- scan_size
//! |    |---- fast_size(dset)
//! |    |---- slow_size(dset)
//! ```
//!
//! Detector datasets are `(n, rows, cols)` image stacks for full data, and
//! `(fast_size, slow_size)` maps for summary maps. Maps of an incomplete scan are zero
//! padded at the end.
pub mod aggregator;
pub mod calibration;
pub mod config;
pub mod constants;
pub mod detector;
pub mod error;
pub mod frame_source;
pub mod geometry;
pub mod hdf_writer;
pub mod log_parser;
pub mod pool;
pub mod process;
pub mod reducer;
pub mod worker_status;
