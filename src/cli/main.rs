use clap::{Arg, ArgAction, ArgMatches, Command};
use simplelog::{ConfigBuilder, LevelFilter, LevelPadding, WriteLogger};
use std::fs::{self, File};

use packsim::{BYTES_PER_WORD, CYLINDERS, DRIVE_WORDS, WORDS_PER_SECTOR};

const IMAGE_PATH: &str = "IMAGE_PATH";
const FORCE: &str = "force";
const LOG_PATH: &str = "LOG_PATH";
const LOG_LEVEL: &str = "LOG_LEVEL";

const CREATE_CMD: &str = "create";
const INFO_CMD: &str = "info";

fn cli() -> Command {
    // Hack to make the build dirty when the toml changes.
    include_str!("../../Cargo.toml");

    clap::command!()
        .subcommand_required(true)
        .arg_required_else_help(true)
        .after_help(
            "Pack images are flat files holding one little-endian 32-bit \
             value per 18-bit word; a full pack is 203 cylinders of 20 \
             surfaces of 10 sectors of 256 words. Images smaller than a \
             full pack are valid: unwritten words read as zero.",
        )
        .arg(
            Arg::new(LOG_PATH)
                .help("If set, a debug log will be written to the given path.")
                .short('l')
                .long("log")
                .global(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(LOG_LEVEL)
                .help(
                    "Set the log level. Has no effect without \
                     specifying --log as well.",
                )
                .short('L')
                .long("log-level")
                .global(true)
                .default_value("TRACE")
                .value_parser(["TRACE", "DEBUG", "INFO"])
                .ignore_case(true),
        )
        .subcommand(
            Command::new(CREATE_CMD)
                .about("Create a new full-size pack image.")
                .arg(
                    Arg::new(IMAGE_PATH)
                        .help("The path of the image file to create.")
                        .required(true),
                )
                .arg(
                    Arg::new(FORCE)
                        .help("Overwrite the file if it already exists.")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new(INFO_CMD)
                .about("Describe an existing pack image.")
                .arg(
                    Arg::new(IMAGE_PATH)
                        .help("The path of the image file to inspect.")
                        .required(true),
                ),
        )
}

/// Initialise logging to the given file.
fn init_logging(logfile: File, level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_level_padding(LevelPadding::Right)
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();

    WriteLogger::init(level, config, logfile).unwrap();
}

fn create_image(args: &ArgMatches) -> Result<(), String> {
    let path = args.get_one::<String>(IMAGE_PATH).unwrap();
    if !args.get_flag(FORCE) && fs::metadata(path).is_ok() {
        return Err(format!(
            "'{}' already exists; pass --force to overwrite it.",
            path
        ));
    }
    let file = File::create(path).map_err(|e| format!("Failed to create '{}': {}", path, e))?;
    let bytes = (DRIVE_WORDS * BYTES_PER_WORD) as u64;
    file.set_len(bytes)
        .map_err(|e| format!("Failed to size '{}': {}", path, e))?;
    println!(
        "Created '{}': {} words ({} bytes).",
        path, DRIVE_WORDS, bytes
    );
    Ok(())
}

fn image_info(args: &ArgMatches) -> Result<(), String> {
    let path = args.get_one::<String>(IMAGE_PATH).unwrap();
    let meta = fs::metadata(path).map_err(|e| format!("Could not access '{}': {}", path, e))?;
    if !meta.is_file() {
        return Err(format!("'{}' is not a file.", path));
    }
    let words = meta.len() / BYTES_PER_WORD as u64;
    let full_sectors = words / WORDS_PER_SECTOR as u64;
    let full_cylinders = words / (DRIVE_WORDS / CYLINDERS) as u64;
    println!("'{}': {} words.", path, words);
    println!(
        "{} full sectors, {} full cylinders.",
        full_sectors, full_cylinders
    );
    if words >= DRIVE_WORDS as u64 {
        println!("The image covers a full pack.");
    } else {
        println!(
            "The image covers part of a pack; the remaining {} words read as zero.",
            DRIVE_WORDS as u64 - words
        );
    }
    Ok(())
}

/// Main run function; returns an exit code.
fn run(args: ArgMatches) -> u8 {
    return match _run(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    fn _run(args: ArgMatches) -> Result<(), String> {
        // Initialise logging if configured.
        if let Some(log_path) = args.get_one::<String>(LOG_PATH) {
            let logfile = File::create(log_path)
                .map_err(|e| format!("Failed to create log file: {}", e))?;
            let level = match args
                .get_one::<String>(LOG_LEVEL)
                .unwrap()
                .to_uppercase()
                .as_str()
            {
                "TRACE" => LevelFilter::Trace,
                "DEBUG" => LevelFilter::Debug,
                "INFO" => LevelFilter::Info,
                _ => unreachable!(),
            };
            init_logging(logfile, level);
        }

        match args.subcommand() {
            Some((CREATE_CMD, sub)) => create_image(sub),
            Some((INFO_CMD, sub)) => image_info(sub),
            _ => unreachable!(),
        }
    }
}

fn main() {
    let args = cli().get_matches();
    std::process::exit(run(args).into());
}
