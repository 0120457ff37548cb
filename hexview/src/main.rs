#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use hexview::{
    HexSession, OperationEvent, OperationResult, Settings, TextSelection, TextSurface,
    progress_text,
};
use hexviewlib::{DigestRegistry, Endianness, TEXT_PAYLOAD_PREFIX};
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// View, edit and checksum binary files as hex text
#[derive(Parser, Debug)]
#[command(name = "hexview")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    layout: LayoutArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Bits per byte group (8, 16, 32, 64 or 128)
    #[arg(short, long, default_value_t = 16, global = true)]
    group_bits: usize,

    /// Bytes per line (8, 10, 16, 24, 32, 48, 64, 128, 256 or 512)
    #[arg(short = 'w', long, default_value_t = 24, global = true)]
    bytes_per_line: usize,

    /// Render hex digits in uppercase
    #[arg(short, long, global = true)]
    uppercase: bool,

    /// Address of the first byte (hex)
    #[arg(long, value_parser = parse_address, default_value = "0", global = true)]
    start: u64,

    /// Refuse files above this size in KB
    #[arg(long, default_value_t = 50_000, global = true)]
    max_size_kb: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a binary file as hex text
    Dump {
        input: PathBuf,

        /// Write the text to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert hex text back to a binary file
    Export {
        /// Hex text file
        input: PathBuf,

        output: PathBuf,

        /// Overwrite an existing output file
        #[arg(short, long)]
        force: bool,

        /// Do not hash the written bytes
        #[arg(long)]
        no_checksum: bool,

        /// Hash algorithm used for the checksum on save
        #[arg(short, long)]
        algorithm: Option<String>,
    },

    /// Checksum the bytes shown by the hex view of a file
    Checksum {
        input: PathBuf,

        /// Input is hex text rather than binary
        #[arg(short = 'x', long)]
        hex: bool,

        #[arg(short, long)]
        algorithm: Option<String>,
    },

    /// Hash a string
    Hash {
        text: String,

        #[arg(short, long)]
        algorithm: Option<String>,
    },

    /// Show the values of the bytes at an address
    Inspect {
        input: PathBuf,

        /// Address (hex)
        #[arg(value_parser = parse_address)]
        address: u64,

        #[arg(short, long)]
        big_endian: bool,
    },

    /// Locate an address in the hex view
    Find {
        input: PathBuf,

        /// Address (hex)
        #[arg(value_parser = parse_address)]
        address: u64,
    },

    /// Patch bytes at an address and write the result
    Edit {
        input: PathBuf,

        /// Address of the first patched byte (hex)
        #[arg(value_parser = parse_address)]
        address: u64,

        /// Hex digits, or text prefixed with "s:"
        payload: String,

        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite an existing output file
        #[arg(short, long)]
        force: bool,
    },

    /// List the supported hash algorithms
    Algorithms,
}

fn parse_address(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|err| format!("invalid address '{s}': {err}"))
}

impl LayoutArgs {
    fn settings(&self) -> Settings {
        Settings {
            group_bits: self.group_bits,
            bytes_per_line: self.bytes_per_line,
            lowercase_hex: !self.uppercase,
            starting_address: self.start,
            max_file_size_kb: self.max_size_kb,
            ..Settings::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = cli.layout.settings();

    match cli.command {
        Command::Dump { input, output } => cmd_dump(settings, &input, output.as_deref()),
        Command::Export {
            input,
            output,
            force,
            no_checksum,
            algorithm,
        } => {
            let settings = Settings {
                checksum_on_save: !no_checksum,
                hash_algorithm: algorithm.unwrap_or(settings.hash_algorithm),
                ..settings
            };
            cmd_export(settings, &input, &output, force)
        }
        Command::Checksum {
            input,
            hex,
            algorithm,
        } => cmd_checksum(settings, &input, hex, algorithm.as_deref()),
        Command::Hash { text, algorithm } => cmd_hash(settings, &text, algorithm.as_deref()),
        Command::Inspect {
            input,
            address,
            big_endian,
        } => cmd_inspect(settings, &input, address, big_endian),
        Command::Find { input, address } => cmd_find(settings, &input, address),
        Command::Edit {
            input,
            address,
            payload,
            output,
            force,
        } => cmd_edit(settings, &input, address, &payload, &output, force),
        Command::Algorithms => {
            for name in DigestRegistry::default().names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

/// Polls the running operation until it finishes, drawing progress on a terminal.
fn drive(session: &mut HexSession) -> Result<OperationResult> {
    let show_progress = io::stderr().is_terminal();
    loop {
        match session.poll() {
            Some(OperationEvent::Progress(kind, progress)) => {
                if show_progress {
                    eprint!("\r{}", progress_text(kind, progress));
                    let _ = io::stderr().flush();
                }
                thread::sleep(POLL_INTERVAL);
            }
            Some(OperationEvent::Finished(_, outcome)) => {
                if show_progress {
                    eprintln!();
                }
                return match outcome {
                    OperationResult::Failed(err) => Err(err.into()),
                    OperationResult::Aborted => bail!("Operation aborted"),
                    other => Ok(other),
                };
            }
            None => bail!("No operation is running"),
        }
    }
}

fn open_binary(settings: Settings, input: &Path) -> Result<HexSession> {
    let mut session = HexSession::new(settings)?;
    session.open(input)?;
    drive(&mut session)?;
    Ok(session)
}

fn open_hex_text(settings: Settings, input: &Path) -> Result<HexSession> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let mut session = HexSession::new(settings)?;
    session.load_text(&text)?;
    Ok(session)
}

fn ensure_writable(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists, use --force to overwrite it",
            output.display()
        );
    }
    Ok(())
}

fn export_to(session: &mut HexSession, output: &Path) -> Result<()> {
    session.export(output)?;
    if let OperationResult::Exported {
        path,
        bytes,
        checksum,
    } = drive(session)?
    {
        println!("Exported {bytes} bytes to {}", path.display());
        if let Some((algorithm, hexdigest)) = checksum {
            println!("{algorithm}: {hexdigest}");
        }
    }
    Ok(())
}

fn cmd_dump(settings: Settings, input: &Path, output: Option<&Path>) -> Result<()> {
    let session = open_binary(settings, input)?;
    let text = session.surface().text();
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn cmd_export(settings: Settings, input: &Path, output: &Path, force: bool) -> Result<()> {
    ensure_writable(output, force)?;
    let mut session = open_hex_text(settings, input)?;
    export_to(&mut session, output)
}

fn cmd_checksum(
    settings: Settings,
    input: &Path,
    hex: bool,
    algorithm: Option<&str>,
) -> Result<()> {
    let mut session = if hex {
        open_hex_text(settings, input)?
    } else {
        open_binary(settings, input)?
    };
    session.checksum(algorithm)?;
    if let OperationResult::Checksummed {
        algorithm,
        hexdigest,
    } = drive(&mut session)?
    {
        println!("{algorithm}: {hexdigest}");
    }
    Ok(())
}

fn cmd_hash(settings: Settings, text: &str, algorithm: Option<&str>) -> Result<()> {
    let session = HexSession::new(settings)?;
    println!("{}", session.hash_text(algorithm, text)?);
    Ok(())
}

fn cmd_inspect(settings: Settings, input: &Path, address: u64, big_endian: bool) -> Result<()> {
    let mut session = open_binary(settings, input)?;
    if big_endian {
        session.set_endianness(Endianness::Big);
    }
    let inspection = session.inspect_address(address)?;
    println!("Address: 0x{address:08x}");
    print!("{inspection}");
    Ok(())
}

fn cmd_find(settings: Settings, input: &Path, address: u64) -> Result<()> {
    let mut session = open_binary(settings, input)?;
    let location = session.find_address(address)?;
    println!(
        "0x{address:08x}: line {}, column {}",
        location.line + 1,
        location.column
    );
    if let Some(line) = session.surface().line(location.line) {
        println!("{line}");
    }
    Ok(())
}

/// Number of bytes a payload replaces.
fn payload_len(payload: &str) -> usize {
    payload.strip_prefix(TEXT_PAYLOAD_PREFIX).map_or_else(
        || payload.chars().filter(|c| !c.is_whitespace()).count().div_ceil(2),
        str::len,
    )
}

fn cmd_edit(
    settings: Settings,
    input: &Path,
    address: u64,
    payload: &str,
    output: &Path,
    force: bool,
) -> Result<()> {
    ensure_writable(output, force)?;
    let mut session = open_binary(settings, input)?;
    let location = session.find_address(address)?;

    let count = payload_len(payload).max(1);
    let last = session
        .layout()
        .column_for_byte_index(location.byte_index + count - 1);
    let selection = TextSelection::new(location.line, location.column..last + 2);
    let outcome = session.edit(&selection, payload)?;
    log::info!("{} changed run(s)", outcome.changed.len());

    export_to(&mut session, output)
}
