// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI tool for interacting with linear hash files

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use humansize::{SizeFormatter, BINARY};
use linear_hash::{Config, Decode, Encode, FileBlockStore, LinearHash, Record};
use rustyline::DefaultEditor;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};

    () => {{
        eprintln!("Program terminated unexpectedly");
        std::process::exit(1);
    }};
}

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

pub fn init_tracing(quiet: bool, verbose: u8) -> (bool, LevelFilter) {
    let is_verbose = !quiet && verbose > 0;

    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Bridge log crate macros to tracing (for library code that uses log::*)
    tracing_log::LogTracer::init().expect("Failed to set log tracer");

    let registry = Registry::default();

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("LHF_LOG")
        .from_env_lossy()
        .add_directive(
            "rustyline=warn"
                .parse()
                .expect("Failed to parse rustyline directive"),
        );

    let subscriber = registry.with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing_panic::panic_hook(info);
        prev_hook(info); // daisy-chain to old panic hook
    }));

    (is_verbose, level_filter)
}

fn parse_size_as_u32(s: &str) -> Result<u32, String> {
    let cfg = parse_size::Config::new().with_binary();
    cfg.parse_size(s)
        .map_err(|e| e.to_string())
        .and_then(|size| u32::try_from(size).map_err(|e| e.to_string()))
}

/// Maximum length of a value in bytes
const VALUE_LEN: usize = 58;

/// Record stored by the shell: an integer key and a short text value
///
/// ```text
/// [present: u8 = 1][key: i32][value length: u8][value: 58 bytes, zero-padded]
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
struct ShellRecord {
    key: i32,
    value: String,
}

impl ShellRecord {
    fn new(key: i32, value: &str) -> Result<Self, String> {
        if value.len() > VALUE_LEN {
            return Err(format!(
                "value is {} bytes long, at most {VALUE_LEN} bytes are supported",
                value.len()
            ));
        }

        Ok(Self {
            key,
            value: value.to_string(),
        })
    }

    fn partial(key: i32) -> Self {
        Self {
            key,
            value: String::new(),
        }
    }
}

impl Encode for ShellRecord {
    fn encode_into<W: Write>(&self, writer: &mut W) -> linear_hash::Result<()> {
        let mut value = [0; VALUE_LEN];
        let len = self.value.len().min(VALUE_LEN);
        value[..len].copy_from_slice(&self.value.as_bytes()[..len]);

        // NOTE: The marker byte keeps the slot from ever being all zero
        writer.write_all(&[1])?;
        writer.write_all(&self.key.to_be_bytes())?;
        writer.write_all(&[len as u8])?;
        writer.write_all(&value)?;

        Ok(())
    }
}

impl Decode for ShellRecord {
    fn decode_from<R: Read>(reader: &mut R) -> linear_hash::Result<Self> {
        let mut header = [0; 6];
        reader.read_exact(&mut header)?;

        let key = i32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        let len = usize::from(header[5]).min(VALUE_LEN);

        let mut value = [0; VALUE_LEN];
        reader.read_exact(&mut value)?;

        Ok(Self {
            key,
            value: String::from_utf8_lossy(&value[..len]).into_owned(),
        })
    }
}

impl Record for ShellRecord {
    const ENCODED_LEN: usize = 1 + 4 + 1 + VALUE_LEN;

    fn hash_key(&self) -> i32 {
        self.key
    }

    fn same_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// CLI tool for interacting with linear hash files
#[derive(Parser, Debug)]
#[command(name = "lhf")]
#[command(about = "CLI tool for interacting with linear hash files")]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides the -v flag.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the hash file directory (will be created if it doesn't exist)
    lhf_path: PathBuf,

    /// Number of buckets of a new hash file
    #[arg(short = 'b', long, default_value_t = 16, value_name = "COUNT")]
    initial_buckets: u32,

    /// Block size of primary buckets of a new hash file (e.g., "4KiB", "4096")
    #[arg(
        short = 'm', long,
        default_value = "4KiB",
        value_parser = parse_size_as_u32,
        value_name = "SIZE",
    )]
    main_block_size: u32,

    /// Block size of overflow blocks of a new hash file (e.g., "1KiB", "1024")
    #[arg(
        short = 'o', long,
        default_value = "1KiB",
        value_parser = parse_size_as_u32,
        value_name = "SIZE",
    )]
    overflow_block_size: u32,

    /// Command to run (if omitted, starts interactive shell)
    #[command(subcommand)]
    command: Option<ToolCommand>,
}

#[derive(Subcommand, Debug, Clone)]
enum ToolCommand {
    /// Get the value for a key
    Get {
        /// The key to look up
        #[arg(allow_negative_numbers = true)]
        key: i32,
    },
    /// Set a key-value pair
    Set {
        /// The key to set
        #[arg(allow_negative_numbers = true)]
        key: i32,
        /// The value to store
        value: String,
    },
    /// Delete a key
    Del {
        /// The key to delete
        #[arg(allow_negative_numbers = true)]
        key: i32,
    },
    /// List all records, bucket by bucket
    #[command(visible_alias = "list", visible_alias = "ls")]
    Scan {
        /// Show the bucket address of each record
        #[arg(short = 'l', long = "long")]
        long: bool,
    },
    /// Count the number of records
    Count,
    /// Flush free lists and blocks to disk
    Flush,
    /// Split the bucket at the split pointer
    Split,
    /// Merge the last bucket into its partner
    Merge,
    /// Show hash file statistics
    Info,
}

// Internal shell commands, include all external tool commands
#[derive(Parser, Debug)]
#[command(name = "")]
#[command(no_binary_name = true)]
#[command(disable_version_flag = true)]
#[command(help_template = "
{version}

Available Commands:

{subcommands}

Use `help COMMAND` or `COMMAND --help` for more details.

")]

struct ShellArgs {
    #[command(subcommand)]
    command: ShellCommand,
}

// Shell commands (including ones not available from CLI)
#[derive(Subcommand, Debug, Clone)]
enum ShellCommand {
    #[command(flatten)]
    ToolCmd(ToolCommand),

    /// Exit the current shell (with implicit flush)
    #[command(visible_alias = "quit")]
    Exit,
    /// Abort the curent shell (without flush)
    Abort,
}

struct Session {
    hash: LinearHash<ShellRecord, FileBlockStore>,
    path: PathBuf,
}

impl Session {
    fn open(args: &ToolArgs) -> linear_hash::Result<Self> {
        let hash = Config::new(&args.lhf_path)
            .initial_buckets(args.initial_buckets)
            .main_block_size(args.main_block_size)
            .overflow_block_size(args.overflow_block_size)
            .open()?;

        Ok(Self {
            hash,
            path: args.lhf_path.clone(),
        })
    }
}

fn print_info(session: &Session) {
    let stats = session.hash.stats();

    println!("Path: {}", session.path.display());
    println!("Initial buckets: {}", session.hash.initial_buckets());
    println!("Buckets: {}", stats.bucket_count);
    println!("Level: {}", stats.level);
    println!("Split pointer: {}", stats.split_pointer);
    println!(
        "Records per bucket/overflow block: {}/{}",
        session.hash.heap().main_capacity(),
        session.hash.heap().overflow_capacity(),
    );
    println!(
        "Overflow blocks: {} ({} free)",
        stats.overflow_blocks,
        stats.overflow_blocks_total - stats.overflow_blocks,
    );
    println!("Overflow ratio: {:.3}", stats.overflow_ratio);
    match session.hash.len() {
        Ok(count) => println!("Records: {count}"),
        Err(e) => eprintln!("Error counting records: {e}"),
    }
    println!(
        "Disk space: {}",
        SizeFormatter::new(session.hash.disk_space(), BINARY)
    );
}

fn handle_get(session: &Session, key: i32) {
    match session.hash.get(&ShellRecord::partial(key)) {
        Ok(Some(record)) => println!("{}", record.value),
        Ok(None) => println!("(not found)"),
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn handle_set(session: &mut Session, key: i32, value: &str, flush: bool) {
    let record = match ShellRecord::new(key, value) {
        Ok(record) => record,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    let result = match session.hash.update(record.clone()) {
        Ok(true) => Ok("updated"),
        Ok(false) => session.hash.insert(record).map(|()| "set"),
        Err(e) => Err(e),
    };

    let what = match result {
        Ok(what) => what,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    if flush {
        if let Err(e) = session.hash.flush() {
            eprintln!("Error flushing: {e}");
            return;
        }
    }
    println!("OK ({what})");
}

fn handle_del(session: &mut Session, key: i32, flush: bool) {
    match session.hash.delete(&ShellRecord::partial(key)) {
        Ok(true) => {}
        Ok(false) => {
            println!("(not found)");
            return;
        }
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    }

    if flush {
        if let Err(e) = session.hash.flush() {
            eprintln!("Error flushing: {e}");
            return;
        }
    }
    println!("OK");
}

fn handle_scan(session: &Session, long: bool) {
    let mut count = 0;
    for item in session.hash.iter() {
        match item {
            Ok(record) => {
                if long {
                    println!(
                        "{} = {} [bucket={}]",
                        record.key,
                        record.value,
                        session.hash.address_of(record.key)
                    );
                } else {
                    println!("{} = {}", record.key, record.value);
                }
                count += 1;
            }
            Err(e) => {
                eprintln!("Error reading item: {e}");
                break;
            }
        }
    }
    println!("OK ({count} items)");
}

fn handle_count(session: &Session) {
    match session.hash.len() {
        Ok(count) => println!("{count}"),
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn handle_flush(session: &mut Session) {
    match session.hash.flush() {
        Ok(()) => println!("OK (flushed)"),
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn handle_split(session: &mut Session, flush: bool) {
    if let Err(e) = session.hash.split() {
        eprintln!("Error: {e}");
        return;
    }
    if flush {
        if let Err(e) = session.hash.flush() {
            eprintln!("Error flushing: {e}");
            return;
        }
    }
    println!("OK ({} buckets)", session.hash.bucket_count());
}

fn handle_merge(session: &mut Session, flush: bool) {
    if let Err(e) = session.hash.merge() {
        eprintln!("Error: {e}");
        return;
    }
    if flush {
        if let Err(e) = session.hash.flush() {
            eprintln!("Error flushing: {e}");
            return;
        }
    }
    println!("OK ({} buckets)", session.hash.bucket_count());
}

/// Result of executing a command
enum CommandResult {
    Continue,
    Exit,
}

/// Execute a parsed command
fn execute_command(session: &mut Session, cmd: ToolCommand, auto_flush: bool) -> CommandResult {
    match cmd {
        ToolCommand::Get { key } => handle_get(session, key),
        ToolCommand::Set { key, value } => handle_set(session, key, &value, auto_flush),
        ToolCommand::Del { key } => handle_del(session, key, auto_flush),
        ToolCommand::Scan { long } => handle_scan(session, long),
        ToolCommand::Count => handle_count(session),
        ToolCommand::Flush => handle_flush(session),
        ToolCommand::Split => handle_split(session, auto_flush),
        ToolCommand::Merge => handle_merge(session, auto_flush),
        ToolCommand::Info => print_info(session),
    }
    CommandResult::Continue
}

/// Execute a shell-only command
fn execute_shell_command(
    session: &mut Session,
    cmd: ShellCommand,
    auto_flush: bool,
) -> CommandResult {
    match cmd {
        ShellCommand::ToolCmd(tool_cmd) => execute_command(session, tool_cmd, auto_flush),
        ShellCommand::Exit => {
            handle_flush(session);
            CommandResult::Exit
        }
        ShellCommand::Abort => {
            // Dropping the stores still writes their free lists
            CommandResult::Exit
        }
    }
}

/// Parse and run a shell command line
fn run_shell_command(session: &mut Session, line: &str) -> CommandResult {
    let line = line.trim();
    if line.is_empty() {
        return CommandResult::Continue;
    }

    let tokens = match shlex::split(line) {
        Some(t) if !t.is_empty() => t,
        Some(_) => return CommandResult::Continue,
        None => {
            eprintln!("error: unclosed quote");
            return CommandResult::Continue;
        }
    };

    match ShellArgs::try_parse_from(&tokens) {
        Ok(args) => execute_shell_command(session, args.command, false),
        Err(e) => {
            // Print clap's error message
            eprintln!("{e}");
            CommandResult::Continue
        }
    }
}

fn run_shell(session: &mut Session) {
    if io::stdin().is_terminal() {
        run_shell_interactive(session);
    } else {
        run_shell_non_interactive(session);
    }
}

fn run_shell_interactive(session: &mut Session) {
    println!("Welcome to the linear hash shell");
    println!("Type 'help' for available commands, 'exit' to quit.\n");

    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error initializing line editor: {e}");
            return;
        }
    };

    loop {
        match rl.readline("lhf> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                if let CommandResult::Exit = run_shell_command(session, &line) {
                    break;
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                // Ignore Ctrl+C, just show a new prompt
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        }
    }
}

fn run_shell_non_interactive(session: &mut Session) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if stdout.flush().is_err() {
            die!("can't flush stdout");
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                // EOF
                break;
            }
            Ok(_) => {
                if let CommandResult::Exit = run_shell_command(session, &line) {
                    break;
                }
            }
            Err(e) => {
                die!("Error reading input: {}", e);
            }
        }
    }
}

fn main() {
    let args = ToolArgs::parse();
    let (verbose, level_filter) = init_tracing(args.quiet, args.verbose);

    let cmd = ToolArgs::command();

    info!(
        "starting {} ({} {}), log level: {level_filter}",
        cmd.get_name(),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let mut session = match Session::open(&args) {
        Ok(s) => s,
        Err(e) => {
            let note = if verbose {
                ""
            } else {
                ". Note: Use -v (one or multiple times) for more information"
            };
            die!("Error opening hash file: {}{}", e, note);
        }
    };

    match args.command {
        Some(cmd) => {
            execute_command(&mut session, cmd, true);
        }
        None => run_shell(&mut session),
    }
}
