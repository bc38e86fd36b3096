//! TidesDB CLI
//!
//! Command-line shell over a TidesDB database directory.
//!
//! # Commands
//!
//! - `create-cf` / `drop-cf` / `list-cf` - Manage column families
//! - `put` / `get` / `delete` - Read and write keys
//! - `compact` - Compact a column family
//!
//! Every command prints `status message [value]` and exits non-zero when
//! the status is not `0`.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::Reply;
use std::path::PathBuf;
use std::process::ExitCode;
use tidesdb_binding::{
    ColumnFamilyConfig, CompressionAlgorithm, Database, MemtableKind, NO_EXPIRY,
};
use tracing_subscriber::EnvFilter;

/// TidesDB command-line shell.
#[derive(Parser)]
#[command(name = "tidesdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Compression {
    None,
    Snappy,
    Lz4,
    Zstd,
}

impl From<Compression> for CompressionAlgorithm {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => Self::None,
            Compression::Snappy => Self::Snappy,
            Compression::Lz4 => Self::Lz4,
            Compression::Zstd => Self::Zstd,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Memtable {
    SkipList,
    HashTable,
}

impl From<Memtable> for MemtableKind {
    fn from(value: Memtable) -> Self {
        match value {
            Memtable::SkipList => Self::SkipList,
            Memtable::HashTable => Self::HashTable,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a column family
    CreateCf {
        /// Column family name
        name: String,

        /// Memtable flush threshold in bytes
        #[arg(long, default_value_t = 64 * 1024 * 1024)]
        flush_threshold: i32,

        /// Maximum skip list level
        #[arg(long, default_value_t = 12)]
        max_level: i32,

        /// Skip list level probability
        #[arg(long, default_value_t = 0.24)]
        probability: f32,

        /// Compression algorithm
        #[arg(long, value_enum, default_value = "none")]
        compression: Compression,

        /// Enable bloom filters
        #[arg(long)]
        bloom_filter: bool,

        /// Memtable data structure
        #[arg(long, value_enum, default_value = "skip-list")]
        memtable: Memtable,
    },

    /// Drop a column family and all its data
    DropCf {
        /// Column family name
        name: String,
    },

    /// List column families
    ListCf,

    /// Store a value
    Put {
        /// Column family name
        column_family: String,
        /// Key
        key: String,
        /// Value
        value: String,

        /// Time to live in seconds (-1 = never expires)
        #[arg(long, default_value_t = NO_EXPIRY, allow_hyphen_values = true)]
        ttl: i64,
    },

    /// Read a value
    Get {
        /// Column family name
        column_family: String,
        /// Key
        key: String,
    },

    /// Delete a key
    Delete {
        /// Column family name
        column_family: String,
        /// Key
        key: String,
    },

    /// Compact a column family, blocking until done
    Compact {
        /// Column family name
        column_family: String,

        /// Maximum number of compaction threads
        #[arg(short, long, default_value_t = 1)]
        threads: i32,
    },

    /// Show version information
    Version,
}

fn run(db: &Database, command: Commands) -> Reply {
    match command {
        Commands::CreateCf {
            name,
            flush_threshold,
            max_level,
            probability,
            compression,
            bloom_filter,
            memtable,
        } => {
            let config = ColumnFamilyConfig::new()
                .flush_threshold(flush_threshold)
                .max_level(max_level)
                .probability(probability)
                .compression(compression.into())
                .bloom_filter(bloom_filter)
                .memtable(memtable.into());
            commands::column_family::create(db, &name, &config)
        }
        Commands::DropCf { name } => commands::column_family::drop_cf(db, &name),
        Commands::ListCf => commands::column_family::list(db),
        Commands::Put {
            column_family,
            key,
            value,
            ttl,
        } => commands::kv::put(db, &column_family, &key, &value, ttl),
        Commands::Get { column_family, key } => commands::kv::get(db, &column_family, &key),
        Commands::Delete { column_family, key } => commands::kv::delete(db, &column_family, &key),
        Commands::Compact {
            column_family,
            threads,
        } => commands::compact::run(db, &column_family, threads),
        Commands::Version => Reply::ok(),
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if matches!(cli.command, Commands::Version) {
        println!("TidesDB CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("TidesDB binding v{}", tidesdb_binding::VERSION);
        println!("TidesDB engine v{}", tidesdb_binding::engine_version());
        return Ok(ExitCode::SUCCESS);
    }

    let path = cli.path.ok_or("Database path required")?;
    let directory = path.to_str().ok_or("Database path must be valid UTF-8")?;

    let reply = match Database::open(directory) {
        Ok(db) => {
            let reply = run(&db, cli.command);
            match db.close() {
                Ok(()) => reply,
                Err(status) if reply.is_ok() => Reply::from(status),
                Err(_) => reply,
            }
        }
        Err(status) => Reply::from(status),
    };

    println!("{reply}");
    Ok(reply.exit_code())
}
