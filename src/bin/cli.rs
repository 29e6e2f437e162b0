//! usercollect CLI
//!
//! Offline inspection and backup of a store file. The file must not be held
//! by a running server.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use usercollect::wal::LogRecovery;
use usercollect::{DbOptions, SyncStrategy, UserStore};

/// usercollect CLI
#[derive(Parser, Debug)]
#[command(name = "usercollect-cli")]
#[command(about = "Inspect and back up a usercollect store file")]
#[command(version)]
struct Args {
    /// Path of the store file
    #[arg(short, long, default_value = "./usercollect.db")]
    db: PathBuf,

    /// Seconds to wait for the store file lock
    #[arg(long, default_value = "1")]
    lock_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the commit log without modifying or locking the file
    Verify,

    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that open the store
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Print a user as JSON
    Get {
        /// The user id
        id: u64,
    },

    /// Print the id registered for an email address
    SearchEmail {
        email: String,
    },

    /// Print the id registered for a phone number
    SearchPhone {
        phone: String,
    },

    /// Print the ids of every user whose email starts with a prefix
    Fuzzy {
        /// Email prefix (empty matches everyone)
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Print record count, backup size and last transaction id
    Stats,

    /// Write a consistent copy of the store to a new file
    Backup {
        /// Output path
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> usercollect::Result<()> {
    let command = match args.command {
        Commands::Verify => return verify(&args.db),
        Commands::Store(command) => command,
    };

    let store = UserStore::new(DbOptions {
        lock_timeout: Duration::from_secs(args.lock_timeout_secs),
        sync_strategy: SyncStrategy::EveryCommit,
    });
    store.open_existing(&args.db)?;

    let outcome = execute(&store, command);
    store.close()?;
    outcome
}

fn verify(path: &Path) -> usercollect::Result<()> {
    let result = LogRecovery::verify(path)?;
    println!("frames:          {}", result.frames_recovered);
    println!("last txid:       {}", result.last_txid);
    println!("valid length:    {}", result.end_offset);
    if result.was_truncated {
        println!("torn tail:       {} bytes (removed on next open)", result.bytes_truncated);
    }
    Ok(())
}

fn execute(store: &UserStore, command: StoreCommand) -> usercollect::Result<()> {
    match command {
        StoreCommand::Get { id } => {
            let user = store.get_user(id)?;
            let json = serde_json::to_string_pretty(&user)
                .map_err(|e| usercollect::CollectError::Serialization(e.to_string()))?;
            println!("{}", json);
        }
        StoreCommand::SearchEmail { email } => {
            println!("{}", store.get_user_id_by_email(&email)?);
        }
        StoreCommand::SearchPhone { phone } => {
            println!("{}", store.get_user_id_by_phone(&phone)?);
        }
        StoreCommand::Fuzzy { prefix } => {
            for id in store.get_user_ids_matching_email_prefix(&prefix)? {
                println!("{}", id);
            }
        }
        StoreCommand::Stats => {
            let snapshot = store.snapshot()?;
            println!("users:           {}", store.user_count()?);
            println!("last txid:       {}", snapshot.txid());
            println!("backup size:     {}", snapshot.size()?);
        }
        StoreCommand::Backup { out } => {
            let mut file = BufWriter::new(File::create(&out)?);
            let written = store.backup(&mut file)?;
            file.flush()?;
            file.get_ref().sync_all()?;
            println!("wrote {} bytes to {}", written, out.display());
        }
    }
    Ok(())
}
