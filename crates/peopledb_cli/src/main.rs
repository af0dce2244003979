//! PeopleDB command-line harness.
//!
//! # Responsibility
//! - Expose the person repository operations over a SQLite file or memory store.
//! - Keep output machine-readable: JSON for records, bare numbers for counts.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use log::info;
use peopledb_core::db::{open_db, open_db_in_memory};
use peopledb_core::{
    core_version, default_log_level, init_logging, PeopleRepository, Person, Repository,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "peopledb", version, about = "Manage people records in SQLite")]
struct Cli {
    /// Database file; an in-memory database is used when omitted.
    #[arg(long, env = "PEOPLEDB_PATH")]
    db: Option<PathBuf>,

    #[arg(long, env = "PEOPLEDB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for rotating log files; logs go to stderr when omitted.
    #[arg(long, env = "PEOPLEDB_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert a person and print it with its new id.
    Add {
        #[arg(long)]
        first: String,
        #[arg(long)]
        last: String,
        /// Date of birth as RFC 3339, e.g. 2000-01-01T00:00:00-05:00.
        #[arg(long)]
        dob: String,
        #[arg(long)]
        email: Option<String>,
    },
    Get {
        id: i64,
    },
    List,
    Count,
    /// Delete every listed person in one statement.
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    SetSalary {
        id: i64,
        cents: i64,
    },
    /// Create, read back, count and delete one sample person.
    Demo,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let log_dir = cli.log_dir.as_deref().map(absolute).transpose()?;
    init_logging(level, log_dir.as_deref()).map_err(|err| anyhow!(err))?;
    info!(
        "event=cli_start module=cli status=ok version={}",
        core_version()
    );

    let conn = match &cli.db {
        Some(path) => open_db(path)
            .with_context(|| format!("failed to open database `{}`", path.display()))?,
        None => open_db_in_memory().context("failed to open in-memory database")?,
    };

    run(&conn, cli.command)
}

fn run(conn: &Connection, command: Command) -> Result<()> {
    let repo = PeopleRepository::try_new(conn)?;

    match command {
        Command::Add {
            first,
            last,
            dob,
            email,
        } => {
            let mut person = Person::new(first, last, parse_dob(&dob)?);
            person.email = email;
            repo.create(&mut person)?;
            print_json(&person)?;
        }
        Command::Get { id } => {
            let person = repo
                .find_by_id(id)?
                .ok_or_else(|| anyhow!("person {id} not found"))?;
            print_json(&person)?;
        }
        Command::List => print_json(&repo.find_all()?)?,
        Command::Count => println!("{}", repo.count()?),
        Command::Delete { ids } => {
            let people = ids
                .iter()
                .map(|&id| {
                    repo.find_by_id(id)?
                        .ok_or_else(|| anyhow!("person {id} not found"))
                })
                .collect::<Result<Vec<_>>>()?;
            println!("{}", repo.delete_many(&people)?);
        }
        Command::SetSalary { id, cents } => {
            let mut person = repo
                .find_by_id(id)?
                .ok_or_else(|| anyhow!("person {id} not found"))?;
            person.salary_cents = Some(cents);
            repo.update(&person)?;
            print_json(&person)?;
        }
        Command::Demo => run_demo(&repo)?,
    }

    Ok(())
}

fn run_demo(repo: &PeopleRepository<'_>) -> Result<()> {
    let before = repo.count()?;
    let mut ann = Person::new("Ann", "Lee", parse_dob("2000-01-01T00:00:00-05:00")?);
    let id = repo.create(&mut ann)?;
    println!("created id={id} count={}", repo.count()?);

    let found = repo
        .find_by_id(id)?
        .ok_or_else(|| anyhow!("person {id} vanished"))?;
    println!(
        "found dob={} equal={}",
        found.dob.to_rfc3339(),
        found == ann
    );

    repo.delete_one(&found)?;
    println!("deleted count={} before={before}", repo.count()?);
    Ok(())
}

fn parse_dob(text: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text).with_context(|| format!("invalid --dob `{text}`"))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("failed to resolve current directory")?
        .join(path))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
