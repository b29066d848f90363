pub mod output;
pub mod track;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use chrono_english::{parse_date_string, Dialect};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{
    report,
    store::{
        state_file::{JsonStateFile, StateStorage},
        TimeTrackerStore,
    },
    tracker::Tracker,
    utils::{
        clock::DefaultClock, dir::create_application_default_path, logging::enable_logging,
        time::format_duration,
    },
};

#[derive(Parser, Debug)]
#[command(name = "Punchclock", version)]
#[command(about = "Personal work-time tracker with per-day session accounting", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable console logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Show or set the person the other commands act on")]
    Person {
        #[arg(help = "Person to select. Omit to show the current selection")]
        name: Option<String>,
    },
    #[command(about = "Run a live work timer. Ctrl-C stops it and records the session")]
    Track {
        #[arg(long, help = "Track for this person instead of the selected one")]
        person: Option<String>,
    },
    #[command(about = "Show per-day totals and recorded sessions")]
    Status {
        #[arg(long, help = "Show this person instead of the selected one")]
        person: Option<String>,
        #[arg(
            short,
            long,
            help = "Only show one day. Examples are \"yesterday\", \"2024-01-01\""
        )]
        date: Option<String>,
    },
    #[command(about = "Add a manual time interval to today's total")]
    Add {
        #[arg(short, long, help = "Wall-clock start, HH:MM or HH:MM:SS")]
        start: String,
        #[arg(short, long, help = "Wall-clock end, HH:MM or HH:MM:SS")]
        end: String,
        #[arg(long, help = "Add for this person instead of the selected one")]
        person: Option<String>,
    },
    #[command(about = "Delete one recorded session")]
    Delete {
        #[arg(
            short,
            long,
            help = "Day of the session. Examples are \"yesterday\", \"2024-01-01\""
        )]
        date: String,
        #[arg(
            short = 'n',
            long = "session",
            help = "Session number as shown by status"
        )]
        number: usize,
        #[arg(long, help = "Delete for this person instead of the selected one")]
        person: Option<String>,
    },
    #[command(about = "Write the text report for one person")]
    Export {
        #[arg(
            short,
            long,
            help = "Output file. Defaults to <person>_time_tracking.txt"
        )]
        output: Option<PathBuf>,
        #[arg(long, help = "Export this person instead of the selected one")]
        person: Option<String>,
    },
    #[command(
        about = "Replace all tracked data with the contents of a report file. This is a full overwrite, not a merge"
    )]
    Import {
        #[arg(help = "Report file produced by export")]
        file: PathBuf,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = create_application_default_path()?;
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(&dir, logging_level, args.log)?;

    let storage = JsonStateFile::new(&dir);

    match args.commands {
        Commands::Person { name } => person_command(storage, name).await,
        Commands::Track { person } => track_command(storage, person).await,
        Commands::Status { person, date } => status_command(storage, person, date).await,
        Commands::Add { start, end, person } => add_command(storage, person, start, end).await,
        Commands::Delete {
            date,
            number,
            person,
        } => delete_command(storage, person, date, number).await,
        Commands::Export { output, person } => export_command(storage, person, output).await,
        Commands::Import { file } => import_command(storage, file).await,
    }
}

/// Resolves the person a command acts on: an explicit `--person` wins,
/// otherwise the persisted selection.
fn resolve_person(store: &TimeTrackerStore, explicit: Option<String>) -> Result<String> {
    match explicit.or_else(|| store.current_person.clone()) {
        Some(person) => Ok(person),
        None => bail!("No person selected. Run `punchclock person <name>` first."),
    }
}

/// Date arguments accept human phrasing like "yesterday" as well as plain
/// ISO dates.
fn parse_date_arg(input: &str) -> Result<NaiveDate> {
    match parse_date_string(input, Local::now(), Dialect::Uk) {
        Ok(parsed) => Ok(parsed.date_naive()),
        Err(e) => bail!("Can't parse {input:?} as a date: {e}"),
    }
}

async fn person_command(storage: impl StateStorage, name: Option<String>) -> Result<()> {
    let mut store = storage.load().await?;
    match name {
        Some(name) => {
            store.current_person = Some(name.clone());
            storage.save(&store).await?;
            println!("Now tracking for: {name}");
        }
        None => match &store.current_person {
            Some(person) => println!("Tracking for: {person}"),
            None => println!("No person selected."),
        },
    }
    Ok(())
}

async fn track_command(storage: impl StateStorage, person: Option<String>) -> Result<()> {
    let store = storage.load().await?;
    let person = resolve_person(&store, person)?;
    let mut tracker = Tracker::new(store, storage, person);

    track::run_timer_loop(&mut tracker, &DefaultClock, track::shutdown_token()).await
}

async fn status_command(
    storage: impl StateStorage,
    person: Option<String>,
    date: Option<String>,
) -> Result<()> {
    let store = storage.load().await?;
    let person = resolve_person(&store, person)?;
    let date = date.as_deref().map(parse_date_arg).transpose()?;

    output::print_status(&store, &person, date);
    Ok(())
}

async fn add_command(
    storage: impl StateStorage,
    person: Option<String>,
    start: String,
    end: String,
) -> Result<()> {
    let store = storage.load().await?;
    let person = resolve_person(&store, person)?;
    let mut tracker = Tracker::new(store, storage, person.clone());

    let added = tracker.add_manual_time(&start, &end, Utc::now()).await?;
    println!(
        "Added {} to today's total for {person}.",
        format_duration(added.num_milliseconds())
    );
    println!("Note: manual time has no session record and is lost on export/import.");
    Ok(())
}

async fn delete_command(
    storage: impl StateStorage,
    person: Option<String>,
    date: String,
    number: usize,
) -> Result<()> {
    let store = storage.load().await?;
    let person = resolve_person(&store, person)?;
    let date = parse_date_arg(&date)?;
    let mut tracker = Tracker::new(store, storage, person.clone());

    let removed = tracker.delete_session(date, number).await?;
    println!(
        "Deleted session {number} on {date} ({}).",
        format_duration(removed.duration_ms())
    );
    Ok(())
}

async fn export_command(
    storage: impl StateStorage,
    person: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let store = storage.load().await?;
    let person = resolve_person(&store, person)?;

    let report = report::encode_report(
        &person,
        store.totals_for(&person),
        store.sessions_for(&person),
    );
    let path = output.unwrap_or_else(|| PathBuf::from(format!("{person}_time_tracking.txt")));
    tokio::fs::write(&path, report)
        .await
        .with_context(|| format!("Can't write report to {path:?}"))?;

    println!("Wrote report for {person} to {}.", path.display());
    Ok(())
}

async fn import_command(storage: impl StateStorage, file: PathBuf) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Can't read report file {file:?}"))?;
    // Parse everything up front: a bad file must leave the stored data
    // untouched.
    let parsed = report::parse_report(&content)?;

    let mut store = storage.load().await?;
    let person = parsed.person.clone();
    store.replace_data(parsed.person, parsed.tracked_times, parsed.session_details);
    storage.save(&store).await?;

    println!("Imported tracking data for {person}.");
    Ok(())
}
