//! Roster CLI smoke entry point.
//!
//! # Responsibility
//! - Open (or create) a roster store and seed it once when empty.
//! - Print one page of members as JSON for quick local checks.

use clap::Parser;
use log::info;
use roster_core::{
    default_log_level, init_logging, Database, Direction, LogDestination, MemberField,
    PageRequest, PersistenceConfig, RosterService, Sort,
};
use std::path::PathBuf;
use std::process::ExitCode;

const SEED_TEAM: &str = "Team_Page";
const SEED_MEMBER_PREFIX: &str = "Page_Anakin_";

#[derive(Parser)]
#[command(name = "roster")]
#[command(version)]
#[command(about = "Seed a roster store and print a page of members as JSON")]
struct Cli {
    /// SQLite database file; an in-memory store is used when omitted
    #[arg(long)]
    db: Option<PathBuf>,

    /// JSON file with persistence settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Zero-based page index
    #[arg(long, default_value_t = 0)]
    page: u32,

    /// Page size; the configured default applies when omitted
    #[arg(long)]
    size: Option<u32>,

    /// Sort keys as `field[,asc|desc]`, e.g. `username,desc`
    #[arg(long)]
    sort: Vec<String>,

    /// Members created when the store is empty
    #[arg(long, default_value_t = 100)]
    seed: u32,

    /// trace|debug|info|warn|error
    #[arg(long)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; logs go to stderr otherwise
    #[arg(long)]
    log_dir: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] roster_core::ConfigError),

    #[error(transparent)]
    Logging(#[from] roster_core::LoggingError),

    #[error(transparent)]
    Persistence(#[from] roster_core::PersistenceError),

    #[error(transparent)]
    Validation(#[from] roster_core::ValidationError),

    #[error("invalid sort direction `{0}`; expected asc|desc")]
    SortDirection(String),

    #[error("cannot render page: {0}")]
    Render(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("roster: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let destination = match cli.log_dir.as_deref() {
        Some(dir) => LogDestination::directory(dir)?,
        None => LogDestination::Stderr,
    };
    init_logging(level, destination)?;

    let config = match cli.config.as_ref() {
        Some(path) => PersistenceConfig::load(path)?,
        None => PersistenceConfig::default(),
    };
    let sort = parse_sort(&cli.sort)?;
    let db = match cli.db.as_ref() {
        Some(path) => Database::open(path, config)?,
        None => Database::open_in_memory(config)?,
    };

    let service = RosterService::new(&db);
    if service.is_empty()? {
        service.seed_team(SEED_TEAM, SEED_MEMBER_PREFIX, cli.seed)?;
    }

    let request = PageRequest {
        page: cli.page,
        size: cli.size,
    };
    let page = service.list_members(request, sort)?;
    info!(
        "event=cli_list module=cli status=ok page={} returned={} total={}",
        page.number(),
        page.number_of_elements(),
        page.total_elements()
    );
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

fn parse_sort(keys: &[String]) -> Result<Sort<MemberField>, CliError> {
    let mut sort = Sort::unsorted();
    for key in keys {
        let (name, direction) = match key.split_once(',') {
            Some((name, direction)) => (
                name,
                Direction::parse(direction.trim())
                    .ok_or_else(|| CliError::SortDirection(direction.to_string()))?,
            ),
            None => (key.as_str(), Direction::Asc),
        };
        sort = sort.then(MemberField::from_name(name.trim())?, direction);
    }
    Ok(sort)
}

#[cfg(test)]
mod tests {
    use super::{parse_sort, CliError};
    use roster_core::{Direction, MemberField};

    #[test]
    fn sort_keys_parse_with_optional_direction() {
        let sort = parse_sort(&["username,desc".to_string(), "age".to_string()]).unwrap();
        let orders = sort.orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].field, MemberField::Username);
        assert_eq!(orders[0].direction, Direction::Desc);
        assert_eq!(orders[1].field, MemberField::Age);
        assert_eq!(orders[1].direction, Direction::Asc);
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        assert!(matches!(
            parse_sort(&["nickname".to_string()]),
            Err(CliError::Validation(_))
        ));
        assert!(matches!(
            parse_sort(&["age,sideways".to_string()]),
            Err(CliError::SortDirection(_))
        ));
    }
}
