use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use todo_types::{ItemId, ListId, Priority, UserId};

#[derive(Parser)]
#[command(name = "todo", about = "Task lists backed by SQLite or memory", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides the configured backend)
    #[arg(long, global = true, conflicts_with = "memory")]
    pub db: Option<PathBuf>,

    /// Use a throwaway in-memory store
    #[arg(long, global = true)]
    pub memory: bool,

    /// Caller identity all list and item commands act as
    #[arg(short, long, global = true)]
    pub user: Option<UserId>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register or remove caller identities
    #[command(subcommand)]
    User(UserCommand),
    /// Create, show, rename, or delete lists
    #[command(subcommand)]
    List(ListCommand),
    /// Add, show, update, or delete items in a list
    #[command(subcommand)]
    Item(ItemCommand),
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a new caller identity and print it
    Add,
    /// Remove a caller identity with all of its lists
    Rm { id: UserId },
}

#[derive(Subcommand)]
pub enum ListCommand {
    /// Create a list
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Show a page of lists, newest first
    Ls(PageArgs),
    /// Show one list
    Show { id: ListId },
    /// Rename or re-describe a list
    Update {
        id: ListId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a list and all of its items
    Rm { id: ListId },
}

#[derive(Args)]
pub struct PageArgs {
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub page: u64,
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..=100))]
    pub limit: u64,
}

#[derive(Subcommand)]
pub enum ItemCommand {
    /// Add an item to a list
    Add {
        list: ListId,
        description: String,
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        /// Due date (RFC 3339)
        #[arg(long, value_parser = parse_due)]
        due: Option<DateTime<Utc>>,
    },
    /// Show the items of a list
    Ls(ItemListArgs),
    /// Show one item
    Show { list: ListId, item: ItemId },
    /// Change an item
    Update(ItemUpdateArgs),
    /// Delete an item
    Rm { list: ListId, item: ItemId },
}

#[derive(Args)]
pub struct ItemListArgs {
    pub list: ListId,
    #[arg(short, long)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub completed: Option<bool>,
    /// created_at, due_date, or priority
    #[arg(long)]
    pub sort: Option<String>,
    /// asc or desc
    #[arg(long)]
    pub order: Option<String>,
}

#[derive(Args)]
pub struct ItemUpdateArgs {
    pub list: ListId,
    pub item: ItemId,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(short, long)]
    pub priority: Option<Priority>,
    #[arg(long, value_parser = parse_due, conflicts_with = "clear_due")]
    pub due: Option<DateTime<Utc>>,
    #[arg(long)]
    pub clear_due: bool,
    #[arg(long, conflicts_with = "undone")]
    pub done: bool,
    #[arg(long)]
    pub undone: bool,
}

fn parse_due(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_item_listing() {
        let list = ListId::new();
        let cli = Cli::try_parse_from([
            "todo",
            "item",
            "ls",
            &list.to_string(),
            "--priority",
            "high",
            "--sort",
            "due_date",
            "--order",
            "desc",
        ])
        .unwrap();
        match cli.command {
            Command::Item(ItemCommand::Ls(args)) => {
                assert_eq!(args.list, list);
                assert_eq!(args.priority, Some(Priority::High));
                assert_eq!(args.sort.as_deref(), Some("due_date"));
                assert_eq!(args.order.as_deref(), Some("desc"));
            }
            _ => panic!("expected item ls"),
        }
    }

    #[test]
    fn limit_is_bounded() {
        let err = Cli::try_parse_from(["todo", "list", "ls", "--limit", "101"]);
        assert!(err.is_err());
        let err = Cli::try_parse_from(["todo", "list", "ls", "--limit", "0"]);
        assert!(err.is_err());
    }

    #[test]
    fn done_and_undone_conflict() {
        let (list, item) = (ListId::new().to_string(), ItemId::new().to_string());
        let err = Cli::try_parse_from([
            "todo", "item", "update", &list, &item, "--done", "--undone",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn due_must_be_rfc3339() {
        assert!(parse_due("2026-10-16T09:00:00+02:00").is_ok());
        assert!(parse_due("tomorrow").is_err());
    }

    #[test]
    fn db_and_memory_conflict() {
        let err = Cli::try_parse_from(["todo", "--memory", "--db", "x.db", "user", "add"]);
        assert!(err.is_err());
    }
}
