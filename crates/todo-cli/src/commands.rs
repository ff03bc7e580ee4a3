use std::io::Write;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use todo_sqlite::SqliteTodoStore;
use todo_store::{InMemoryTodoStore, ItemQuery, Page, PageRequest, TodoStore};
use todo_types::{ItemPatch, ListPatch, NewItem, NewList, TodoItem, TodoList, UserId};

use crate::cli::*;
use crate::config::{Backend, CliConfig};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?.with_overrides(cli.db, cli.memory);
    let store = Store::open(&config)?;
    let session = Session {
        store,
        user: cli.user,
        format: cli.format,
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    session.dispatch(cli.command, &mut out)
}

/// The backend selected by configuration.
enum Store {
    Memory(InMemoryTodoStore),
    Sqlite(SqliteTodoStore),
}

impl Store {
    fn open(config: &CliConfig) -> anyhow::Result<Self> {
        match config.backend {
            Backend::Memory => Ok(Self::Memory(InMemoryTodoStore::new())),
            Backend::Sqlite => {
                let store = SqliteTodoStore::open(&config.sqlite).with_context(|| {
                    match &config.sqlite.path {
                        Some(path) => format!("opening {}", path.display()),
                        None => "opening in-memory database".to_string(),
                    }
                })?;
                Ok(Self::Sqlite(store))
            }
        }
    }

    fn todo(&self) -> &dyn TodoStore {
        match self {
            Self::Memory(store) => store,
            Self::Sqlite(store) => store,
        }
    }
}

struct Session {
    store: Store,
    user: Option<UserId>,
    format: OutputFormat,
}

impl Session {
    fn dispatch(&self, command: Command, out: &mut dyn Write) -> anyhow::Result<()> {
        match command {
            Command::User(cmd) => self.cmd_user(cmd, out),
            Command::List(cmd) => self.cmd_list(cmd, out),
            Command::Item(cmd) => self.cmd_item(cmd, out),
        }
    }

    fn caller(&self) -> anyhow::Result<UserId> {
        self.user.context("--user is required for list and item commands")
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn cmd_user(&self, cmd: UserCommand, out: &mut dyn Write) -> anyhow::Result<()> {
        match cmd {
            UserCommand::Add => {
                let user = UserId::new();
                if let Store::Sqlite(store) = &self.store {
                    store.register_user(&user)?;
                }
                debug!(user = %user, "user registered");
                if self.json() {
                    writeln!(out, "{}", json!({ "id": user }))?;
                } else {
                    writeln!(
                        out,
                        "{} Registered user {}",
                        "✓".green().bold(),
                        user.to_string().cyan()
                    )?;
                }
            }
            UserCommand::Rm { id } => {
                let removed = match &self.store {
                    Store::Sqlite(store) => store.remove_user(&id)?,
                    Store::Memory(_) => false,
                };
                if !removed {
                    anyhow::bail!("unknown user {id}");
                }
                if self.json() {
                    writeln!(out, "{}", json!({ "removed": id }))?;
                } else {
                    writeln!(out, "{} Removed user {}", "✓".green(), id)?;
                }
            }
        }
        Ok(())
    }

    fn cmd_list(&self, cmd: ListCommand, out: &mut dyn Write) -> anyhow::Result<()> {
        let caller = self.caller()?;
        let store = self.store.todo();
        match cmd {
            ListCommand::Create { name, description } => {
                let new = NewList::new(name).with_description(description);
                let list = store.create_list(&caller, new)?;
                self.show_list(&list, out)
            }
            ListCommand::Ls(args) => {
                let page = store.list_lists(&caller, PageRequest::new(args.page, args.limit))?;
                self.show_page(&page, out)
            }
            ListCommand::Show { id } => {
                let list = store.get_list(&caller, &id)?;
                self.show_list(&list, out)
            }
            ListCommand::Update { id, name, description } => {
                let list = store.update_list(&caller, &id, ListPatch { name, description })?;
                self.show_list(&list, out)
            }
            ListCommand::Rm { id } => {
                store.delete_list(&caller, &id)?;
                self.deleted("list", &id.to_string(), out)
            }
        }
    }

    fn cmd_item(&self, cmd: ItemCommand, out: &mut dyn Write) -> anyhow::Result<()> {
        let caller = self.caller()?;
        let store = self.store.todo();
        match cmd {
            ItemCommand::Add { list, description, priority, due } => {
                let mut new = NewItem::new(description, priority);
                if let Some(due) = due {
                    new = new.due(due);
                }
                let item = store.create_item(&caller, &list, new)?;
                self.show_item(&item, out)
            }
            ItemCommand::Ls(args) => {
                let items = store.list_items(&caller, &args.list, &item_query(&args))?;
                self.show_items(&items, out)
            }
            ItemCommand::Show { list, item } => {
                let item = store.get_item(&caller, &list, &item)?;
                self.show_item(&item, out)
            }
            ItemCommand::Update(args) => {
                let patch = item_patch(&args);
                let item = store.update_item(&caller, &args.list, &args.item, patch)?;
                self.show_item(&item, out)
            }
            ItemCommand::Rm { list, item } => {
                store.delete_item(&caller, &list, &item)?;
                self.deleted("item", &item.to_string(), out)
            }
        }
    }

    fn show_list(&self, list: &TodoList, out: &mut dyn Write) -> anyhow::Result<()> {
        if self.json() {
            return write_json(list, out);
        }
        writeln!(out, "{}  {}", list.id.to_string().yellow(), list.name.bold())?;
        if !list.description.is_empty() {
            writeln!(out, "  {}", list.description)?;
        }
        writeln!(out, "  items: {}  updated: {}", list.item_count, list.updated_at.to_rfc3339())?;
        Ok(())
    }

    fn show_page(&self, page: &Page<TodoList>, out: &mut dyn Write) -> anyhow::Result<()> {
        let p = page.pagination;
        if self.json() {
            let body = json!({
                "items": page.items,
                "pagination": {
                    "page": p.page,
                    "limit": p.limit,
                    "total_items": p.total_items,
                    "total_pages": p.total_pages,
                },
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
            return Ok(());
        }
        for list in &page.items {
            writeln!(
                out,
                "{}  {} ({} items)",
                list.id.to_string().yellow(),
                list.name.bold(),
                list.item_count
            )?;
        }
        writeln!(
            out,
            "{}",
            format!("page {}/{}, {} lists", p.page, p.total_pages, p.total_items).dimmed()
        )?;
        Ok(())
    }

    fn show_item(&self, item: &TodoItem, out: &mut dyn Write) -> anyhow::Result<()> {
        if self.json() {
            return write_json(item, out);
        }
        writeln!(out, "{}", item_line(item))?;
        Ok(())
    }

    fn show_items(&self, items: &[TodoItem], out: &mut dyn Write) -> anyhow::Result<()> {
        if self.json() {
            return write_json(&items, out);
        }
        if items.is_empty() {
            writeln!(out, "No items.")?;
        }
        for item in items {
            writeln!(out, "{}", item_line(item))?;
        }
        Ok(())
    }

    fn deleted(&self, what: &str, id: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        if self.json() {
            writeln!(out, "{}", json!({ "deleted": id }))?;
        } else {
            writeln!(out, "{} Deleted {} {}", "✓".green(), what, id)?;
        }
        Ok(())
    }
}

fn item_query(args: &ItemListArgs) -> ItemQuery {
    let mut query = ItemQuery::new();
    if let Some(priority) = args.priority {
        query = query.priority(priority);
    }
    if let Some(completed) = args.completed {
        query = query.completed(completed);
    }
    if let Some(key) = &args.sort {
        query = query.sort_by(key.as_str());
    }
    if let Some(direction) = &args.order {
        query = query.order(direction.as_str());
    }
    query
}

fn item_patch(args: &ItemUpdateArgs) -> ItemPatch {
    let due_date = if args.clear_due {
        Some(None)
    } else {
        args.due.map(Some)
    };
    let completed = match (args.done, args.undone) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    ItemPatch {
        description: args.description.clone(),
        priority: args.priority,
        due_date,
        completed,
    }
}

fn item_line(item: &TodoItem) -> String {
    let mark = if item.completed { "[x]".green() } else { "[ ]".normal() };
    let priority = match item.priority.as_str() {
        "high" => "high".red().bold(),
        "low" => "low".dimmed(),
        other => other.normal(),
    };
    let due = item
        .due_date
        .map(|d| format!("  due {}", d.to_rfc3339()))
        .unwrap_or_default();
    format!(
        "{} {} {} {}{}",
        mark,
        item.id.short_id().yellow(),
        priority,
        item.description,
        due
    )
}

fn write_json<T: Serialize + ?Sized>(value: &T, out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::Value;
    use todo_sqlite::SqliteConfig;
    use todo_types::Priority;

    fn session(store: Store, user: Option<UserId>) -> Session {
        Session {
            store,
            user,
            format: OutputFormat::Json,
        }
    }

    fn run(session: &Session, args: &[&str]) -> anyhow::Result<Value> {
        let cli = Cli::try_parse_from(std::iter::once("todo").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        session.dispatch(cli.command, &mut out)?;
        Ok(serde_json::from_slice(&out)?)
    }

    fn sqlite_session() -> (Session, UserId) {
        let store = Store::open(&CliConfig {
            backend: Backend::Sqlite,
            sqlite: SqliteConfig::in_memory(),
        })
        .unwrap();
        let mut s = session(store, None);
        let created = run(&s, &["user", "add"]).unwrap();
        let user: UserId = created["id"].as_str().unwrap().parse().unwrap();
        s.user = Some(user);
        (s, user)
    }

    #[test]
    fn list_and_item_workflow() {
        let (s, _) = sqlite_session();
        let list = run(&s, &["list", "create", "Groceries", "-d", "weekly"]).unwrap();
        assert_eq!(list["name"], "Groceries");
        assert_eq!(list["item_count"], 0);
        let list_id = list["id"].as_str().unwrap().to_string();

        run(&s, &["item", "add", &list_id, "milk", "--priority", "high"]).unwrap();
        let eggs = run(&s, &["item", "add", &list_id, "eggs", "-p", "low"]).unwrap();
        let eggs_id = eggs["id"].as_str().unwrap().to_string();

        let done = run(&s, &["item", "update", &list_id, &eggs_id, "--done"]).unwrap();
        assert_eq!(done["completed"], true);
        assert!(done["completed_at"].is_string());

        let open = run(&s, &["item", "ls", &list_id, "--completed", "false"]).unwrap();
        assert_eq!(open.as_array().unwrap().len(), 1);
        assert_eq!(open[0]["description"], "milk");

        let by_priority = run(&s, &["item", "ls", &list_id, "--sort", "priority"]).unwrap();
        assert_eq!(by_priority[0]["priority"], "high");

        let shown = run(&s, &["list", "show", &list_id]).unwrap();
        assert_eq!(shown["item_count"], 2);

        run(&s, &["list", "rm", &list_id]).unwrap();
        assert!(run(&s, &["list", "show", &list_id]).is_err());
    }

    #[test]
    fn list_paging_reports_pagination() {
        let (s, _) = sqlite_session();
        for name in ["a", "b", "c"] {
            run(&s, &["list", "create", name]).unwrap();
        }
        let page = run(&s, &["list", "ls", "--page", "9", "--limit", "2"]).unwrap();
        assert_eq!(page["pagination"]["page"], 2);
        assert_eq!(page["pagination"]["total_pages"], 2);
        assert_eq!(page["pagination"]["total_items"], 3);
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn invalid_sort_is_reported() {
        let (s, _) = sqlite_session();
        let list = run(&s, &["list", "create", "x"]).unwrap();
        let id = list["id"].as_str().unwrap().to_string();
        let err = run(&s, &["item", "ls", &id, "--sort", "name"]).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn duplicate_list_name_fails() {
        let (s, _) = sqlite_session();
        run(&s, &["list", "create", "Work"]).unwrap();
        assert!(run(&s, &["list", "create", "Work"]).is_err());
    }

    #[test]
    fn user_is_required() {
        let s = session(Store::Memory(InMemoryTodoStore::new()), None);
        let err = run(&s, &["list", "ls"]).unwrap_err();
        assert!(err.to_string().contains("--user"));
    }

    #[test]
    fn memory_backend_needs_no_registration() {
        let s = session(Store::Memory(InMemoryTodoStore::new()), Some(UserId::new()));
        let list = run(&s, &["list", "create", "Inbox"]).unwrap();
        assert_eq!(list["name"], "Inbox");
    }

    #[test]
    fn removing_unknown_user_fails() {
        let (s, _) = sqlite_session();
        let stranger = UserId::new().to_string();
        assert!(run(&s, &["user", "rm", &stranger]).is_err());
    }

    #[test]
    fn update_args_become_a_patch() {
        let (list, item) = (todo_types::ListId::new(), todo_types::ItemId::new());
        let cli = Cli::try_parse_from([
            "todo",
            "item",
            "update",
            &list.to_string(),
            &item.to_string(),
            "--clear-due",
            "--undone",
            "-p",
            "high",
        ])
        .unwrap();
        let Command::Item(ItemCommand::Update(args)) = cli.command else {
            panic!("expected item update");
        };
        let patch = item_patch(&args);
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.completed, Some(false));
        assert_eq!(patch.priority, Some(Priority::High));
        assert_eq!(patch.description, None);
    }

    #[test]
    fn text_output_mentions_the_list() {
        let user = UserId::new();
        let s = Session {
            store: Store::Memory(InMemoryTodoStore::new()),
            user: Some(user),
            format: OutputFormat::Text,
        };
        let cli = Cli::try_parse_from(["todo", "list", "create", "Errands"]).unwrap();
        let mut out = Vec::new();
        s.dispatch(cli.command, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Errands"));
    }
}
