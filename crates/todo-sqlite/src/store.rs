use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, warn};

use todo_store::{
    ItemQuery, Page, PageRequest, Pagination, StoreError, StoreResult, TodoStore,
};
use todo_types::{
    completion_after, normalize, Clock, ItemId, ItemPatch, ListId, ListPatch, NewItem, NewList,
    SystemClock, TodoItem, TodoList, UserId,
};

use crate::config::SqliteConfig;
use crate::error::{internal, list_write};
use crate::rows::{item_from_row, list_from_row, micros, order_by, ITEM_SELECT, LIST_SELECT};
use crate::schema;

/// SQLite implementation of [`TodoStore`].
///
/// One connection behind a `Mutex`. Every operation runs inside a
/// transaction; writers take an `IMMEDIATE` transaction so that a name
/// check and the write that follows hold the database write lock together,
/// including against other processes sharing the file.
pub struct SqliteTodoStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteTodoStore {
    /// Open (or create) a store as described by `config`, on the wall clock.
    pub fn open(config: &SqliteConfig) -> StoreResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(&SqliteConfig::in_memory())
    }

    pub fn open_with_clock(config: &SqliteConfig, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let mut conn = match &config.path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(internal("open database"))?;

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(internal("set busy timeout"))?;
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(internal("enable foreign keys"))?;
        if config.path.is_some() {
            let mode: String = conn
                .pragma_update_and_check(
                    None,
                    "journal_mode",
                    config.journal_mode.pragma_value(),
                    |row| row.get(0),
                )
                .map_err(internal("set journal mode"))?;
            debug!(journal_mode = %mode, "sqlite journal mode");
        }
        schema::initialize(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    /// Record a caller identity so lists can reference it. Idempotent.
    ///
    /// This stands in for the authentication layer, which owns the `users`
    /// table; it is not part of [`TodoStore`].
    pub fn register_user(&self, user: &UserId) -> StoreResult<()> {
        let now = self.clock.now();
        self.write(|tx| {
            tx.execute(
                "INSERT INTO users (id, created_at) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING",
                params![user.to_string(), micros(now)],
            )
            .map_err(internal("register user"))?;
            Ok(())
        })
    }

    /// Physically remove a caller identity together with all of its lists
    /// and items. Returns `false` if the identity was unknown.
    pub fn remove_user(&self, user: &UserId) -> StoreResult<bool> {
        self.write(|tx| {
            let removed = tx
                .execute("DELETE FROM users WHERE id = ?1", params![user.to_string()])
                .map_err(internal("remove user"))?;
            if removed > 0 {
                debug!(user = %user, "user removed");
            }
            Ok(removed > 0)
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Internal("connection lock poisoned".into()))
    }

    /// Run `f` in a deferred transaction that is rolled back afterwards.
    fn read<T>(&self, f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>) -> StoreResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(internal("begin read"))?;
        f(&tx)
    }

    /// Run `f` in an immediate transaction, committing on success.
    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>) -> StoreResult<T> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(internal("begin write"))?;
        let out = f(&tx)?;
        tx.commit().map_err(internal("commit"))?;
        Ok(out)
    }
}

impl std::fmt::Debug for SqliteTodoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTodoStore")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Queries shared by several operations
// ---------------------------------------------------------------------------

/// Fail with `NotFound` unless `list_id` is a live list owned by `caller`.
fn ensure_owned(conn: &Connection, caller: &UserId, list_id: &ListId) -> StoreResult<()> {
    let found = conn
        .query_row(
            "SELECT 1 FROM lists WHERE id = ?1 AND owner_id = ?2 AND deleted_at IS NULL",
            params![list_id.to_string(), caller.to_string()],
            |_| Ok(()),
        )
        .optional()
        .map_err(internal("check list ownership"))?;
    found.ok_or_else(|| StoreError::list_not_found(list_id))
}

fn load_list(conn: &Connection, caller: &UserId, list_id: &ListId) -> StoreResult<TodoList> {
    conn.query_row(
        &format!("{LIST_SELECT} WHERE l.id = ?1 AND l.owner_id = ?2 AND l.deleted_at IS NULL"),
        params![list_id.to_string(), caller.to_string()],
        list_from_row,
    )
    .optional()
    .map_err(internal("load list"))?
    .ok_or_else(|| StoreError::list_not_found(list_id))
}

fn load_item(conn: &Connection, list_id: &ListId, item_id: &ItemId) -> StoreResult<TodoItem> {
    conn.query_row(
        &format!("{ITEM_SELECT} WHERE id = ?1 AND list_id = ?2 AND deleted_at IS NULL"),
        params![item_id.to_string(), list_id.to_string()],
        item_from_row,
    )
    .optional()
    .map_err(internal("load item"))?
    .ok_or_else(|| StoreError::item_not_found(item_id))
}

fn name_taken(
    conn: &Connection,
    owner: &UserId,
    name: &str,
    except: Option<&ListId>,
) -> StoreResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM lists WHERE owner_id = ?1 AND name = ?2 \
         AND deleted_at IS NULL AND (?3 IS NULL OR id <> ?3))",
        params![owner.to_string(), name, except.map(|id| id.to_string())],
        |row| row.get(0),
    )
    .map_err(internal("check list name"))
}

fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl TodoStore for SqliteTodoStore {
    fn create_list(&self, caller: &UserId, list: NewList) -> StoreResult<TodoList> {
        let now = self.clock.now();
        self.write(|tx| {
            if name_taken(tx, caller, &list.name, None)? {
                warn!(owner = %caller, name = %list.name, "list name already in use");
                return Err(StoreError::NameConflict { name: list.name });
            }
            let id = ListId::new();
            tx.execute(
                "INSERT INTO lists (id, owner_id, name, description, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    id.to_string(),
                    caller.to_string(),
                    list.name,
                    list.description,
                    micros(now)
                ],
            )
            .map_err(list_write("insert list", &list.name))?;
            debug!(list = %id, owner = %caller, "list created");
            Ok(TodoList {
                id,
                owner_id: *caller,
                name: list.name,
                description: list.description,
                created_at: now,
                updated_at: now,
                item_count: 0,
            })
        })
    }

    fn list_lists(&self, caller: &UserId, request: PageRequest) -> StoreResult<Page<TodoList>> {
        self.read(|tx| {
            let total: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM lists WHERE owner_id = ?1 AND deleted_at IS NULL",
                    params![caller.to_string()],
                    |row| row.get(0),
                )
                .map_err(internal("count lists"))?;
            let pagination = Pagination::compute(request, total.max(0) as u64);

            let mut stmt = tx
                .prepare_cached(&format!(
                    "{LIST_SELECT} WHERE l.owner_id = ?1 AND l.deleted_at IS NULL \
                     ORDER BY l.created_at DESC, l.seq DESC LIMIT ?2 OFFSET ?3"
                ))
                .map_err(internal("prepare list page"))?;
            let items = stmt
                .query_map(
                    params![
                        caller.to_string(),
                        to_sql_count(pagination.limit),
                        to_sql_count(pagination.offset())
                    ],
                    list_from_row,
                )
                .map_err(internal("query list page"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(internal("decode list page"))?;
            Ok(Page { items, pagination })
        })
    }

    fn get_list(&self, caller: &UserId, list_id: &ListId) -> StoreResult<TodoList> {
        self.read(|tx| load_list(tx, caller, list_id))
    }

    fn update_list(
        &self,
        caller: &UserId,
        list_id: &ListId,
        patch: ListPatch,
    ) -> StoreResult<TodoList> {
        let now = self.clock.now();
        self.write(|tx| {
            ensure_owned(tx, caller, list_id)?;
            if patch.is_empty() {
                return load_list(tx, caller, list_id);
            }
            if let Some(name) = &patch.name {
                if name_taken(tx, caller, name, Some(list_id))? {
                    warn!(owner = %caller, name = %name, "list name already in use");
                    return Err(StoreError::NameConflict { name: name.clone() });
                }
            }
            let conflict_name = patch.name.as_deref().unwrap_or_default();
            tx.execute(
                "UPDATE lists SET name = COALESCE(?1, name), \
                 description = COALESCE(?2, description), updated_at = ?3 WHERE id = ?4",
                params![patch.name, patch.description, micros(now), list_id.to_string()],
            )
            .map_err(list_write("update list", conflict_name))?;
            debug!(list = %list_id, "list updated");
            load_list(tx, caller, list_id)
        })
    }

    fn delete_list(&self, caller: &UserId, list_id: &ListId) -> StoreResult<()> {
        let now = self.clock.now();
        self.write(|tx| {
            ensure_owned(tx, caller, list_id)?;
            tx.execute(
                "UPDATE lists SET deleted_at = ?1 WHERE id = ?2",
                params![micros(now), list_id.to_string()],
            )
            .map_err(internal("delete list"))?;
            let cascaded = tx
                .execute(
                    "UPDATE items SET deleted_at = ?1 WHERE list_id = ?2 AND deleted_at IS NULL",
                    params![micros(now), list_id.to_string()],
                )
                .map_err(internal("delete list items"))?;
            debug!(list = %list_id, items = cascaded, "list deleted");
            Ok(())
        })
    }

    fn create_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item: NewItem,
    ) -> StoreResult<TodoItem> {
        let now = self.clock.now();
        self.write(|tx| {
            ensure_owned(tx, caller, list_id)?;
            let created = TodoItem {
                id: ItemId::new(),
                list_id: *list_id,
                description: item.description,
                priority: item.priority,
                due_date: item.due_date.map(normalize),
                completed: false,
                completed_at: None,
                created_at: now,
                updated_at: now,
            };
            tx.execute(
                "INSERT INTO items (id, list_id, description, priority, due_date, completed, \
                 completed_at, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, ?6, ?6)",
                params![
                    created.id.to_string(),
                    list_id.to_string(),
                    created.description,
                    created.priority.rank(),
                    created.due_date.map(micros),
                    micros(now)
                ],
            )
            .map_err(internal("insert item"))?;
            debug!(item = %created.id, list = %list_id, "item created");
            Ok(created)
        })
    }

    fn list_items(
        &self,
        caller: &UserId,
        list_id: &ListId,
        query: &ItemQuery,
    ) -> StoreResult<Vec<TodoItem>> {
        self.read(|tx| {
            ensure_owned(tx, caller, list_id)?;
            let order = query.resolve()?;
            let mut stmt = tx
                .prepare_cached(&format!(
                    "{ITEM_SELECT} WHERE list_id = ?1 AND deleted_at IS NULL \
                     AND (?2 IS NULL OR priority = ?2) \
                     AND (?3 IS NULL OR completed = ?3) \
                     ORDER BY {}",
                    order_by(order)
                ))
                .map_err(internal("prepare item listing"))?;
            let items = stmt
                .query_map(
                    params![
                        list_id.to_string(),
                        query.priority.map(|p| p.rank()),
                        query.completed
                    ],
                    item_from_row,
                )
                .map_err(internal("query items"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(internal("decode items"))?;
            Ok(items)
        })
    }

    fn get_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item_id: &ItemId,
    ) -> StoreResult<TodoItem> {
        self.read(|tx| {
            ensure_owned(tx, caller, list_id)?;
            load_item(tx, list_id, item_id)
        })
    }

    fn update_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item_id: &ItemId,
        patch: ItemPatch,
    ) -> StoreResult<TodoItem> {
        let now = self.clock.now();
        self.write(|tx| {
            ensure_owned(tx, caller, list_id)?;
            let mut item = load_item(tx, list_id, item_id)?;
            if patch.is_empty() {
                return Ok(item);
            }

            if let Some(description) = patch.description {
                item.description = description;
            }
            if let Some(priority) = patch.priority {
                item.priority = priority;
            }
            if let Some(due) = patch.due_date {
                item.due_date = due.map(normalize);
            }
            if let Some(done) = patch.completed {
                item.completed_at = completion_after(item.completed, item.completed_at, done, now);
                item.completed = done;
            }
            item.updated_at = now;

            tx.execute(
                "UPDATE items SET description = ?1, priority = ?2, due_date = ?3, \
                 completed = ?4, completed_at = ?5, updated_at = ?6 WHERE id = ?7",
                params![
                    item.description,
                    item.priority.rank(),
                    item.due_date.map(micros),
                    item.completed,
                    item.completed_at.map(micros),
                    micros(now),
                    item_id.to_string()
                ],
            )
            .map_err(internal("update item"))?;
            debug!(item = %item_id, list = %list_id, "item updated");
            Ok(item)
        })
    }

    fn delete_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item_id: &ItemId,
    ) -> StoreResult<()> {
        let now = self.clock.now();
        self.write(|tx| {
            ensure_owned(tx, caller, list_id)?;
            let deleted = tx
                .execute(
                    "UPDATE items SET deleted_at = ?1 \
                     WHERE id = ?2 AND list_id = ?3 AND deleted_at IS NULL",
                    params![micros(now), item_id.to_string(), list_id.to_string()],
                )
                .map_err(internal("delete item"))?;
            if deleted == 0 {
                return Err(StoreError::item_not_found(item_id));
            }
            debug!(item = %item_id, list = %list_id, "item deleted");
            Ok(())
        })
    }
}
