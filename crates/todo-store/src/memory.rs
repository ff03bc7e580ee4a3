//! In-memory task-list store for tests and lightweight deployments.
//!
//! [`InMemoryTodoStore`] keeps lists and items in two `HashMap`s behind a
//! single `RwLock`. Reads share the lock; every mutation holds the write lock
//! for its whole duration, so a name check and the insert that follows it
//! cannot interleave with another writer, and a list's item cascade is never
//! seen half-applied. Deleted records stay behind as tombstones.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use todo_types::{
    completion_after, normalize, Clock, ItemId, ItemPatch, ListId, ListPatch, NewItem, NewList,
    SystemClock, Timestamp, TodoItem, TodoList, UserId,
};

use crate::error::{StoreError, StoreResult};
use crate::query::{ItemQuery, Page, PageRequest, Pagination};
use crate::traits::TodoStore;

#[derive(Debug)]
struct ListRecord {
    list: TodoList,
    seq: u64,
    deleted_at: Option<Timestamp>,
}

impl ListRecord {
    fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Debug)]
struct ItemRecord {
    item: TodoItem,
    seq: u64,
    deleted_at: Option<Timestamp>,
}

impl ItemRecord {
    fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Debug, Default)]
struct State {
    lists: HashMap<ListId, ListRecord>,
    items: HashMap<ItemId, ItemRecord>,
    next_seq: u64,
}

impl State {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// A live list owned by `caller`, or `NotFound`.
    fn owned_list(&self, caller: &UserId, list_id: &ListId) -> StoreResult<&ListRecord> {
        match self.lists.get(list_id) {
            Some(rec) if rec.is_live() && rec.list.owner_id == *caller => Ok(rec),
            _ => Err(StoreError::list_not_found(list_id)),
        }
    }

    fn owned_list_mut(
        &mut self,
        caller: &UserId,
        list_id: &ListId,
    ) -> StoreResult<&mut ListRecord> {
        match self.lists.get_mut(list_id) {
            Some(rec) if rec.is_live() && rec.list.owner_id == *caller => Ok(rec),
            _ => Err(StoreError::list_not_found(list_id)),
        }
    }

    /// A live item belonging to `list_id`, or `NotFound`.
    fn live_item(&self, list_id: &ListId, item_id: &ItemId) -> StoreResult<&ItemRecord> {
        match self.items.get(item_id) {
            Some(rec) if rec.is_live() && rec.item.list_id == *list_id => Ok(rec),
            _ => Err(StoreError::item_not_found(item_id)),
        }
    }

    fn live_item_mut(
        &mut self,
        list_id: &ListId,
        item_id: &ItemId,
    ) -> StoreResult<&mut ItemRecord> {
        match self.items.get_mut(item_id) {
            Some(rec) if rec.is_live() && rec.item.list_id == *list_id => Ok(rec),
            _ => Err(StoreError::item_not_found(item_id)),
        }
    }

    fn name_taken(&self, owner: &UserId, name: &str, except: Option<&ListId>) -> bool {
        self.lists.values().any(|rec| {
            rec.is_live()
                && rec.list.owner_id == *owner
                && rec.list.name == name
                && Some(&rec.list.id) != except
        })
    }

    fn item_count(&self, list_id: &ListId) -> u64 {
        self.items
            .values()
            .filter(|rec| rec.is_live() && rec.item.list_id == *list_id)
            .count() as u64
    }

    fn view(&self, rec: &ListRecord) -> TodoList {
        TodoList {
            item_count: self.item_count(&rec.list.id),
            ..rec.list.clone()
        }
    }
}

/// An in-memory implementation of [`TodoStore`].
///
/// All data is lost when the store is dropped.
#[derive(Debug)]
pub struct InMemoryTodoStore {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTodoStore {
    /// Create an empty store on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock,
        }
    }

    /// Number of live lists across all owners.
    pub fn live_lists(&self) -> StoreResult<usize> {
        Ok(self.read()?.lists.values().filter(|r| r.is_live()).count())
    }

    /// Number of live items across all lists.
    pub fn live_items(&self) -> StoreResult<usize> {
        Ok(self.read()?.items.values().filter(|r| r.is_live()).count())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryTodoStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TodoStore for InMemoryTodoStore {
    fn create_list(&self, caller: &UserId, list: NewList) -> StoreResult<TodoList> {
        let mut state = self.write()?;
        if state.name_taken(caller, &list.name, None) {
            warn!(owner = %caller, name = %list.name, "list name already in use");
            return Err(StoreError::NameConflict { name: list.name });
        }

        let now = self.clock.now();
        let record = ListRecord {
            list: TodoList {
                id: ListId::new(),
                owner_id: *caller,
                name: list.name,
                description: list.description,
                created_at: now,
                updated_at: now,
                item_count: 0,
            },
            seq: state.next_seq(),
            deleted_at: None,
        };
        let created = record.list.clone();
        state.lists.insert(created.id, record);
        debug!(list = %created.id, owner = %caller, "list created");
        Ok(created)
    }

    fn list_lists(&self, caller: &UserId, request: PageRequest) -> StoreResult<Page<TodoList>> {
        let state = self.read()?;
        let mut owned: Vec<&ListRecord> = state
            .lists
            .values()
            .filter(|rec| rec.is_live() && rec.list.owner_id == *caller)
            .collect();
        owned.sort_by(|a, b| {
            b.list
                .created_at
                .cmp(&a.list.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });

        let pagination = Pagination::compute(request, owned.len() as u64);
        let items = owned
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(pagination.limit).unwrap_or(usize::MAX))
            .map(|rec| state.view(rec))
            .collect();
        Ok(Page { items, pagination })
    }

    fn get_list(&self, caller: &UserId, list_id: &ListId) -> StoreResult<TodoList> {
        let state = self.read()?;
        let rec = state.owned_list(caller, list_id)?;
        Ok(state.view(rec))
    }

    fn update_list(
        &self,
        caller: &UserId,
        list_id: &ListId,
        patch: ListPatch,
    ) -> StoreResult<TodoList> {
        let mut state = self.write()?;
        state.owned_list(caller, list_id)?;
        if patch.is_empty() {
            let rec = state.owned_list(caller, list_id)?;
            return Ok(state.view(rec));
        }
        if let Some(name) = &patch.name {
            if state.name_taken(caller, name, Some(list_id)) {
                warn!(owner = %caller, name = %name, "list name already in use");
                return Err(StoreError::NameConflict { name: name.clone() });
            }
        }

        let now = self.clock.now();
        let rec = state.owned_list_mut(caller, list_id)?;
        if let Some(name) = patch.name {
            rec.list.name = name;
        }
        if let Some(description) = patch.description {
            rec.list.description = description;
        }
        rec.list.updated_at = now;
        debug!(list = %list_id, "list updated");

        let rec = state.owned_list(caller, list_id)?;
        Ok(state.view(rec))
    }

    fn delete_list(&self, caller: &UserId, list_id: &ListId) -> StoreResult<()> {
        let mut state = self.write()?;
        let now = self.clock.now();
        state.owned_list_mut(caller, list_id)?.deleted_at = Some(now);

        let mut cascaded = 0usize;
        for rec in state.items.values_mut() {
            if rec.is_live() && rec.item.list_id == *list_id {
                rec.deleted_at = Some(now);
                cascaded += 1;
            }
        }
        debug!(list = %list_id, items = cascaded, "list deleted");
        Ok(())
    }

    fn create_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item: NewItem,
    ) -> StoreResult<TodoItem> {
        let mut state = self.write()?;
        state.owned_list(caller, list_id)?;

        let now = self.clock.now();
        let record = ItemRecord {
            item: TodoItem {
                id: ItemId::new(),
                list_id: *list_id,
                description: item.description,
                priority: item.priority,
                due_date: item.due_date.map(normalize),
                completed: false,
                completed_at: None,
                created_at: now,
                updated_at: now,
            },
            seq: state.next_seq(),
            deleted_at: None,
        };
        let created = record.item.clone();
        state.items.insert(created.id, record);
        debug!(item = %created.id, list = %list_id, "item created");
        Ok(created)
    }

    fn list_items(
        &self,
        caller: &UserId,
        list_id: &ListId,
        query: &ItemQuery,
    ) -> StoreResult<Vec<TodoItem>> {
        let state = self.read()?;
        state.owned_list(caller, list_id)?;
        let order = query.resolve()?;

        let mut entries: Vec<(TodoItem, u64)> = state
            .items
            .values()
            .filter(|rec| rec.is_live() && rec.item.list_id == *list_id)
            .filter(|rec| query.matches(&rec.item))
            .map(|rec| (rec.item.clone(), rec.seq))
            .collect();
        order.sort(&mut entries);
        Ok(entries.into_iter().map(|(item, _)| item).collect())
    }

    fn get_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item_id: &ItemId,
    ) -> StoreResult<TodoItem> {
        let state = self.read()?;
        state.owned_list(caller, list_id)?;
        Ok(state.live_item(list_id, item_id)?.item.clone())
    }

    fn update_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item_id: &ItemId,
        patch: ItemPatch,
    ) -> StoreResult<TodoItem> {
        let mut state = self.write()?;
        state.owned_list(caller, list_id)?;
        let now = self.clock.now();
        let rec = state.live_item_mut(list_id, item_id)?;
        if patch.is_empty() {
            return Ok(rec.item.clone());
        }

        let item = &mut rec.item;
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
        debug!(item = %item_id, list = %list_id, "item updated");
        Ok(item.clone())
    }

    fn delete_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item_id: &ItemId,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        state.owned_list(caller, list_id)?;
        let now = self.clock.now();
        state.live_item_mut(list_id, item_id)?.deleted_at = Some(now);
        debug!(item = %item_id, list = %list_id, "item deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::Fixture;
    use todo_types::{ManualClock, Priority};

    struct MemoryFixture {
        store: InMemoryTodoStore,
        clock: Arc<ManualClock>,
    }

    impl MemoryFixture {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::at_origin());
            Self {
                store: InMemoryTodoStore::with_clock(clock.clone()),
                clock,
            }
        }
    }

    impl Fixture for MemoryFixture {
        type Store = InMemoryTodoStore;

        fn store(&self) -> &InMemoryTodoStore {
            &self.store
        }

        fn user(&self) -> UserId {
            UserId::new()
        }

        fn clock(&self) -> &ManualClock {
            &self.clock
        }
    }

    crate::todo_store_conformance!(MemoryFixture::new());

    // -----------------------------------------------------------------------
    // Backend-specific behavior
    // -----------------------------------------------------------------------

    #[test]
    fn deleted_records_remain_as_tombstones() {
        let fx = MemoryFixture::new();
        let owner = fx.user();
        let list = fx.store.create_list(&owner, NewList::new("Chores")).unwrap();
        fx.store
            .create_item(&owner, &list.id, NewItem::new("sweep", Priority::Low))
            .unwrap();
        fx.store.delete_list(&owner, &list.id).unwrap();

        assert_eq!(fx.store.live_lists().unwrap(), 0);
        assert_eq!(fx.store.live_items().unwrap(), 0);
        let state = fx.store.read().unwrap();
        assert_eq!(state.lists.len(), 1);
        assert_eq!(state.items.len(), 1);
        assert!(state.items.values().all(|r| r.deleted_at.is_some()));
    }

    #[test]
    fn default_creates_empty_store() {
        let store = InMemoryTodoStore::default();
        assert_eq!(store.live_lists().unwrap(), 0);
        assert_eq!(store.live_items().unwrap(), 0);
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::thread;

        let store = Arc::new(InMemoryTodoStore::new());
        let owner = UserId::new();
        let list = store.create_list(&owner, NewList::new("shared")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let list_id = list.id;
                thread::spawn(move || {
                    let fetched = store.get_list(&owner, &list_id).unwrap();
                    assert_eq!(fetched.name, "shared");
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    #[test]
    fn debug_format() {
        let store = InMemoryTodoStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryTodoStore"));
    }
}
