//! The [`TodoStore`] trait defining the storage contract.
//!
//! Any backend (in-memory, relational) implements this trait; callers depend
//! on the trait alone.

use todo_types::{
    ItemId, ItemPatch, ListId, ListPatch, NewItem, NewList, TodoItem, TodoList, UserId,
};

use crate::error::StoreResult;
use crate::query::{ItemQuery, Page, PageRequest};

/// Storage backend for task lists and their items.
///
/// Every operation is scoped to `caller`: lists owned by someone else behave
/// exactly like lists that do not exist. Item operations resolve and
/// ownership-check the parent list first.
///
/// Implementations must be thread-safe (`Send + Sync`) and keep each
/// operation atomic: a name check and the write that follows it, and a list
/// deletion and its item cascade, are never observable half-done.
pub trait TodoStore: Send + Sync {
    /// Create an empty list. Fails with `NameConflict` if the caller already
    /// has a live list of that name.
    fn create_list(&self, caller: &UserId, list: NewList) -> StoreResult<TodoList>;

    /// The caller's live lists, newest first.
    fn list_lists(&self, caller: &UserId, request: PageRequest) -> StoreResult<Page<TodoList>>;

    fn get_list(&self, caller: &UserId, list_id: &ListId) -> StoreResult<TodoList>;

    /// Rename and/or re-describe a list.
    fn update_list(
        &self,
        caller: &UserId,
        list_id: &ListId,
        patch: ListPatch,
    ) -> StoreResult<TodoList>;

    /// Delete a list together with all of its items.
    fn delete_list(&self, caller: &UserId, list_id: &ListId) -> StoreResult<()>;

    fn create_item(&self, caller: &UserId, list_id: &ListId, item: NewItem)
        -> StoreResult<TodoItem>;

    /// Filtered, ordered items of one list.
    fn list_items(
        &self,
        caller: &UserId,
        list_id: &ListId,
        query: &ItemQuery,
    ) -> StoreResult<Vec<TodoItem>>;

    fn get_item(&self, caller: &UserId, list_id: &ListId, item_id: &ItemId)
        -> StoreResult<TodoItem>;

    /// Apply a partial update. Completion changes follow
    /// [`completion_after`](todo_types::completion_after).
    fn update_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item_id: &ItemId,
        patch: ItemPatch,
    ) -> StoreResult<TodoItem>;

    fn delete_item(&self, caller: &UserId, list_id: &ListId, item_id: &ItemId)
        -> StoreResult<()>;
}

impl<S: TodoStore + ?Sized> TodoStore for std::sync::Arc<S> {
    fn create_list(&self, caller: &UserId, list: NewList) -> StoreResult<TodoList> {
        (**self).create_list(caller, list)
    }

    fn list_lists(&self, caller: &UserId, request: PageRequest) -> StoreResult<Page<TodoList>> {
        (**self).list_lists(caller, request)
    }

    fn get_list(&self, caller: &UserId, list_id: &ListId) -> StoreResult<TodoList> {
        (**self).get_list(caller, list_id)
    }

    fn update_list(
        &self,
        caller: &UserId,
        list_id: &ListId,
        patch: ListPatch,
    ) -> StoreResult<TodoList> {
        (**self).update_list(caller, list_id, patch)
    }

    fn delete_list(&self, caller: &UserId, list_id: &ListId) -> StoreResult<()> {
        (**self).delete_list(caller, list_id)
    }

    fn create_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item: NewItem,
    ) -> StoreResult<TodoItem> {
        (**self).create_item(caller, list_id, item)
    }

    fn list_items(
        &self,
        caller: &UserId,
        list_id: &ListId,
        query: &ItemQuery,
    ) -> StoreResult<Vec<TodoItem>> {
        (**self).list_items(caller, list_id, query)
    }

    fn get_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item_id: &ItemId,
    ) -> StoreResult<TodoItem> {
        (**self).get_item(caller, list_id, item_id)
    }

    fn update_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item_id: &ItemId,
        patch: ItemPatch,
    ) -> StoreResult<TodoItem> {
        (**self).update_item(caller, list_id, item_id, patch)
    }

    fn delete_item(
        &self,
        caller: &UserId,
        list_id: &ListId,
        item_id: &ItemId,
    ) -> StoreResult<()> {
        (**self).delete_item(caller, list_id, item_id)
    }
}
