//! Behavior every [`TodoStore`] backend must exhibit.
//!
//! Each check is a plain function over a [`Fixture`]. Backends run the whole
//! suite with [`todo_store_conformance!`](crate::todo_store_conformance):
//!
//! ```ignore
//! todo_store::todo_store_conformance!(MyFixture::new());
//! ```

use chrono::{DateTime, Duration, Utc};

use todo_types::{
    Clock, ItemId, ItemPatch, ListPatch, ManualClock, NewItem, NewList, Priority, Timestamp,
    TodoItem, UserId,
};

use crate::error::StoreError;
use crate::query::{ItemQuery, PageRequest, SortDirection, SortKey};
use crate::traits::TodoStore;

/// A fresh backend plus the hooks the suite needs around it.
pub trait Fixture {
    type Store: TodoStore;

    fn store(&self) -> &Self::Store;

    /// A caller identity the backend will accept.
    fn user(&self) -> UserId;

    /// The clock the store was built with.
    fn clock(&self) -> &ManualClock;
}

/// Expands to one `#[test]` per conformance check, each on a fresh fixture.
#[macro_export]
macro_rules! todo_store_conformance {
    ($make:expr) => {
        $crate::todo_store_conformance!(@tests $make;
            duplicate_name_conflicts,
            same_name_across_owners,
            deleted_name_is_reusable,
            rename_onto_live_name_conflicts,
            rename_to_own_name_is_allowed,
            names_are_case_sensitive,
            cascade_delete_hides_items,
            item_count_tracks_live_items,
            completion_timestamp_is_idempotent,
            reopening_clears_completed_at,
            pagination_arithmetic,
            page_past_end_clamps_to_last,
            empty_listing_has_no_pages,
            extreme_page_requests,
            lists_newest_first,
            sort_mirror_created_and_priority,
            due_date_nil_sorts_last,
            due_date_mirror_when_all_dated,
            ownership_isolation,
            groceries_scenario,
            invalid_sort_parameters,
            filters_by_priority_and_completion,
            update_list_touches_updated_at,
            empty_patches_are_noops,
            update_item_fields,
            item_must_belong_to_list,
            delete_item_is_final,
            due_dates_are_normalized,
            concurrent_creates_have_one_winner,
        );
    };
    (@tests $make:expr; $($check:ident),+ $(,)?) => {
        mod store_conformance {
            #[allow(unused_imports)]
            use super::*;

            $(
                #[test]
                fn $check() {
                    let fixture = $make;
                    $crate::conformance::$check(&fixture);
                }
            )+
        }
    };
}

fn at(days: i64) -> Timestamp {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(days)
}

fn ids(items: &[TodoItem]) -> Vec<ItemId> {
    items.iter().map(|i| i.id).collect()
}

fn tick<F: Fixture>(fx: &F) {
    fx.clock().advance(Duration::seconds(1));
}

// ---------------------------------------------------------------------------
// Name uniqueness
// ---------------------------------------------------------------------------

pub fn duplicate_name_conflicts<F: Fixture>(fx: &F) {
    let owner = fx.user();
    fx.store().create_list(&owner, NewList::new("Work")).unwrap();
    let err = fx
        .store()
        .create_list(&owner, NewList::new("Work"))
        .unwrap_err();
    assert_eq!(err, StoreError::NameConflict { name: "Work".into() });
}

pub fn same_name_across_owners<F: Fixture>(fx: &F) {
    let a = fx.user();
    let b = fx.user();
    let la = fx.store().create_list(&a, NewList::new("Work")).unwrap();
    let lb = fx.store().create_list(&b, NewList::new("Work")).unwrap();
    assert_ne!(la.id, lb.id);
    assert_eq!(la.owner_id, a);
    assert_eq!(lb.owner_id, b);
}

pub fn deleted_name_is_reusable<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let first = fx.store().create_list(&owner, NewList::new("Trip")).unwrap();
    fx.store().delete_list(&owner, &first.id).unwrap();
    let second = fx.store().create_list(&owner, NewList::new("Trip")).unwrap();
    assert_ne!(first.id, second.id);
}

pub fn rename_onto_live_name_conflicts<F: Fixture>(fx: &F) {
    let owner = fx.user();
    fx.store().create_list(&owner, NewList::new("Home")).unwrap();
    let other = fx.store().create_list(&owner, NewList::new("Garden")).unwrap();
    let err = fx
        .store()
        .update_list(&owner, &other.id, ListPatch::rename("Home"))
        .unwrap_err();
    assert!(err.is_conflict());
    let unchanged = fx.store().get_list(&owner, &other.id).unwrap();
    assert_eq!(unchanged.name, "Garden");
}

pub fn rename_to_own_name_is_allowed<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("Home")).unwrap();
    let renamed = fx
        .store()
        .update_list(&owner, &list.id, ListPatch::rename("Home"))
        .unwrap();
    assert_eq!(renamed.name, "Home");
}

pub fn names_are_case_sensitive<F: Fixture>(fx: &F) {
    let owner = fx.user();
    fx.store().create_list(&owner, NewList::new("books")).unwrap();
    fx.store().create_list(&owner, NewList::new("Books")).unwrap();
    let page = fx.store().list_lists(&owner, PageRequest::default()).unwrap();
    assert_eq!(page.pagination.total_items, 2);
}

// ---------------------------------------------------------------------------
// Cascade and counts
// ---------------------------------------------------------------------------

pub fn cascade_delete_hides_items<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("Doomed")).unwrap();
    let items: Vec<TodoItem> = (0..4)
        .map(|i| {
            fx.store()
                .create_item(&owner, &list.id, NewItem::new(format!("t{i}"), Priority::Low))
                .unwrap()
        })
        .collect();

    fx.store().delete_list(&owner, &list.id).unwrap();

    assert!(fx.store().get_list(&owner, &list.id).unwrap_err().is_not_found());
    assert!(fx
        .store()
        .list_items(&owner, &list.id, &ItemQuery::new())
        .unwrap_err()
        .is_not_found());
    for item in &items {
        let err = fx.store().get_item(&owner, &list.id, &item.id).unwrap_err();
        assert!(err.is_not_found());
    }
    assert!(fx.store().delete_list(&owner, &list.id).unwrap_err().is_not_found());
}

pub fn item_count_tracks_live_items<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("Count")).unwrap();
    assert_eq!(list.item_count, 0);
    let a = fx
        .store()
        .create_item(&owner, &list.id, NewItem::new("a", Priority::Low))
        .unwrap();
    fx.store()
        .create_item(&owner, &list.id, NewItem::new("b", Priority::Low))
        .unwrap();
    assert_eq!(fx.store().get_list(&owner, &list.id).unwrap().item_count, 2);

    fx.store().delete_item(&owner, &list.id, &a.id).unwrap();
    assert_eq!(fx.store().get_list(&owner, &list.id).unwrap().item_count, 1);

    let page = fx.store().list_lists(&owner, PageRequest::default()).unwrap();
    assert_eq!(page.items[0].item_count, 1);
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

pub fn completion_timestamp_is_idempotent<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("Done")).unwrap();
    let item = fx
        .store()
        .create_item(&owner, &list.id, NewItem::new("x", Priority::High))
        .unwrap();
    assert!(!item.completed);
    assert_eq!(item.completed_at, None);

    tick(fx);
    let done = fx
        .store()
        .update_item(&owner, &list.id, &item.id, ItemPatch::completed(true))
        .unwrap();
    assert!(done.completed);
    assert_eq!(done.completed_at, Some(fx.clock().now()));

    tick(fx);
    let again = fx
        .store()
        .update_item(&owner, &list.id, &item.id, ItemPatch::completed(true))
        .unwrap();
    assert_eq!(again.completed_at, done.completed_at);
    let fetched = fx.store().get_item(&owner, &list.id, &item.id).unwrap();
    assert_eq!(fetched.completed_at, done.completed_at);
}

pub fn reopening_clears_completed_at<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("Undo")).unwrap();
    let item = fx
        .store()
        .create_item(&owner, &list.id, NewItem::new("x", Priority::Low))
        .unwrap();
    fx.store()
        .update_item(&owner, &list.id, &item.id, ItemPatch::completed(true))
        .unwrap();
    let reopened = fx
        .store()
        .update_item(&owner, &list.id, &item.id, ItemPatch::completed(false))
        .unwrap();
    assert!(!reopened.completed);
    assert_eq!(reopened.completed_at, None);
}

// ---------------------------------------------------------------------------
// List pagination
// ---------------------------------------------------------------------------

fn seed_lists<F: Fixture>(fx: &F, owner: &UserId, n: usize) {
    for i in 0..n {
        fx.store()
            .create_list(owner, NewList::new(format!("list-{i:02}")))
            .unwrap();
        tick(fx);
    }
}

pub fn pagination_arithmetic<F: Fixture>(fx: &F) {
    let owner = fx.user();
    seed_lists(fx, &owner, 25);

    let mut seen = Vec::new();
    for (page, expected) in [(1, 10), (2, 10), (3, 5)] {
        let got = fx
            .store()
            .list_lists(&owner, PageRequest::new(page, 10))
            .unwrap();
        assert_eq!(got.items.len(), expected);
        assert_eq!(got.pagination.page, page);
        assert_eq!(got.pagination.total_items, 25);
        assert_eq!(got.pagination.total_pages, 3);
        seen.extend(got.items.into_iter().map(|l| l.id));
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 25);
}

pub fn page_past_end_clamps_to_last<F: Fixture>(fx: &F) {
    let owner = fx.user();
    seed_lists(fx, &owner, 25);
    let got = fx
        .store()
        .list_lists(&owner, PageRequest::new(7, 10))
        .unwrap();
    assert_eq!(got.pagination.page, 3);
    assert_eq!(got.items.len(), 5);
}

pub fn empty_listing_has_no_pages<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let got = fx
        .store()
        .list_lists(&owner, PageRequest::new(1, 10))
        .unwrap();
    assert!(got.items.is_empty());
    assert_eq!(got.pagination.total_items, 0);
    assert_eq!(got.pagination.total_pages, 0);
}

pub fn extreme_page_requests<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let empty = fx
        .store()
        .list_lists(&owner, PageRequest::new(u64::MAX, 10))
        .unwrap();
    assert!(empty.items.is_empty());
    assert_eq!(empty.pagination.total_pages, 0);

    fx.store().create_list(&owner, NewList::new("only")).unwrap();
    let got = fx
        .store()
        .list_lists(&owner, PageRequest::new(u64::MAX, u64::MAX))
        .unwrap();
    assert_eq!(got.pagination.page, 1);
    assert_eq!(got.pagination.total_pages, 1);
    assert_eq!(got.items.len(), 1);
}

pub fn lists_newest_first<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let old = fx.store().create_list(&owner, NewList::new("old")).unwrap();
    tick(fx);
    let mid = fx.store().create_list(&owner, NewList::new("mid")).unwrap();
    // Same instant as `mid`: later insertion comes first.
    let new = fx.store().create_list(&owner, NewList::new("new")).unwrap();
    let other_owner = fx.user();
    fx.store()
        .create_list(&other_owner, NewList::new("foreign"))
        .unwrap();

    let page = fx.store().list_lists(&owner, PageRequest::default()).unwrap();
    let got: Vec<_> = page.items.iter().map(|l| l.id).collect();
    assert_eq!(got, vec![new.id, mid.id, old.id]);
}

// ---------------------------------------------------------------------------
// Item ordering
// ---------------------------------------------------------------------------

/// Items with mixed priorities, some sharing a creation instant, some
/// sharing a due date, some undated.
fn seed_items<F: Fixture>(fx: &F, owner: &UserId, all_dated: bool) -> todo_types::ListId {
    let list = fx.store().create_list(owner, NewList::new("Sorted")).unwrap();
    let rows: [(Priority, Option<i64>, bool); 7] = [
        (Priority::Medium, Some(10), true),
        (Priority::High, None, false),
        (Priority::Low, Some(3), true),
        (Priority::High, Some(10), false),
        (Priority::Medium, None, true),
        (Priority::Low, Some(7), false),
        (Priority::High, Some(3), true),
    ];
    for (i, (priority, due, advance)) in rows.into_iter().enumerate() {
        let due = due.or(if all_dated { Some(20 + i as i64) } else { None });
        let mut draft = NewItem::new(format!("item-{i}"), priority);
        draft.due_date = due.map(at);
        fx.store().create_item(owner, &list.id, draft).unwrap();
        if advance {
            tick(fx);
        }
    }
    list.id
}

fn listed<F: Fixture>(
    fx: &F,
    owner: &UserId,
    list_id: &todo_types::ListId,
    key: SortKey,
    dir: SortDirection,
) -> Vec<TodoItem> {
    fx.store()
        .list_items(owner, list_id, &ItemQuery::new().sorted(key, dir))
        .unwrap()
}

pub fn sort_mirror_created_and_priority<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list_id = seed_items(fx, &owner, false);
    for key in [SortKey::CreatedAt, SortKey::Priority] {
        let mut asc = ids(&listed(fx, &owner, &list_id, key, SortDirection::Ascending));
        let desc = ids(&listed(fx, &owner, &list_id, key, SortDirection::Descending));
        assert_eq!(asc.len(), 7);
        asc.reverse();
        assert_eq!(asc, desc, "mirror broken for {key}");
    }

    let created = listed(fx, &owner, &list_id, SortKey::CreatedAt, SortDirection::Ascending);
    let names: Vec<&str> = created.iter().map(|i| i.description.as_str()).collect();
    assert_eq!(
        names,
        ["item-0", "item-1", "item-2", "item-3", "item-4", "item-5", "item-6"]
    );
}

pub fn due_date_nil_sorts_last<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list_id = seed_items(fx, &owner, false);
    for dir in [SortDirection::Ascending, SortDirection::Descending] {
        let items = listed(fx, &owner, &list_id, SortKey::DueDate, dir);
        let dated = items.iter().take_while(|i| i.due_date.is_some()).count();
        assert_eq!(dated, 5);
        assert!(items[dated..].iter().all(|i| i.due_date.is_none()));
        let undated: Vec<&str> = items[dated..].iter().map(|i| i.description.as_str()).collect();
        assert_eq!(undated, ["item-1", "item-4"]);
    }

    let asc = listed(fx, &owner, &list_id, SortKey::DueDate, SortDirection::Ascending);
    let names: Vec<&str> = asc.iter().map(|i| i.description.as_str()).collect();
    assert_eq!(
        names,
        ["item-2", "item-6", "item-5", "item-0", "item-3", "item-1", "item-4"]
    );
    let desc = listed(fx, &owner, &list_id, SortKey::DueDate, SortDirection::Descending);
    let names: Vec<&str> = desc.iter().map(|i| i.description.as_str()).collect();
    assert_eq!(
        names,
        ["item-3", "item-0", "item-5", "item-6", "item-2", "item-1", "item-4"]
    );
}

pub fn due_date_mirror_when_all_dated<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list_id = seed_items(fx, &owner, true);
    let mut asc = ids(&listed(fx, &owner, &list_id, SortKey::DueDate, SortDirection::Ascending));
    let desc = ids(&listed(fx, &owner, &list_id, SortKey::DueDate, SortDirection::Descending));
    asc.reverse();
    assert_eq!(asc, desc);
}

pub fn groceries_scenario<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx
        .store()
        .create_list(&owner, NewList::new("Groceries"))
        .unwrap();
    for (desc, priority) in [
        ("milk", Priority::Low),
        ("eggs", Priority::High),
        ("bread", Priority::Medium),
    ] {
        fx.store()
            .create_item(&owner, &list.id, NewItem::new(desc, priority))
            .unwrap();
        tick(fx);
    }
    let items = fx
        .store()
        .list_items(&owner, &list.id, &ItemQuery::new().sort_by("priority").order("asc"))
        .unwrap();
    let got: Vec<(&str, Priority)> = items
        .iter()
        .map(|i| (i.description.as_str(), i.priority))
        .collect();
    assert_eq!(
        got,
        [
            ("eggs", Priority::High),
            ("bread", Priority::Medium),
            ("milk", Priority::Low)
        ]
    );
}

pub fn invalid_sort_parameters<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("Q")).unwrap();
    let err = fx
        .store()
        .list_items(&owner, &list.id, &ItemQuery::new().sort_by("title"))
        .unwrap_err();
    assert_eq!(err, StoreError::InvalidSortKey("title".into()));
    let err = fx
        .store()
        .list_items(&owner, &list.id, &ItemQuery::new().order("ascending"))
        .unwrap_err();
    assert_eq!(err, StoreError::InvalidSortDirection("ascending".into()));

    // The list is resolved before the query is validated.
    let stranger = fx.user();
    let err = fx
        .store()
        .list_items(&stranger, &list.id, &ItemQuery::new().sort_by("title"))
        .unwrap_err();
    assert!(err.is_not_found());
}

pub fn filters_by_priority_and_completion<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("F")).unwrap();
    let mut made = Vec::new();
    for (i, p) in [Priority::High, Priority::Low, Priority::High, Priority::Medium]
        .into_iter()
        .enumerate()
    {
        made.push(
            fx.store()
                .create_item(&owner, &list.id, NewItem::new(format!("f{i}"), p))
                .unwrap(),
        );
        tick(fx);
    }
    fx.store()
        .update_item(&owner, &list.id, &made[2].id, ItemPatch::completed(true))
        .unwrap();

    let high = fx
        .store()
        .list_items(&owner, &list.id, &ItemQuery::new().priority(Priority::High))
        .unwrap();
    assert_eq!(ids(&high), vec![made[0].id, made[2].id]);

    let open_high = fx
        .store()
        .list_items(
            &owner,
            &list.id,
            &ItemQuery::new().priority(Priority::High).completed(false),
        )
        .unwrap();
    assert_eq!(ids(&open_high), vec![made[0].id]);

    let done = fx
        .store()
        .list_items(&owner, &list.id, &ItemQuery::new().completed(true))
        .unwrap();
    assert_eq!(ids(&done), vec![made[2].id]);
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

pub fn ownership_isolation<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let stranger = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("Mine")).unwrap();
    let item = fx
        .store()
        .create_item(&owner, &list.id, NewItem::new("secret", Priority::High))
        .unwrap();
    let missing = todo_types::ListId::new();

    let foreign = fx.store().get_list(&stranger, &list.id).unwrap_err();
    let absent = fx.store().get_list(&stranger, &missing).unwrap_err();
    assert!(foreign.is_not_found() && absent.is_not_found());
    assert_eq!(
        std::mem::discriminant(&foreign),
        std::mem::discriminant(&absent)
    );

    let s = fx.store();
    assert!(s
        .update_list(&stranger, &list.id, ListPatch::rename("Stolen"))
        .unwrap_err()
        .is_not_found());
    assert!(s.delete_list(&stranger, &list.id).unwrap_err().is_not_found());
    assert!(s
        .create_item(&stranger, &list.id, NewItem::new("x", Priority::Low))
        .unwrap_err()
        .is_not_found());
    assert!(s
        .list_items(&stranger, &list.id, &ItemQuery::new())
        .unwrap_err()
        .is_not_found());
    assert!(s
        .get_item(&stranger, &list.id, &item.id)
        .unwrap_err()
        .is_not_found());
    assert!(s
        .update_item(&stranger, &list.id, &item.id, ItemPatch::completed(true))
        .unwrap_err()
        .is_not_found());
    assert!(s
        .delete_item(&stranger, &list.id, &item.id)
        .unwrap_err()
        .is_not_found());

    let page = s.list_lists(&stranger, PageRequest::default()).unwrap();
    assert!(page.items.is_empty());

    // The owner's data is untouched.
    let mine = s.get_list(&owner, &list.id).unwrap();
    assert_eq!(mine.name, "Mine");
    assert_eq!(mine.item_count, 1);
    assert!(!s.get_item(&owner, &list.id, &item.id).unwrap().completed);
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

pub fn update_list_touches_updated_at<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx
        .store()
        .create_list(&owner, NewList::new("Plan").with_description("v1"))
        .unwrap();
    assert_eq!(list.created_at, list.updated_at);
    assert_eq!(list.description, "v1");

    tick(fx);
    let updated = fx
        .store()
        .update_list(&owner, &list.id, ListPatch::describe("v2"))
        .unwrap();
    assert_eq!(updated.name, "Plan");
    assert_eq!(updated.description, "v2");
    assert_eq!(updated.created_at, list.created_at);
    assert_eq!(updated.updated_at, fx.clock().now());
    assert!(updated.updated_at > list.updated_at);
}

pub fn empty_patches_are_noops<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("Still")).unwrap();
    let item = fx
        .store()
        .create_item(&owner, &list.id, NewItem::new("x", Priority::Low))
        .unwrap();
    tick(fx);
    let same_list = fx
        .store()
        .update_list(&owner, &list.id, ListPatch::default())
        .unwrap();
    assert_eq!(same_list.updated_at, list.updated_at);
    let same_item = fx
        .store()
        .update_item(&owner, &list.id, &item.id, ItemPatch::default())
        .unwrap();
    assert_eq!(same_item, item);
}

pub fn update_item_fields<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("Edit")).unwrap();
    let item = fx
        .store()
        .create_item(
            &owner,
            &list.id,
            NewItem::new("draft", Priority::Low).due(at(5)),
        )
        .unwrap();
    assert_eq!(item.due_date, Some(at(5)));

    tick(fx);
    let patch = ItemPatch {
        description: Some("final".into()),
        priority: Some(Priority::High),
        ..Default::default()
    };
    let edited = fx
        .store()
        .update_item(&owner, &list.id, &item.id, patch)
        .unwrap();
    assert_eq!(edited.description, "final");
    assert_eq!(edited.priority, Priority::High);
    assert_eq!(edited.due_date, Some(at(5)));
    assert_eq!(edited.list_id, list.id);
    assert_eq!(edited.created_at, item.created_at);
    assert_eq!(edited.updated_at, fx.clock().now());

    let cleared = fx
        .store()
        .update_item(
            &owner,
            &list.id,
            &item.id,
            ItemPatch {
                due_date: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(cleared.due_date, None);
    assert_eq!(
        fx.store().get_item(&owner, &list.id, &item.id).unwrap(),
        cleared
    );
}

pub fn item_must_belong_to_list<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let a = fx.store().create_list(&owner, NewList::new("A")).unwrap();
    let b = fx.store().create_list(&owner, NewList::new("B")).unwrap();
    let item = fx
        .store()
        .create_item(&owner, &a.id, NewItem::new("in a", Priority::Low))
        .unwrap();
    let err = fx.store().get_item(&owner, &b.id, &item.id).unwrap_err();
    assert!(err.is_not_found());
    let err = fx
        .store()
        .update_item(&owner, &b.id, &item.id, ItemPatch::completed(true))
        .unwrap_err();
    assert!(err.is_not_found());
    let err = fx
        .store()
        .get_item(&owner, &a.id, &ItemId::new())
        .unwrap_err();
    assert!(err.is_not_found());
}

pub fn delete_item_is_final<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("Del")).unwrap();
    let keep = fx
        .store()
        .create_item(&owner, &list.id, NewItem::new("keep", Priority::Low))
        .unwrap();
    let gone = fx
        .store()
        .create_item(&owner, &list.id, NewItem::new("gone", Priority::Low))
        .unwrap();
    fx.store().delete_item(&owner, &list.id, &gone.id).unwrap();

    assert!(fx
        .store()
        .get_item(&owner, &list.id, &gone.id)
        .unwrap_err()
        .is_not_found());
    assert!(fx
        .store()
        .delete_item(&owner, &list.id, &gone.id)
        .unwrap_err()
        .is_not_found());
    let left = fx
        .store()
        .list_items(&owner, &list.id, &ItemQuery::new())
        .unwrap();
    assert_eq!(ids(&left), vec![keep.id]);
}

pub fn due_dates_are_normalized<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let list = fx.store().create_list(&owner, NewList::new("Precise")).unwrap();
    let raw = at(2) + Duration::nanoseconds(123_456_789);
    let item = fx
        .store()
        .create_item(&owner, &list.id, NewItem::new("n", Priority::Low).due(raw))
        .unwrap();
    let expected = todo_types::normalize(raw);
    assert_eq!(item.due_date, Some(expected));
    assert_eq!(
        fx.store()
            .get_item(&owner, &list.id, &item.id)
            .unwrap()
            .due_date,
        Some(expected)
    );
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

pub fn concurrent_creates_have_one_winner<F: Fixture>(fx: &F) {
    let owner = fx.user();
    let store = fx.store();
    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| store.create_list(&owner, NewList::new("Race"))))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect()
    });

    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_conflict()))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 7);
}
