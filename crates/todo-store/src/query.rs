//! Filtering, ordering, and pagination rules shared by every backend.
//!
//! Backends that sort in their own engine (SQL `ORDER BY`) must reproduce
//! [`ItemOrder::compare`] exactly; the conformance suite checks that they do.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use todo_types::{Priority, TodoItem};

use crate::error::{StoreError, StoreResult};

/// Field an item listing is ordered by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortKey {
    #[default]
    CreatedAt,
    DueDate,
    Priority,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::DueDate => "due_date",
            Self::Priority => "priority",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(Self::CreatedAt),
            "due_date" => Ok(Self::DueDate),
            "priority" => Ok(Self::Priority),
            other => Err(StoreError::InvalidSortKey(other.to_string())),
        }
    }
}

/// Direction of an item listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }

    /// Turn an ascending comparison into one for this direction.
    pub fn apply(&self, ascending: Ordering) -> Ordering {
        match self {
            Self::Ascending => ascending,
            Self::Descending => ascending.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Ascending),
            "desc" => Ok(Self::Descending),
            other => Err(StoreError::InvalidSortDirection(other.to_string())),
        }
    }
}

/// Parameters of an item listing as supplied by the caller.
///
/// Sort key and direction stay as raw strings until a backend resolves them,
/// so an unknown value is reported by the listing operation itself. Missing
/// values default to `created_at` / `asc`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemQuery {
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl ItemQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn sort_by(mut self, key: impl Into<String>) -> Self {
        self.sort_by = Some(key.into());
        self
    }

    pub fn order(mut self, direction: impl Into<String>) -> Self {
        self.order = Some(direction.into());
        self
    }

    /// Typed shorthand for [`sort_by`](Self::sort_by) plus [`order`](Self::order).
    pub fn sorted(self, key: SortKey, direction: SortDirection) -> Self {
        self.sort_by(key.as_str()).order(direction.as_str())
    }

    /// Validate the sort parameters.
    pub fn resolve(&self) -> StoreResult<ItemOrder> {
        let key = match self.sort_by.as_deref() {
            Some(raw) => raw.parse()?,
            None => SortKey::default(),
        };
        let direction = match self.order.as_deref() {
            Some(raw) => raw.parse()?,
            None => SortDirection::default(),
        };
        Ok(ItemOrder { key, direction })
    }

    /// Returns `true` if the item passes the priority and completion filters.
    pub fn matches(&self, item: &TodoItem) -> bool {
        if let Some(p) = self.priority {
            if item.priority != p {
                return false;
            }
        }
        if let Some(done) = self.completed {
            if item.completed != done {
                return false;
            }
        }
        true
    }
}

/// A validated sort key and direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ItemOrder {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl ItemOrder {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Total order over `(item, insertion sequence)` pairs.
    ///
    /// Priority ascending means high first. Items without a due date sort
    /// after every dated item in both directions and among themselves by
    /// creation ascending.
    pub fn compare(&self, a: (&TodoItem, u64), b: (&TodoItem, u64)) -> Ordering {
        match self.key {
            SortKey::CreatedAt => self.direction.apply(by_creation(a, b)),
            SortKey::Priority => self.direction.apply(
                b.0.priority
                    .cmp(&a.0.priority)
                    .then_with(|| by_creation(a, b)),
            ),
            SortKey::DueDate => match (a.0.due_date, b.0.due_date) {
                (Some(x), Some(y)) => self
                    .direction
                    .apply(x.cmp(&y).then_with(|| by_creation(a, b))),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => by_creation(a, b),
            },
        }
    }

    /// Sort `(item, insertion sequence)` pairs in place.
    pub fn sort(&self, entries: &mut [(TodoItem, u64)]) {
        entries.sort_by(|a, b| self.compare((&a.0, a.1), (&b.0, b.1)));
    }
}

fn by_creation(a: (&TodoItem, u64), b: (&TodoItem, u64)) -> Ordering {
    a.0.created_at
        .cmp(&b.0.created_at)
        .then_with(|| a.1.cmp(&b.1))
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// A requested page of lists. Pages are 1-indexed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u64 = 20;

    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_LIMIT)
    }
}

/// Position of a returned page within the whole collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    /// The page actually served, after clamping.
    pub page: u64,
    pub limit: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl Pagination {
    /// Resolve a request against the number of live entities.
    ///
    /// A page past the end is pulled back to the last page when one exists.
    /// Values below 1 are treated as 1.
    pub fn compute(request: PageRequest, total_items: u64) -> Self {
        let limit = request.limit.max(1);
        let total_pages = total_items.div_ceil(limit);
        let mut page = request.page.max(1);
        if total_pages > 0 && page > total_pages {
            page = total_pages;
        }
        Self {
            page,
            limit,
            total_items,
            total_pages,
        }
    }

    /// Number of entities skipped before this page. Saturates for pages far
    /// past an empty collection.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// One page of results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;
    use todo_types::{ItemId, ListId, Timestamp};

    fn at(secs: i64) -> Timestamp {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn item(created: i64, priority: Priority, due: Option<i64>) -> TodoItem {
        TodoItem {
            id: ItemId::new(),
            list_id: ListId::new(),
            description: format!("c{created}"),
            priority,
            due_date: due.map(at),
            completed: false,
            completed_at: None,
            created_at: at(created),
            updated_at: at(created),
        }
    }

    fn sorted(order: ItemOrder, items: &[TodoItem]) -> Vec<ItemId> {
        let mut entries: Vec<(TodoItem, u64)> = items
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, it)| (it, i as u64))
            .collect();
        order.sort(&mut entries);
        entries.into_iter().map(|(it, _)| it.id).collect()
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_defaults() {
        let order = ItemQuery::new().resolve().unwrap();
        assert_eq!(order, ItemOrder::new(SortKey::CreatedAt, SortDirection::Ascending));
    }

    #[test]
    fn resolve_rejects_unknown_key() {
        let err = ItemQuery::new().sort_by("name").resolve().unwrap_err();
        assert_eq!(err, StoreError::InvalidSortKey("name".into()));
    }

    #[test]
    fn resolve_rejects_unknown_direction() {
        let err = ItemQuery::new().order("up").resolve().unwrap_err();
        assert_eq!(err, StoreError::InvalidSortDirection("up".into()));
    }

    #[test]
    fn sorted_roundtrips_through_strings() {
        for key in [SortKey::CreatedAt, SortKey::DueDate, SortKey::Priority] {
            for dir in [SortDirection::Ascending, SortDirection::Descending] {
                let order = ItemQuery::new().sorted(key, dir).resolve().unwrap();
                assert_eq!(order, ItemOrder::new(key, dir));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Filtering
    // -----------------------------------------------------------------------

    #[test]
    fn filters_combine() {
        let mut done_high = item(1, Priority::High, None);
        done_high.completed = true;
        let open_high = item(2, Priority::High, None);
        let open_low = item(3, Priority::Low, None);

        let q = ItemQuery::new().priority(Priority::High).completed(false);
        assert!(!q.matches(&done_high));
        assert!(q.matches(&open_high));
        assert!(!q.matches(&open_low));
        assert!(ItemQuery::new().matches(&done_high));
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn priority_ascending_is_high_first() {
        let milk = item(1, Priority::Low, None);
        let eggs = item(2, Priority::High, None);
        let bread = item(3, Priority::Medium, None);
        let order = ItemOrder::new(SortKey::Priority, SortDirection::Ascending);
        assert_eq!(
            sorted(order, &[milk.clone(), eggs.clone(), bread.clone()]),
            vec![eggs.id, bread.id, milk.id]
        );
    }

    #[test]
    fn equal_creation_times_keep_insertion_order() {
        let a = item(5, Priority::Low, None);
        let b = item(5, Priority::Low, None);
        let c = item(5, Priority::Low, None);
        let asc = ItemOrder::new(SortKey::CreatedAt, SortDirection::Ascending);
        assert_eq!(sorted(asc, &[a.clone(), b.clone(), c.clone()]), vec![a.id, b.id, c.id]);
    }

    #[test]
    fn undated_items_stay_last_when_descending() {
        let undated_old = item(1, Priority::Low, None);
        let early = item(2, Priority::Low, Some(100));
        let undated_new = item(3, Priority::Low, None);
        let late = item(4, Priority::Low, Some(200));
        let all = [undated_old.clone(), early.clone(), undated_new.clone(), late.clone()];

        let asc = ItemOrder::new(SortKey::DueDate, SortDirection::Ascending);
        let desc = ItemOrder::new(SortKey::DueDate, SortDirection::Descending);
        assert_eq!(
            sorted(asc, &all),
            vec![early.id, late.id, undated_old.id, undated_new.id]
        );
        assert_eq!(
            sorted(desc, &all),
            vec![late.id, early.id, undated_old.id, undated_new.id]
        );
    }

    fn arb_items(with_due: bool) -> impl Strategy<Value = Vec<TodoItem>> {
        let due = if with_due {
            (0i64..50).prop_map(Some).boxed()
        } else {
            proptest::option::of(0i64..50).boxed()
        };
        prop::collection::vec((0i64..20, 0u8..3, due), 1..24).prop_map(|rows| {
            rows.into_iter()
                .map(|(created, rank, due)| {
                    item(created, Priority::from_rank(rank).unwrap_or_default(), due)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn descending_mirrors_ascending(items in arb_items(false), key in 0usize..2) {
            let key = [SortKey::CreatedAt, SortKey::Priority][key];
            let mut asc = sorted(ItemOrder::new(key, SortDirection::Ascending), &items);
            let desc = sorted(ItemOrder::new(key, SortDirection::Descending), &items);
            asc.reverse();
            prop_assert_eq!(asc, desc);
        }

        #[test]
        fn due_date_mirrors_when_every_item_is_dated(items in arb_items(true)) {
            let mut asc =
                sorted(ItemOrder::new(SortKey::DueDate, SortDirection::Ascending), &items);
            let desc =
                sorted(ItemOrder::new(SortKey::DueDate, SortDirection::Descending), &items);
            asc.reverse();
            prop_assert_eq!(asc, desc);
        }

        #[test]
        fn undated_items_sort_last(items in arb_items(false), descending in any::<bool>()) {
            let dir = if descending { SortDirection::Descending } else { SortDirection::Ascending };
            let ids = sorted(ItemOrder::new(SortKey::DueDate, dir), &items);
            let dated: Vec<bool> = ids
                .iter()
                .map(|id| items.iter().any(|it| it.id == *id && it.due_date.is_some()))
                .collect();
            let first_undated = dated.iter().position(|d| !d).unwrap_or(dated.len());
            prop_assert!(dated[first_undated..].iter().all(|d| !d));
        }
    }

    // -----------------------------------------------------------------------
    // Pagination
    // -----------------------------------------------------------------------

    #[test]
    fn pages_of_twenty_five() {
        let p1 = Pagination::compute(PageRequest::new(1, 10), 25);
        assert_eq!((p1.page, p1.total_pages, p1.offset()), (1, 3, 0));
        let p3 = Pagination::compute(PageRequest::new(3, 10), 25);
        assert_eq!((p3.page, p3.offset()), (3, 20));
    }

    #[test]
    fn page_past_end_clamps_to_last() {
        let p = Pagination::compute(PageRequest::new(9, 10), 25);
        assert_eq!(p.page, 3);
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn empty_collection_has_no_pages() {
        let p = Pagination::compute(PageRequest::new(4, 10), 0);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.page, 4);
    }

    #[test]
    fn offset_saturates_far_past_an_empty_collection() {
        let p = Pagination::compute(PageRequest::new(u64::MAX, 10), 0);
        assert_eq!(p.offset(), u64::MAX);
    }

    #[test]
    fn zero_values_are_lifted_to_one() {
        let p = Pagination::compute(PageRequest::new(0, 0), 3);
        assert_eq!((p.page, p.limit, p.total_pages), (1, 1, 3));
    }

    #[test]
    fn exact_multiple_has_no_trailing_page() {
        let p = Pagination::compute(PageRequest::new(1, 10), 30);
        assert_eq!(p.total_pages, 3);
    }
}
