use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identity assigned by the remote store. Immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub i64);

impl RemoteId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RemoteId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A working-copy item: either already persisted, or not yet known to the store.
///
/// Only `Pending` entries can become creates; the type carries that rule
/// instead of a nullable identity field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Entry<T> {
    Persisted { id: RemoteId, item: T },
    Pending { item: T },
}

impl<T> Entry<T> {
    pub fn pending(item: T) -> Self {
        Self::Pending { item }
    }

    pub fn persisted(id: RemoteId, item: T) -> Self {
        Self::Persisted { id, item }
    }

    pub fn id(&self) -> Option<RemoteId> {
        match self {
            Self::Persisted { id, .. } => Some(*id),
            Self::Pending { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn item(&self) -> &T {
        match self {
            Self::Persisted { item, .. } | Self::Pending { item } => item,
        }
    }

    pub fn item_mut(&mut self) -> &mut T {
        match self {
            Self::Persisted { item, .. } | Self::Pending { item } => item,
        }
    }

    pub fn into_item(self) -> T {
        match self {
            Self::Persisted { item, .. } | Self::Pending { item } => item,
        }
    }
}

/// An item as it was last confirmed by the store, with its recorded position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: RemoteId,
    pub position: usize,
    pub item: T,
}

impl<T> Stored<T> {
    pub fn new(id: RemoteId, position: usize, item: T) -> Self {
        Self { id, position, item }
    }
}

/// Frozen, last-known-persisted state of one collection.
///
/// A snapshot never changes after construction; saving produces a new one.
/// Identities are unique: building from a list keeps the first occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Clone + Serialize",
    deserialize = "T: Clone + Deserialize<'de>"
))]
pub struct Snapshot<T: Clone> {
    items: im::Vector<Stored<T>>,
}

impl<T: Clone> Snapshot<T> {
    pub fn empty() -> Self {
        Self {
            items: im::Vector::new(),
        }
    }

    pub fn from_stored(items: impl IntoIterator<Item = Stored<T>>) -> Self {
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .filter(|stored| seen.insert(stored.id))
            .collect();
        Self { items }
    }

    /// Builds a snapshot from persisted working entries, using array index as position.
    pub fn from_entries(entries: &[Entry<T>]) -> Self {
        Self::from_stored(entries.iter().enumerate().filter_map(|(position, entry)| {
            entry
                .id()
                .map(|id| Stored::new(id, position, entry.item().clone()))
        }))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stored<T>> {
        self.items.iter()
    }

    pub fn get(&self, id: RemoteId) -> Option<&Stored<T>> {
        self.items.iter().find(|stored| stored.id == id)
    }

    pub fn contains(&self, id: RemoteId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = RemoteId> + '_ {
        self.items.iter().map(|stored| stored.id)
    }

    /// Working-copy view of the snapshot, ordered by recorded position.
    pub fn to_entries(&self) -> Vec<Entry<T>> {
        let mut ordered: Vec<&Stored<T>> = self.items.iter().collect();
        ordered.sort_by_key(|stored| stored.position);
        ordered
            .into_iter()
            .map(|stored| Entry::persisted(stored.id, stored.item.clone()))
            .collect()
    }
}

impl<T: Clone> Default for Snapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}
