//! Sort keys and ordering rules.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Comparable value produced by a key selector.
///
/// Values of different kinds order by kind (`Null` first), so a selector that
/// mixes kinds still yields a total order.
#[derive(Debug, Clone)]
pub enum SortKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Null => 0,
            SortKey::Bool(_) => 1,
            SortKey::Int(_) | SortKey::Float(_) => 2,
            SortKey::Text(_) => 3,
            SortKey::Uuid(_) => 4,
            SortKey::DateTime(_) => 5,
        }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            (SortKey::Int(a), SortKey::Int(b)) => a.cmp(b),
            (SortKey::Float(a), SortKey::Float(b)) => a.total_cmp(b),
            (SortKey::Int(a), SortKey::Float(b)) => (*a as f64).total_cmp(b),
            (SortKey::Float(a), SortKey::Int(b)) => a.total_cmp(&(*b as f64)),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Uuid(a), SortKey::Uuid(b)) => a.cmp(b),
            (SortKey::DateTime(a), SortKey::DateTime(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

macro_rules! sort_key_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for SortKey {
                fn from(value: $ty) -> Self {
                    SortKey::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

sort_key_from! {
    bool => Bool,
    i32 => Int as i64,
    i64 => Int,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float,
    String => Text,
    Uuid => Uuid,
    DateTime<Utc> => DateTime,
}

impl From<&str> for SortKey {
    fn from(value: &str) -> Self {
        SortKey::Text(value.to_string())
    }
}

impl From<u64> for SortKey {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(SortKey::Int)
            .unwrap_or(SortKey::Float(value as f64))
    }
}

impl<T: Into<SortKey>> From<Option<T>> for SortKey {
    fn from(value: Option<T>) -> Self {
        value.map_or(SortKey::Null, Into::into)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

pub(crate) type KeySelector<T> = Arc<dyn Fn(&T) -> SortKey + Send + Sync>;

/// One ordering rule: key selector plus direction.
pub struct OrderBy<T> {
    key: KeySelector<T>,
    direction: Direction,
}

impl<T> OrderBy<T> {
    pub fn new<K, F>(key: F, direction: Direction) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        K: Into<SortKey>,
    {
        Self {
            key: Arc::new(move |item| key(item).into()),
            direction,
        }
    }

    pub(crate) fn from_selector(key: KeySelector<T>, direction: Direction) -> Self {
        Self { key, direction }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        let ordering = (self.key)(a).cmp(&(self.key)(b));
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

impl<T> Clone for OrderBy<T> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            direction: self.direction,
        }
    }
}

impl<T> fmt::Debug for OrderBy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderBy")
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

/// Named key selectors that caller-supplied sort strings map onto.
///
/// Accepted forms: `name`, `nameAsc`, `name_asc`, `-name`, `nameDesc`,
/// `name_desc` (names compare case-insensitively).
pub struct SortMap<T> {
    keys: HashMap<String, KeySelector<T>>,
}

impl<T> SortMap<T> {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    pub fn key<K, F>(mut self, name: &str, key: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        K: Into<SortKey>,
    {
        self.keys
            .insert(name.to_lowercase(), Arc::new(move |item| key(item).into()));
        self
    }

    /// Resolve a sort string; `None` for unknown keys.
    pub fn resolve(&self, sort: &str) -> Option<OrderBy<T>> {
        let sort = sort.trim().to_lowercase();
        let (name, direction) = if let Some(rest) = sort.strip_prefix('-') {
            (rest, Direction::Descending)
        } else if let Some(rest) = sort
            .strip_suffix("_desc")
            .or_else(|| sort.strip_suffix("desc"))
        {
            (rest, Direction::Descending)
        } else if let Some(rest) = sort
            .strip_suffix("_asc")
            .or_else(|| sort.strip_suffix("asc"))
        {
            (rest, Direction::Ascending)
        } else {
            (sort.as_str(), Direction::Ascending)
        };

        self.keys
            .get(name)
            .map(|key| OrderBy::from_selector(Arc::clone(key), direction))
    }
}

impl<T> Default for SortMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
