//! Groups dated records by day for per-cell lookup.

use std::collections::HashMap;
use std::fmt;

use crate::datetime::DateKey;

/// Label shown for the bucket of records without a date.
pub const UNSCHEDULED_LABEL: &str = "미지정";

/// Bucket identity. Dated buckets order before `Unscheduled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketKey {
    Date(DateKey),
    Unscheduled,
}

impl From<Option<DateKey>> for BucketKey {
    fn from(value: Option<DateKey>) -> Self {
        value.map_or(Self::Unscheduled, Self::Date)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(key) => write!(f, "{key}"),
            Self::Unscheduled => f.write_str(UNSCHEDULED_LABEL),
        }
    }
}

/// A record with a primary calendar day.
pub trait Dated {
    fn date_key(&self) -> Option<DateKey>;
}

impl<T: Dated + ?Sized> Dated for &T {
    fn date_key(&self) -> Option<DateKey> {
        (**self).date_key()
    }
}

#[derive(Debug, Clone)]
pub struct DateBuckets<T> {
    buckets: HashMap<BucketKey, Vec<T>>,
    total: usize,
}

impl<T> Default for DateBuckets<T> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
            total: 0,
        }
    }
}

impl<T> DateBuckets<T> {
    pub fn push(&mut self, key: BucketKey, record: T) {
        self.buckets.entry(key).or_default().push(record);
        self.total += 1;
    }

    /// Records on `key`, in input order. Empty when the day has none.
    pub fn get(&self, key: &DateKey) -> &[T] {
        self.bucket(&BucketKey::Date(*key))
    }

    pub fn unscheduled(&self) -> &[T] {
        self.bucket(&BucketKey::Unscheduled)
    }

    pub fn bucket(&self, key: &BucketKey) -> &[T] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of non-empty buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.total
    }

    /// Buckets by ascending date, unscheduled last.
    pub fn in_display_order(&self) -> Vec<(BucketKey, &[T])> {
        let mut keys: Vec<BucketKey> = self.buckets.keys().copied().collect();
        keys.sort_unstable();
        keys.into_iter()
            .map(|key| (key, self.bucket(&key)))
            .collect()
    }

    pub fn into_display_order(self) -> Vec<(BucketKey, Vec<T>)> {
        let mut groups: Vec<(BucketKey, Vec<T>)> = self.buckets.into_iter().collect();
        groups.sort_unstable_by_key(|(key, _)| *key);
        groups
    }
}

/// Buckets `records` by the day `date_of` returns, `None` meaning unscheduled.
pub fn bucket_by_date<T, I, F>(records: I, date_of: F) -> DateBuckets<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> Option<DateKey>,
{
    let mut buckets = DateBuckets::default();
    for record in records {
        let key = BucketKey::from(date_of(&record));
        buckets.push(key, record);
    }
    buckets
}

pub fn bucket_records<T, I>(records: I) -> DateBuckets<T>
where
    T: Dated,
    I: IntoIterator<Item = T>,
{
    bucket_by_date(records, T::date_key)
}

#[cfg(test)]
mod tests {
    use super::{BucketKey, Dated, bucket_by_date, bucket_records};
    use crate::datetime::DateKey;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: &'static str,
        due: Option<&'static str>,
    }

    impl Dated for Item {
        fn date_key(&self) -> Option<DateKey> {
            self.due.and_then(|raw| raw.parse().ok())
        }
    }

    fn item(name: &'static str, due: Option<&'static str>) -> Item {
        Item { name, due }
    }

    fn key(raw: &str) -> DateKey {
        raw.parse().expect("valid key")
    }

    #[test]
    fn groups_same_day_in_input_order() {
        let entries = vec![
            item("a", Some("2024-02-01")),
            item("b", Some("2024-02-01")),
            item("c", Some("2024-02-03")),
        ];
        let buckets = bucket_records(&entries);

        let names: Vec<_> = buckets.get(&key("2024-02-01")).iter().map(|i| i.name).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(buckets.get(&key("2024-02-03")).len(), 1);
        assert!(buckets.get(&key("2024-02-02")).is_empty());
        assert_eq!(buckets.len(), 2);
    }

    #[test]
    fn undated_records_go_last() {
        let tasks = vec![
            item("x", None),
            item("y", Some("2024-02-05")),
            item("z", None),
        ];
        let buckets = bucket_records(tasks.clone());

        let unscheduled: Vec<_> = buckets.unscheduled().iter().map(|i| i.name).collect();
        assert_eq!(unscheduled, ["x", "z"]);
        assert_eq!(buckets.get(&key("2024-02-05"))[0].name, "y");

        let order: Vec<BucketKey> = buckets.in_display_order().into_iter().map(|(k, _)| k).collect();
        assert_eq!(order, [BucketKey::Date(key("2024-02-05")), BucketKey::Unscheduled]);
        assert_eq!(BucketKey::Unscheduled.to_string(), "미지정");
    }

    #[test]
    fn nothing_dropped_or_duplicated() {
        let days = ["2024-03-02", "2024-01-09", "2024-03-02", "2023-12-31"];
        let items: Vec<Item> = (0..40)
            .map(|i| item("n", if i % 5 == 0 { None } else { Some(days[i % days.len()]) }))
            .collect();
        let buckets = bucket_records(&items);

        assert_eq!(buckets.total_records(), items.len());
        let flattened: usize = buckets.in_display_order().iter().map(|(_, v)| v.len()).sum();
        assert_eq!(flattened, items.len());

        let keys: Vec<BucketKey> = buckets.into_display_order().into_iter().map(|(k, _)| k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.last(), Some(&BucketKey::Unscheduled));
    }

    #[test]
    fn accessor_form_accepts_any_field() {
        let pairs = vec![(1, "2024-02-01"), (2, "bad"), (3, "2024-02-01")];
        let buckets = bucket_by_date(pairs, |(_, raw)| raw.parse().ok());
        let ids: Vec<_> = buckets.get(&key("2024-02-01")).iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, [1, 3]);
        assert_eq!(buckets.unscheduled().len(), 1);
    }
}
