use calio_core::bucket::{BucketKey, bucket_records};
use calio_core::datastore::{JsonlStore, Store};
use calio_core::datetime::{DateKey, DateRange};
use calio_core::model::{
    CategoryPatch, EntryPatch, EventType, NewCategory, NewEntry, NewEvent, NewTask, TaskPatch,
};
use calio_core::session::SessionStore;
use chrono::{NaiveTime, TimeZone, Utc};
use tempfile::tempdir;

fn key(raw: &str) -> DateKey {
    raw.parse().expect("valid key")
}

fn range(start: &str, end: &str) -> DateRange {
    DateRange::new(key(start), key(end))
}

fn new_event(title: &str, date: &str, time: Option<(u32, u32)>) -> NewEvent {
    let start_time = time.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).expect("valid time"));
    NewEvent {
        event_type: EventType::Appointment,
        title: title.to_string(),
        content: None,
        category_id: None,
        calendar_kind: Default::default(),
        is_recurring_yearly: false,
        solar_date: key(date),
        start_time,
        is_all_day: start_time.is_none(),
    }
}

#[test]
fn records_are_scoped_ordered_and_soft_deleted() {
    let temp = tempdir().expect("tempdir");
    let sessions = SessionStore::open(temp.path()).expect("open sessions");
    let store = JsonlStore::open(temp.path()).expect("open datastore");

    let me = sessions.login("me@example.com", Utc::now()).expect("login me");
    let other = sessions.login("other@example.com", Utc::now()).expect("login other");

    let life = store
        .create_category(
            &me,
            NewCategory {
                name: "일상".to_string(),
                color_bg: "#E9D5FF".to_string(),
                color_text: "#111827".to_string(),
                sort_order: Some(2),
            },
        )
        .expect("create category");
    let work = store
        .create_category(
            &me,
            NewCategory {
                name: "업무".to_string(),
                sort_order: Some(1),
                ..NewCategory::default()
            },
        )
        .expect("create second category");

    let names: Vec<_> = store
        .fetch_categories(&me)
        .expect("fetch categories")
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["업무", "일상"]);
    assert!(store.fetch_categories(&other).expect("other categories").is_empty());

    let later = store
        .create_entry(
            &me,
            NewEntry {
                entry_date: key("2024-02-14"),
                category_id: life.id,
                title: None,
                content: "저녁".to_string(),
                occurred_at: Some(Utc.with_ymd_and_hms(2024, 2, 14, 11, 0, 0).single().expect("valid instant")),
            },
        )
        .expect("create entry");
    store
        .create_entry(
            &me,
            NewEntry {
                entry_date: key("2024-02-14"),
                category_id: work.id,
                title: Some("회의".to_string()),
                content: "아침".to_string(),
                occurred_at: Some(Utc.with_ymd_and_hms(2024, 2, 14, 0, 0, 0).single().expect("valid instant")),
            },
        )
        .expect("create earlier entry");

    let feb = range("2024-02-01", "2024-02-29");
    let contents: Vec<_> = store
        .fetch_entries_by_range(&me, feb)
        .expect("fetch entries")
        .into_iter()
        .map(|e| e.content)
        .collect();
    assert_eq!(contents, ["아침", "저녁"]);

    assert!(store.fetch_entry(&other, later.id).is_err());
    let err = store
        .delete_entry(&other, later.id)
        .expect_err("other user cannot delete");
    assert!(err.to_string().contains("not found"));

    let moved = store
        .update_entry(
            &me,
            later.id,
            EntryPatch {
                entry_date: Some(key("2024-03-01")),
                ..EntryPatch::default()
            },
        )
        .expect("move entry");
    assert_eq!(moved.entry_date, key("2024-03-01"));
    assert_eq!(store.fetch_entries_by_range(&me, feb).expect("fetch").len(), 1);

    store.delete_entry(&me, later.id).expect("delete entry");
    assert!(store.fetch_entry(&me, later.id).is_err());
    assert!(store.delete_entry(&me, later.id).is_err());

    store
        .deactivate_category(&me, life.id)
        .expect("deactivate category");
    assert_eq!(store.fetch_categories(&me).expect("fetch").len(), 1);
    assert!(
        store
            .update_category(&other, work.id, CategoryPatch::default())
            .is_err()
    );
}

#[test]
fn events_put_untimed_last_within_a_day() {
    let temp = tempdir().expect("tempdir");
    let sessions = SessionStore::open(temp.path()).expect("open sessions");
    let store = JsonlStore::open(temp.path()).expect("open datastore");
    let me = sessions.login("me@example.com", Utc::now()).expect("login");

    store.create_event(&me, new_event("점심", "2024-05-05", Some((12, 0)))).expect("event");
    store.create_event(&me, new_event("어린이날", "2024-05-05", None)).expect("event");
    store.create_event(&me, new_event("아침", "2024-05-05", Some((8, 30)))).expect("event");
    store.create_event(&me, new_event("전날", "2024-05-04", Some((23, 0)))).expect("event");
    assert!(store.create_event(&me, new_event("  ", "2024-05-05", None)).is_err());

    let titles: Vec<_> = store
        .fetch_events_by_range(&me, range("2024-05-01", "2024-05-31"))
        .expect("fetch events")
        .into_iter()
        .map(|e| e.title)
        .collect();
    assert_eq!(titles, ["전날", "아침", "점심", "어린이날"]);
}

#[test]
fn task_window_includes_unscheduled_and_buckets_last() {
    let temp = tempdir().expect("tempdir");
    let sessions = SessionStore::open(temp.path()).expect("open sessions");
    let store = JsonlStore::open(temp.path()).expect("open datastore");
    let me = sessions.login("me@example.com", Utc::now()).expect("login");

    let task = |title: &str, due: Option<&str>| NewTask {
        title: title.to_string(),
        notes: None,
        due_date: due.map(key),
    };
    store.create_task(&me, task("someday", None)).expect("task");
    let late = store.create_task(&me, task("late", Some("2024-02-20"))).expect("task");
    store.create_task(&me, task("early", Some("2024-02-02"))).expect("task");
    store.create_task(&me, task("outside", Some("2024-04-01"))).expect("task");

    let tasks = store
        .fetch_tasks_by_range(&me, range("2024-02-01", "2024-02-29"))
        .expect("fetch tasks");
    let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["early", "late", "someday"]);

    let buckets = bucket_records(&tasks);
    let order: Vec<_> = buckets.in_display_order().into_iter().map(|(k, _)| k).collect();
    assert_eq!(
        order,
        [
            BucketKey::Date(key("2024-02-02")),
            BucketKey::Date(key("2024-02-20")),
            BucketKey::Unscheduled,
        ]
    );

    let done = store
        .update_task(
            &me,
            late.id,
            TaskPatch {
                is_done: Some(true),
                due_date: Some(None),
                ..TaskPatch::default()
            },
        )
        .expect("complete task");
    assert!(done.is_done);
    assert_eq!(done.due_date, None);

    store.delete_task(&me, late.id).expect("delete task");
    assert_eq!(store.fetch_task(&me, late.id).map(|t| t.id).ok(), None);
}
