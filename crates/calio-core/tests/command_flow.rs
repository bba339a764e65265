use calio_core::cli::{Command, GlobalCli};
use calio_core::commands::{Env, dispatch};
use calio_core::config::Config;
use calio_core::datastore::JsonlStore;
use calio_core::render::Renderer;
use calio_core::session::SessionStore;
use chrono::{TimeZone, Utc};
use clap::Parser;
use tempfile::{TempDir, tempdir};

struct Harness {
    _temp: TempDir,
    store: JsonlStore,
    sessions: SessionStore,
    cfg: Config,
    renderer: Renderer,
}

impl Harness {
    fn new() -> Self {
        let temp = tempdir().expect("tempdir");
        let store = JsonlStore::open(temp.path()).expect("open datastore");
        let sessions = SessionStore::open(temp.path()).expect("open sessions");
        Self {
            _temp: temp,
            store,
            sessions,
            cfg: Config::defaults(),
            renderer: Renderer::plain(),
        }
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<String> {
        let mut argv = vec!["calio"];
        argv.extend_from_slice(args);
        let command: Option<Command> = GlobalCli::try_parse_from(argv)?.command;

        let mut out = Vec::new();
        let mut env = Env {
            store: &self.store,
            sessions: &self.sessions,
            cfg: &self.cfg,
            renderer: &self.renderer,
            out: &mut out,
            // 2024-02-14 09:00 in Seoul
            now: Utc
                .with_ymd_and_hms(2024, 2, 14, 0, 0, 0)
                .single()
                .expect("valid instant"),
        };
        dispatch(&mut env, command)?;
        Ok(String::from_utf8(out).expect("utf8 output"))
    }
}

#[test]
fn commands_require_login_except_month() {
    let h = Harness::new();
    let err = h.run(&["tasks"]).expect_err("tasks needs a session");
    assert!(err.to_string().contains("calio login"));

    let month = h.run(&["month", "2024-02"]).expect("month without login");
    assert!(month.starts_with("2024년 2월"));

    assert_eq!(h.run(&["whoami"]).expect("whoami"), "Not signed in.\n");
}

#[test]
fn month_and_day_show_recorded_items() {
    let h = Harness::new();
    h.run(&["login", "me@example.com"]).expect("login");
    h.run(&["category", "add", "일상"]).expect("category");
    h.run(&["entry", "add", "떡국", "--category", "일상", "--date", "2024-02-10"])
        .expect("entry");
    h.run(&["event", "add", "설날", "--date", "2024-02-10", "--type", "anniv"])
        .expect("event");
    h.run(&["task", "add", "세배", "--due", "2024-02-10"]).expect("task");

    let month = h.run(&[]).expect("default month");
    assert!(month.starts_with("2024년 2월  음력 12월 - 1월"));
    assert!(month.contains("10 (1/1)"));
    assert!(month.contains("설날"));
    assert!(month.contains("세배"));
    assert!(month.contains("일상"));

    let day = h.run(&["day", "2024-02-10"]).expect("day");
    assert!(day.contains("음력 2024(갑진)년 1월 1일"));
    assert!(day.contains("[기념일] 설날"));
    assert!(day.contains("[일상] 일상: 떡국"));
    assert!(day.contains("[ ] 세배"));
}

#[test]
fn task_lifecycle_by_id_prefix() {
    let h = Harness::new();
    h.run(&["login", "me@example.com"]).expect("login");
    let created = h.run(&["task", "add", "장보기", "--due", "tomorrow"]).expect("task add");
    h.run(&["task", "add", "언젠가"]).expect("unscheduled task");

    let prefix = created
        .trim_end_matches(".\n")
        .rsplit(' ')
        .next()
        .expect("short id")
        .to_string();
    assert_eq!(prefix.len(), 8);

    h.run(&["task", "done", &prefix]).expect("done");
    let grouped = h.run(&["tasks"]).expect("tasks");
    let dated = grouped.find("2024-02-15").expect("due heading");
    let unscheduled = grouped.find("미지정").expect("unscheduled heading");
    assert!(dated < unscheduled);
    assert!(grouped.contains("[x] 장보기"));

    h.run(&["task", "undo", &prefix]).expect("undo");
    h.run(&["task", "rm", &prefix]).expect("rm");
    let err = h.run(&["task", "done", &prefix]).expect_err("deleted task is gone");
    assert!(err.to_string().contains("not found"));
}

#[test]
fn other_users_see_nothing() {
    let h = Harness::new();
    h.run(&["login", "me@example.com"]).expect("login");
    h.run(&["task", "add", "비밀"]).expect("task");
    h.run(&["login", "you@example.com"]).expect("switch user");
    let listing = h.run(&["task", "list"]).expect("list");
    assert!(!listing.contains("비밀"));
}

#[test]
fn oversized_task_window_is_an_error() {
    let mut h = Harness::new();
    h.cfg.apply_overrides([(
        "tasks.window_days".to_string(),
        "999999999999999".to_string(),
    )]);
    h.run(&["login", "me@example.com"]).expect("login");
    let err = h.run(&["tasks"]).expect_err("window past the calendar");
    assert!(err.to_string().contains("tasks.window_days"));

    assert!(h.run(&["task", "add", "x", "--due", "+999999999999d"]).is_err());
}
