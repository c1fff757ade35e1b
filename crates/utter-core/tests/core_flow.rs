use chrono::{Duration, Utc};
use tempfile::tempdir;
use utter_core::normalize::parse_drafts;
use utter_core::reminder::{self, Notifier};
use utter_core::store::TaskStore;
use utter_core::task::{Category, Priority};

struct CountingNotifier(std::cell::Cell<usize>);

impl Notifier for CountingNotifier {
    fn notify(&self, _title: &str, _body: &str) -> anyhow::Result<()> {
        self.0.set(self.0.get() + 1);
        Ok(())
    }
}

#[test]
fn drafts_flow_from_payload_to_persisted_reminders() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(temp.path()).expect("open store");

    let content = r#"{"tasks":[
        {"summary":"Finish report","dueDateTime":"2024-01-01T19:00:00",
         "description":"quarterly numbers","category":"work","priority":"high"},
        {"summary":"Water plants","dueDateTime":null,
         "description":null,"category":"chores","priority":"low"}]}"#;

    let drafts = parse_drafts(content);
    assert_eq!(drafts.len(), 2);

    let created = store.add(drafts, Utc::now()).expect("add drafts");
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].summary, "Finish report");
    assert_eq!(created[0].priority, Priority::High);
    assert_eq!(
        created[1].category,
        Category::Other("chores".to_string())
    );

    // Reload reproduces the identical ordered collection.
    let persisted = TaskStore::open(temp.path()).expect("reopen store");
    assert_eq!(persisted.all(), store.all());

    // One minute past due: selected, alerted once, acknowledged in batch.
    let now = utter_core::datetime::parse_local_naive("2024-01-01T19:01:00").expect("now");
    let notifier = CountingNotifier(std::cell::Cell::new(0));
    let alerted =
        reminder::run_sweep(&mut store, &notifier, now, Duration::seconds(300)).expect("sweep");
    assert_eq!(alerted, 1);
    assert_eq!(notifier.0.get(), 1);

    // The acknowledgement survives a reload; nothing re-fires.
    let mut reloaded = TaskStore::open(temp.path()).expect("reopen store");
    let again =
        reminder::run_sweep(&mut reloaded, &notifier, now, Duration::seconds(300)).expect("sweep");
    assert_eq!(again, 0);
    assert_eq!(notifier.0.get(), 1);
}
