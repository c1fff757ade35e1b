use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::task::{Task, TaskDraft};

const TASKS_FILE: &str = "tasks.data";

/// Owns the ordered task collection, newest first. All mutation goes
/// through these operations; every one rewrites the full collection.
#[derive(Debug)]
pub struct TaskStore {
    pub data_dir: PathBuf,
    tasks_path: PathBuf,
    tasks: Vec<Task>,
}

impl TaskStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join(TASKS_FILE);
        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }

        // Corrupt state is discarded, not propagated: the store always opens.
        let tasks = match load_jsonl(&tasks_path) {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %err, file = %tasks_path.display(), "discarding unreadable task data");
                vec![]
            }
        };

        info!(
            data_dir = %data_dir.display(),
            count = tasks.len(),
            "opened task store"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            tasks,
        })
    }

    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    /// Prepends one task per draft, preserving draft order at the head,
    /// and returns the freshly created records.
    #[tracing::instrument(skip(self, drafts))]
    pub fn add(&mut self, drafts: Vec<TaskDraft>, now: DateTime<Utc>) -> anyhow::Result<&[Task]> {
        let mut fresh: Vec<Task> = drafts
            .into_iter()
            .map(|draft| Task::from_draft(draft, now))
            .collect();
        let count = fresh.len();

        fresh.append(&mut self.tasks);
        self.tasks = fresh;
        self.save()?;

        debug!(added = count, total = self.tasks.len(), "tasks added");
        Ok(&self.tasks[..count])
    }

    /// No-op (returns false) when the id is unknown.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn toggle_complete(&mut self, id: Uuid) -> anyhow::Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!("toggle on unknown id ignored");
            return Ok(false);
        };
        task.completed = !task.completed;
        self.save()?;
        Ok(true)
    }

    /// No-op (returns false) when the id is unknown.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete(&mut self, id: Uuid) -> anyhow::Result<bool> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            debug!("delete on unknown id ignored");
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Batched reminder acknowledgement: one write covers all ids.
    /// `reminder_sent` is monotonic; this never clears it.
    #[tracing::instrument(skip(self, ids))]
    pub fn mark_reminded(&mut self, ids: &[Uuid]) -> anyhow::Result<usize> {
        let mut changed = 0;
        for task in self.tasks.iter_mut() {
            if ids.contains(&task.id) && !task.reminder_sent {
                task.reminder_sent = true;
                changed += 1;
            }
        }
        if changed > 0 {
            self.save()?;
        }
        Ok(changed)
    }

    /// Resolves a unique uuid prefix to a task; ambiguous or unknown
    /// prefixes resolve to nothing.
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&Task> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return None;
        }
        let mut matches = self
            .tasks
            .iter()
            .filter(|t| t.id.simple().to_string().starts_with(&prefix));
        let first = matches.next()?;
        if matches.next().is_some() {
            None
        } else {
            Some(first)
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, &self.tasks)
            .with_context(|| format!("failed to save {}", self.tasks_path.display()))
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::Utc;
    use tempfile::tempdir;

    use super::TaskStore;
    use crate::task::{Category, Priority, TaskDraft};

    fn draft(summary: &str) -> TaskDraft {
        TaskDraft {
            summary: summary.to_string(),
            due: None,
            description: None,
            category: Category::Misc,
            priority: Priority::Medium,
        }
    }

    #[test]
    fn add_prepends_newest_first() {
        let temp = tempdir().expect("tempdir");
        let mut store = TaskStore::open(temp.path()).expect("open");
        let now = Utc::now();

        store.add(vec![draft("first")], now).expect("add");
        store
            .add(vec![draft("second"), draft("third")], now)
            .expect("add");

        let summaries: Vec<&str> = store.all().iter().map(|t| t.summary.as_str()).collect();
        assert_eq!(summaries, vec!["second", "third", "first"]);
    }

    #[test]
    fn double_toggle_restores_original_state() {
        let temp = tempdir().expect("tempdir");
        let mut store = TaskStore::open(temp.path()).expect("open");
        store.add(vec![draft("flip me")], Utc::now()).expect("add");
        let id = store.all()[0].id;

        assert!(store.toggle_complete(id).expect("toggle"));
        assert!(store.all()[0].completed);
        assert!(store.toggle_complete(id).expect("toggle"));
        assert!(!store.all()[0].completed);
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let temp = tempdir().expect("tempdir");
        let mut store = TaskStore::open(temp.path()).expect("open");
        store.add(vec![draft("keep me")], Utc::now()).expect("add");

        let stranger = uuid::Uuid::new_v4();
        assert!(!store.toggle_complete(stranger).expect("toggle"));
        assert!(!store.delete(stranger).expect("delete"));
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn reload_reproduces_identical_ordered_collection() {
        let temp = tempdir().expect("tempdir");
        let now = Utc::now();
        let original = {
            let mut store = TaskStore::open(temp.path()).expect("open");
            let mut due_draft = draft("with due");
            due_draft.due = crate::datetime::parse_local_naive("2024-06-01T09:00:00");
            due_draft.category = Category::Other("errands".to_string());
            store
                .add(vec![due_draft, draft("plain")], now)
                .expect("add");
            store.all().to_vec()
        };

        let reloaded = TaskStore::open(temp.path()).expect("reopen");
        assert_eq!(reloaded.all(), original.as_slice());
    }

    #[test]
    fn corrupt_file_falls_back_to_empty() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("tasks.data"), "{not json at all").expect("write");

        let store = TaskStore::open(temp.path()).expect("open");
        assert!(store.all().is_empty());
    }

    #[test]
    fn prefix_lookup_requires_uniqueness() {
        let temp = tempdir().expect("tempdir");
        let mut store = TaskStore::open(temp.path()).expect("open");
        store.add(vec![draft("target")], Utc::now()).expect("add");
        let id = store.all()[0].id.simple().to_string();

        assert!(store.find_by_prefix(&id[..8]).is_some());
        assert!(store.find_by_prefix("").is_none());
        assert!(store.find_by_prefix("zzzzzzzz").is_none());
    }
}
