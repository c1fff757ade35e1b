use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use chrono::{Local, Utc};
use notify_rust::Notification;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use utter_core::config::{self, Config};
use utter_core::i18n;
use utter_core::normalize::Normalizer;
use utter_core::prefs::{Handedness, Language, Preferences, ThemeMode};
use utter_core::reminder::{self, Notifier};
use utter_core::store::TaskStore;
use utter_core::task::TaskDraft;

use crate::cli::{Command, GlobalCli, PrefsAction};
use crate::render::{Renderer, short_id};

/// Owns the whole persisted process state: store plus preferences, loaded
/// once at startup, written back through their own operations.
pub struct App {
    cfg: Config,
    data_dir: PathBuf,
    store: TaskStore,
    prefs: Preferences,
}

/// Single-flight guard on the submission path: while one normalization is
/// outstanding, further submissions are rejected, not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Submission {
    Idle,
    Submitting,
}

struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) -> anyhow::Result<()> {
        Notification::new()
            .summary(title)
            .body(body)
            .appname("utter")
            .icon("task-due")
            .show()
            .context("desktop notification failed")?;
        Ok(())
    }

    fn chime(&self) {
        // Terminal bell stands in for the original audio cue.
        print!("\x07");
        let _ = std::io::stdout().flush();
    }
}

impl App {
    #[tracing::instrument(skip(cli))]
    pub fn open(cli: &GlobalCli) -> anyhow::Result<Self> {
        let cfg = Config::load(cli.config.as_deref())?;
        let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
            .context("failed to resolve data directory")?;
        let store = TaskStore::open(&data_dir)
            .with_context(|| format!("failed to open task store at {}", data_dir.display()))?;
        let prefs = Preferences::load(&data_dir);

        Ok(Self {
            cfg,
            data_dir,
            store,
            prefs,
        })
    }

    pub async fn run(mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Add { text } => self.cmd_add(text).await,
            Command::List => self.cmd_list(),
            Command::Done { id } => self.cmd_done(&id),
            Command::Rm { id } => self.cmd_rm(&id),
            Command::Watch => self.cmd_watch().await,
            Command::Prefs { action } => self.cmd_prefs(action),
        }
    }

    async fn cmd_add(&mut self, text: Vec<String>) -> anyhow::Result<()> {
        let normalizer = Normalizer::from_config(&self.cfg)?;
        let input = text.join(" ");
        let drafts = normalizer
            .normalize(&input, Local::now().naive_local())
            .await?;
        self.apply_drafts(drafts)
    }

    fn apply_drafts(&mut self, drafts: Vec<TaskDraft>) -> anyhow::Result<()> {
        let labels = i18n::labels(self.prefs.lang);
        if drafts.is_empty() {
            println!("{}", labels.nothing_recognized);
            return Ok(());
        }

        let created = self.store.add(drafts, Utc::now())?;
        for task in created {
            println!("Created task {} ({}).", short_id(task), task.summary);
        }
        Ok(())
    }

    fn cmd_list(&self) -> anyhow::Result<()> {
        let renderer = Renderer::new(&self.cfg)?;
        let labels = i18n::labels(self.prefs.lang);
        println!("{}", labels.log_title);
        renderer.print_task_table(
            self.store.all(),
            self.prefs.lang,
            labels,
            Local::now().naive_local(),
        )
    }

    fn cmd_done(&mut self, prefix: &str) -> anyhow::Result<()> {
        let Some(id) = self.store.find_by_prefix(prefix).map(|t| t.id) else {
            return Err(anyhow!("no unique task matches '{prefix}'"));
        };
        self.store.toggle_complete(id)?;
        let completed = self
            .store
            .all()
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.completed)
            .unwrap_or(false);
        println!(
            "Task {} marked {}.",
            &id.simple().to_string()[..8],
            if completed { "complete" } else { "incomplete" }
        );
        Ok(())
    }

    fn cmd_rm(&mut self, prefix: &str) -> anyhow::Result<()> {
        let Some(id) = self.store.find_by_prefix(prefix).map(|t| t.id) else {
            return Err(anyhow!("no unique task matches '{prefix}'"));
        };
        self.store.delete(id)?;
        println!("Task {} deleted.", &id.simple().to_string()[..8]);
        Ok(())
    }

    /// The interactive coordinator: one owning loop over stdin utterances,
    /// the reminder tick, and in-flight normalization results. Everything
    /// that mutates the store happens here, in one task.
    async fn cmd_watch(&mut self) -> anyhow::Result<()> {
        let normalizer = Normalizer::from_config(&self.cfg)?;
        let notifier = DesktopNotifier;
        let window = self.cfg.reminder_window();
        let labels = i18n::labels(self.prefs.lang);

        let mut tick = tokio::time::interval(self.cfg.reminder_interval());
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        let (tx, mut rx) = mpsc::channel::<Vec<TaskDraft>>(1);
        let mut submission = Submission::Idle;

        println!("{} (type a task, Ctrl-C to quit)", labels.title);
        info!(
            interval_secs = self.cfg.reminder_interval().as_secs(),
            window_secs = window.num_seconds(),
            "watch loop started"
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    // Teardown discards any in-flight result: the receiver
                    // drops with the loop, so the store is never touched.
                    info!("watch loop stopped");
                    break;
                }

                _ = tick.tick() => {
                    let now = Local::now().naive_local();
                    reminder::run_sweep(&mut self.store, &notifier, now, window)?;
                }

                Some(drafts) = rx.recv() => {
                    submission = Submission::Idle;
                    self.apply_drafts(drafts)?;
                }

                line = lines.next_line() => {
                    let Some(text) = line? else {
                        debug!("stdin closed");
                        break;
                    };
                    let text = text.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    if submission == Submission::Submitting {
                        println!("{}", labels.processing);
                        continue;
                    }

                    submission = Submission::Submitting;
                    let normalizer = normalizer.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let now = Local::now().naive_local();
                        let drafts = match normalizer.normalize(&text, now).await {
                            Ok(drafts) => drafts,
                            Err(err) => {
                                warn!(error = %err, "submission rejected");
                                vec![]
                            }
                        };
                        let _ = tx.send(drafts).await;
                    });
                }
            }
        }

        Ok(())
    }

    fn cmd_prefs(&mut self, action: Option<PrefsAction>) -> anyhow::Result<()> {
        match action {
            None => {
                println!("theme      {}", self.prefs.theme.as_str());
                println!("lang       {}", self.prefs.lang.as_str());
                println!("handedness {}", self.prefs.handedness.as_str());
            }
            Some(PrefsAction::Theme { value }) => {
                self.prefs.theme = match value {
                    Some(value) => ThemeMode::parse(&value)
                        .ok_or_else(|| anyhow!("unknown theme '{value}' (day|night)"))?,
                    None => self.prefs.theme.toggled(),
                };
                self.prefs.save_theme(&self.data_dir)?;
                println!("theme set to {}", self.prefs.theme.as_str());
            }
            Some(PrefsAction::Lang { value }) => {
                self.prefs.lang = match value {
                    Some(value) => Language::parse(&value)
                        .ok_or_else(|| anyhow!("unknown language '{value}' (en|zh)"))?,
                    None => self.prefs.lang.toggled(),
                };
                self.prefs.save_lang(&self.data_dir)?;
                println!("lang set to {}", self.prefs.lang.as_str());
            }
            Some(PrefsAction::Hand { value }) => {
                self.prefs.handedness = match value {
                    Some(value) => Handedness::parse(&value)
                        .ok_or_else(|| anyhow!("unknown handedness '{value}' (left|right)"))?,
                    None => self.prefs.handedness.toggled(),
                };
                self.prefs.save_handedness(&self.data_dir)?;
                println!("handedness set to {}", self.prefs.handedness.as_str());
            }
        }
        Ok(())
    }
}
