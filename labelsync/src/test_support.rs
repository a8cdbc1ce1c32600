//! In-memory collaborators for tests.
//!
//! Each fake records what it was asked to do so tests can assert on calls as
//! well as outcomes.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};

use anyhow::{Result, anyhow};

use crate::core::cursor::{Position, is_after};
use crate::core::types::{ItemSnapshot, LabelState, MoveEvent, PageStatus};
use crate::io::checkpoint::CheckpointStore;
use crate::io::config::{Config, EditionProfile};
use crate::io::confirm::Confirmer;
use crate::io::journal::Journal;
use crate::io::wiki::{EventFeed, MoveEvents, PageDirectory};
use crate::io::wikibase::ItemStore;

/// Profile for one of the built-in editions.
pub fn profile(edition: &str) -> EditionProfile {
    Config::default()
        .profile(edition)
        .expect("built-in edition")
}

/// Item snapshot with the given label and aliases.
pub fn item(id: &str, label: Option<&str>, aliases: &[&str]) -> ItemSnapshot {
    ItemSnapshot {
        id: id.to_string(),
        state: LabelState {
            label: label.map(str::to_string),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        },
    }
}

/// Move event in the article namespace.
pub fn move_event(log_id: u64, timestamp: &str, source: &str, target: &str) -> MoveEvent {
    MoveEvent {
        log_id,
        timestamp: timestamp.to_string(),
        source: source.to_string(),
        target: target.to_string(),
        target_namespace: 0,
    }
}

/// Wiki with a move log and a page table. Unknown pages are missing.
#[derive(Default)]
pub struct FakeWiki {
    pages: RefCell<BTreeMap<String, PageStatus>>,
    events: RefCell<Vec<MoveEvent>>,
    fail_feed_at: Cell<Option<usize>>,
}

impl FakeWiki {
    pub fn set_article(&self, title: &str) {
        self.pages
            .borrow_mut()
            .insert(title.to_string(), PageStatus::Article);
    }

    /// Make `from` redirect to `to`; it then shows up in `redirects_to(to)`.
    pub fn set_redirect(&self, from: &str, to: &str) {
        self.pages.borrow_mut().insert(
            from.to_string(),
            PageStatus::Redirect {
                target: to.to_string(),
            },
        );
    }

    fn push_event(&self, event: MoveEvent) {
        self.events.borrow_mut().push(event);
    }

    /// Record a move that left a redirect behind. Log ids follow recording order.
    pub fn record_move(&self, timestamp: &str, source: &str, target: &str) {
        let log_id = self.events.borrow().len() as u64 + 1;
        self.set_redirect(source, target);
        self.set_article(target);
        self.push_event(move_event(log_id, timestamp, source, target));
    }

    /// The feed yields an error instead of the `index`-th event it would deliver.
    pub fn fail_feed_at(&self, index: usize) {
        self.fail_feed_at.set(Some(index));
    }
}

impl EventFeed for FakeWiki {
    fn move_events<'a>(&'a self, since: Option<&Position>, limit: usize) -> MoveEvents<'a> {
        let mut events: Vec<MoveEvent> = self
            .events
            .borrow()
            .iter()
            .filter(|event| is_after(since, &event.position()))
            .cloned()
            .collect();
        events.sort_by_key(MoveEvent::position);
        let fail_at = self.fail_feed_at.get();
        Box::new(
            events
                .into_iter()
                .take(limit)
                .enumerate()
                .map(move |(index, event)| {
                    if fail_at == Some(index) {
                        Err(anyhow!("move log unavailable"))
                    } else {
                        Ok(event)
                    }
                }),
        )
    }
}

impl PageDirectory for FakeWiki {
    fn page_status(&self, title: &str) -> Result<PageStatus> {
        Ok(self
            .pages
            .borrow()
            .get(title)
            .cloned()
            .unwrap_or(PageStatus::Missing))
    }

    fn redirects_to(&self, title: &str) -> Result<Vec<String>> {
        Ok(self
            .pages
            .borrow()
            .iter()
            .filter(|(_, status)| {
                matches!(status, PageStatus::Redirect { target } if target == title)
            })
            .map(|(from, _)| from.clone())
            .collect())
    }
}

/// A write received by [`FakeItemStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Label {
        item_id: String,
        value: String,
        summary: String,
    },
    Alias {
        item_id: String,
        value: String,
        summary: String,
    },
}

/// Item store keyed by linked page title. Writes update the stored items.
#[derive(Default)]
pub struct FakeItemStore {
    links: RefCell<BTreeMap<String, ItemSnapshot>>,
    writes: RefCell<Vec<Write>>,
    lookups: Cell<usize>,
    fail_writes: Cell<bool>,
    fail_next_label: Cell<bool>,
    fail_next_alias: Cell<bool>,
}

impl FakeItemStore {
    pub fn link(&self, title: &str, item: ItemSnapshot) {
        self.links.borrow_mut().insert(title.to_string(), item);
    }

    pub fn item(&self, id: &str) -> Option<ItemSnapshot> {
        self.links
            .borrow()
            .values()
            .find(|item| item.id == id)
            .cloned()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.borrow().clone()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }

    pub fn fail_writes(&self) {
        self.fail_writes.set(true);
    }

    /// Refuse the next label write only.
    pub fn fail_next_label(&self) {
        self.fail_next_label.set(true);
    }

    /// Refuse the next alias write only.
    pub fn fail_next_alias(&self) {
        self.fail_next_alias.set(true);
    }

    fn update(&self, item_id: &str, apply: impl Fn(&mut LabelState)) -> Result<()> {
        if self.fail_writes.get() {
            return Err(anyhow!("item store unavailable"));
        }
        let mut links = self.links.borrow_mut();
        let mut found = false;
        for item in links.values_mut().filter(|item| item.id == item_id) {
            apply(&mut item.state);
            found = true;
        }
        if !found {
            return Err(anyhow!("no such item {item_id}"));
        }
        Ok(())
    }
}

impl ItemStore for FakeItemStore {
    fn linked_item(&self, title: &str) -> Result<Option<ItemSnapshot>> {
        self.lookups.set(self.lookups.get() + 1);
        Ok(self.links.borrow().get(title).cloned())
    }

    fn set_label(&self, item_id: &str, label: &str, summary: &str) -> Result<()> {
        if self.fail_next_label.replace(false) {
            return Err(anyhow!("label write refused"));
        }
        self.update(item_id, |state| state.label = Some(label.to_string()))?;
        self.writes.borrow_mut().push(Write::Label {
            item_id: item_id.to_string(),
            value: label.to_string(),
            summary: summary.to_string(),
        });
        Ok(())
    }

    fn add_alias(&self, item_id: &str, alias: &str, summary: &str) -> Result<()> {
        if self.fail_next_alias.replace(false) {
            return Err(anyhow!("alias write refused"));
        }
        self.update(item_id, |state| state.aliases.push(alias.to_string()))?;
        self.writes.borrow_mut().push(Write::Alias {
            item_id: item_id.to_string(),
            value: alias.to_string(),
            summary: summary.to_string(),
        });
        Ok(())
    }
}

/// Answers confirmations from a script and records the prompts.
pub struct ScriptedConfirmer {
    answers: RefCell<VecDeque<bool>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: RefCell::new(answers.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer for {prompt:?}"))
    }
}

#[derive(Default)]
pub struct MemoryCheckpointStore {
    cursors: RefCell<BTreeMap<String, String>>,
    saves: Cell<usize>,
    fail_saves: Cell<bool>,
}

impl MemoryCheckpointStore {
    pub fn saves(&self) -> usize {
        self.saves.get()
    }

    pub fn fail_saves(&self) {
        self.fail_saves.set(true);
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cursors.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, cursor: &str) -> Result<()> {
        if self.fail_saves.get() {
            return Err(anyhow!("cursor store unavailable"));
        }
        self.saves.set(self.saves.get() + 1);
        self.cursors
            .borrow_mut()
            .insert(key.to_string(), cursor.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.cursors.borrow_mut().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryJournal {
    info: RefCell<Vec<String>>,
    warn: RefCell<Vec<String>>,
}

impl MemoryJournal {
    pub fn info_lines(&self) -> Vec<String> {
        self.info.borrow().clone()
    }

    pub fn warn_lines(&self) -> Vec<String> {
        self.warn.borrow().clone()
    }
}

impl Journal for MemoryJournal {
    fn info(&self, message: &str) -> Result<()> {
        self.info.borrow_mut().push(message.to_string());
        Ok(())
    }

    fn warn(&self, message: &str) -> Result<()> {
        self.warn.borrow_mut().push(message.to_string());
        Ok(())
    }
}
