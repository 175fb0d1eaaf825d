//! Named task lists shown next to the timer.
//!
//! Lists live under `taskLists` (id -> list) and the selection under
//! `currentTaskListId`, so any process sharing the store sees the same board.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::storage::{KeyValueStore, StoreError};

const ENABLE_LOGS: bool = true;
use crate::log_warn;

pub const TASK_LISTS_KEY: &str = "taskLists";
pub const CURRENT_LIST_KEY: &str = "currentTaskListId";
pub const DEFAULT_LIST_NAME: &str = "My Tasks";

static CHECKLIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^-\s*\[[\sx]\]").expect("valid checklist marker"));
static CHECKLIST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-\s*(?:\[[\sx]\]\s*)?(.+)$").expect("valid checklist line")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskList {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// One unchecked `- [ ] text` line per task, ready to paste elsewhere.
    pub fn to_markdown(&self) -> String {
        self.tasks
            .iter()
            .map(|t| format!("- [ ] {}", t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Split pasted input into task texts.
///
/// Multi-line input containing checklist markers becomes one task per
/// `-` line, marker stripped. Anything else is a single task.
pub fn parse_checklist(input: &str) -> Vec<String> {
    let input = input.trim();
    if input.is_empty() {
        return Vec::new();
    }

    if input.contains('\n') && CHECKLIST_MARKER.is_match(input) {
        return input
            .lines()
            .filter_map(|line| CHECKLIST_LINE.captures(line.trim()))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .filter(|text| !text.is_empty())
            .collect();
    }

    vec![input.to_string()]
}

/// Time-ordered ids, so lists keyed by id iterate in creation order.
fn new_id() -> String {
    Uuid::now_v7().to_string()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskBoard {
    lists: BTreeMap<String, TaskList>,
    current: Option<String>,
}

impl TaskBoard {
    pub fn load(store: &KeyValueStore) -> Self {
        let raw = store.get(&[TASK_LISTS_KEY, CURRENT_LIST_KEY]);
        let lists = match raw.get(TASK_LISTS_KEY) {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|err| {
                log_warn!("ignoring unreadable task lists: {err}");
                BTreeMap::new()
            }),
            None => BTreeMap::new(),
        };
        let current = raw
            .get(CURRENT_LIST_KEY)
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut board = Self { lists, current };
        board.repair_selection();
        board
    }

    pub fn save(&self, store: &KeyValueStore) -> Result<(), StoreError> {
        let mut entries = Map::new();
        entries.insert(TASK_LISTS_KEY.into(), serde_json::to_value(&self.lists)?);
        entries.insert(
            CURRENT_LIST_KEY.into(),
            self.current.clone().map(Value::String).unwrap_or(Value::Null),
        );
        store.set(entries)
    }

    pub fn lists(&self) -> impl Iterator<Item = (&str, &TaskList)> {
        self.lists.iter().map(|(id, list)| (id.as_str(), list))
    }

    pub fn list(&self, id: &str) -> Option<&TaskList> {
        self.lists.get(id)
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&TaskList> {
        self.current.as_deref().and_then(|id| self.lists.get(id))
    }

    /// Point at a real list, creating the default one on an empty board.
    pub fn ensure_current(&mut self) -> String {
        self.repair_selection();
        match &self.current {
            Some(id) => id.clone(),
            None => self.create_list(DEFAULT_LIST_NAME),
        }
    }

    pub fn select(&mut self, id: &str) -> bool {
        if !self.lists.contains_key(id) {
            return false;
        }
        self.current = Some(id.to_string());
        true
    }

    /// New empty list, which becomes the current one.
    pub fn create_list(&mut self, name: &str) -> String {
        let name = match name.trim() {
            "" => DEFAULT_LIST_NAME,
            trimmed => trimmed,
        };
        let id = new_id();
        self.lists.insert(id.clone(), TaskList::new(name));
        self.current = Some(id.clone());
        id
    }

    pub fn rename_list(&mut self, id: &str, name: &str) -> bool {
        let name = name.trim();
        match self.lists.get_mut(id) {
            Some(list) if !name.is_empty() => {
                list.name = name.to_string();
                true
            }
            _ => false,
        }
    }

    /// Copy with fresh ids and a " (copy)" suffix; the copy becomes current.
    pub fn duplicate_list(&mut self, id: &str) -> Option<String> {
        let source = self.lists.get(id)?;
        let copy = TaskList {
            name: format!("{} (copy)", source.name),
            tasks: source
                .tasks
                .iter()
                .map(|t| Task {
                    id: new_id(),
                    ..t.clone()
                })
                .collect(),
        };
        let copy_id = new_id();
        self.lists.insert(copy_id.clone(), copy);
        self.current = Some(copy_id.clone());
        Some(copy_id)
    }

    /// Remove a list; if it was current, the first remaining list is selected.
    pub fn delete_list(&mut self, id: &str) -> bool {
        if self.lists.remove(id).is_none() {
            return false;
        }
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        self.repair_selection();
        true
    }

    /// Add every task parsed from `input` to a list; returns the new task ids.
    pub fn add_tasks(&mut self, list_id: &str, input: &str) -> Vec<String> {
        let Some(list) = self.lists.get_mut(list_id) else {
            return Vec::new();
        };
        parse_checklist(input)
            .into_iter()
            .map(|text| {
                let id = new_id();
                list.tasks.push(Task {
                    id: id.clone(),
                    text,
                    completed: false,
                });
                id
            })
            .collect()
    }

    pub fn toggle_task(&mut self, list_id: &str, task_id: &str) -> Option<bool> {
        let task = self.lists.get_mut(list_id)?.task_mut(task_id)?;
        task.completed = !task.completed;
        Some(task.completed)
    }

    pub fn delete_task(&mut self, list_id: &str, task_id: &str) -> bool {
        let Some(list) = self.lists.get_mut(list_id) else {
            return false;
        };
        let before = list.tasks.len();
        list.tasks.retain(|t| t.id != task_id);
        list.tasks.len() != before
    }

    /// Markdown checklist of the current list, or `None` when it has no tasks.
    pub fn export_current(&self) -> Option<String> {
        self.current()
            .filter(|list| !list.tasks.is_empty())
            .map(TaskList::to_markdown)
    }

    fn repair_selection(&mut self) {
        let valid = self
            .current
            .as_deref()
            .is_some_and(|id| self.lists.contains_key(id));
        if !valid {
            self.current = self.lists.keys().next().cloned();
        }
    }
}
