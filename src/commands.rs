//! Popup-side operations: the settings form and the task list panel.

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use serde_json::{Map, Value};

use crate::settings::{Settings, UiState};
use crate::storage::KeyValueStore;
use crate::tasks::TaskBoard;

#[derive(Debug, Clone, Subcommand)]
pub enum SettingsAction {
    /// Print effective settings and popup state as JSON
    Show,
    /// Set one setting; VALUE is parsed as JSON, falling back to a plain string
    Set { key: String, value: String },
    /// Restore every setting to its default
    Reset,
    /// Update popup state: advanced section and last active tab
    Ui {
        #[arg(long)]
        advanced_expanded: Option<bool>,
        #[arg(long)]
        tab: Option<String>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum TaskAction {
    /// List task lists; the current one is starred
    Lists,
    /// Show tasks of the current list
    Show,
    /// Create a list and select it
    New { name: String },
    /// Rename a list
    Rename { list_id: String, name: String },
    /// Copy a list and select the copy
    Duplicate { list_id: String },
    /// Delete a list
    Delete { list_id: String },
    /// Select the current list
    Select { list_id: String },
    /// Add a task, or one task per line of a pasted markdown checklist
    Add { text: String },
    /// Toggle a task in the current list
    Toggle { task_id: String },
    /// Delete a task from the current list
    Remove { task_id: String },
    /// Print the current list as a markdown checklist
    Export,
}

pub fn settings_command(store: &KeyValueStore, action: SettingsAction) -> Result<String> {
    match action {
        SettingsAction::Show => {
            let view = serde_json::json!({
                "settings": Settings::load(store),
                "ui": UiState::load(store),
            });
            Ok(serde_json::to_string_pretty(&view)?)
        }
        SettingsAction::Set { key, value } => {
            let updated = set_setting(store, &key, &value)?;
            Ok(serde_json::to_string_pretty(&updated)?)
        }
        SettingsAction::Reset => {
            Settings::default()
                .save(store)
                .context("failed to reset settings")?;
            Ok("settings reset to defaults".into())
        }
        SettingsAction::Ui {
            advanced_expanded,
            tab,
        } => {
            let mut ui = UiState::load(store);
            if let Some(expanded) = advanced_expanded {
                ui.advanced_expanded = expanded;
            }
            if tab.is_some() {
                ui.last_active_tab = tab;
            }
            ui.save(store).context("failed to save popup state")?;
            Ok(serde_json::to_string_pretty(&ui)?)
        }
    }
}

/// Write one known key, then read the record back through normalization.
pub fn set_setting(store: &KeyValueStore, key: &str, raw: &str) -> Result<Settings> {
    let known = match serde_json::to_value(Settings::default())? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if !known.contains_key(key) {
        bail!("unknown setting '{key}'");
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    let mut entries = Map::new();
    entries.insert(key.to_string(), value);
    store
        .set(entries)
        .with_context(|| format!("failed to store setting '{key}'"))?;
    Ok(Settings::load(store))
}

pub fn task_command(store: &KeyValueStore, action: TaskAction) -> Result<String> {
    let mut board = TaskBoard::load(store);

    let output = match action {
        TaskAction::Lists => {
            let current = board.current_id();
            let lines: Vec<String> = board
                .lists()
                .map(|(id, list)| {
                    let mark = if Some(id) == current { '*' } else { ' ' };
                    format!("{mark} {id}  {} ({} tasks)", list.name, list.tasks.len())
                })
                .collect();
            return Ok(lines.join("\n"));
        }
        TaskAction::Show => {
            let Some(list) = board.current() else {
                return Ok("no task lists".into());
            };
            let mut lines = vec![list.name.clone()];
            lines.extend(list.tasks.iter().map(|t| {
                format!("[{}] {}  {}", if t.completed { 'x' } else { ' ' }, t.id, t.text)
            }));
            return Ok(lines.join("\n"));
        }
        TaskAction::Export => {
            return Ok(board.export_current().unwrap_or_default());
        }
        TaskAction::New { name } => board.create_list(&name),
        TaskAction::Rename { list_id, name } => {
            if !board.rename_list(&list_id, &name) {
                bail!("cannot rename list '{list_id}'");
            }
            list_id
        }
        TaskAction::Duplicate { list_id } => board
            .duplicate_list(&list_id)
            .ok_or_else(|| anyhow!("no list '{list_id}'"))?,
        TaskAction::Delete { list_id } => {
            if !board.delete_list(&list_id) {
                bail!("no list '{list_id}'");
            }
            list_id
        }
        TaskAction::Select { list_id } => {
            if !board.select(&list_id) {
                bail!("no list '{list_id}'");
            }
            list_id
        }
        TaskAction::Add { text } => {
            let list_id = board.ensure_current();
            let ids = board.add_tasks(&list_id, &text);
            if ids.is_empty() {
                bail!("nothing to add");
            }
            ids.join("\n")
        }
        TaskAction::Toggle { task_id } => {
            let list_id = current_list(&board)?;
            let done = board
                .toggle_task(&list_id, &task_id)
                .ok_or_else(|| anyhow!("no task '{task_id}'"))?;
            format!("{task_id} {}", if done { "done" } else { "open" })
        }
        TaskAction::Remove { task_id } => {
            let list_id = current_list(&board)?;
            if !board.delete_task(&list_id, &task_id) {
                bail!("no task '{task_id}'");
            }
            task_id
        }
    };

    board.save(store).context("failed to save task lists")?;
    Ok(output)
}

fn current_list(board: &TaskBoard) -> Result<String> {
    board
        .current_id()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no current task list"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostContext;
    use tempfile::TempDir;

    fn store() -> (KeyValueStore, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let store = KeyValueStore::open(dir.path().join("store.json"), HostContext::new(dir.path()))
            .expect("open");
        (store, dir)
    }

    #[test]
    fn set_setting_parses_json_and_clamps() {
        let (store, _dir) = store();
        let settings = set_setting(&store, "tickVolume", "3.5").expect("set");
        assert_eq!(settings.tick_volume, 1.0);

        let settings = set_setting(&store, "tickSound", "beep1").expect("set");
        assert_eq!(
            serde_json::to_value(settings.tick_sound).expect("json"),
            Value::String("beep1".into())
        );

        assert!(set_setting(&store, "volume", "1").is_err());
    }

    #[test]
    fn ui_state_updates_only_given_fields() {
        let (store, _dir) = store();
        settings_command(
            &store,
            SettingsAction::Ui {
                advanced_expanded: Some(true),
                tab: Some("tasks".into()),
            },
        )
        .expect("ui");
        settings_command(
            &store,
            SettingsAction::Ui {
                advanced_expanded: None,
                tab: None,
            },
        )
        .expect("ui");

        let ui = UiState::load(&store);
        assert!(ui.advanced_expanded);
        assert_eq!(ui.last_active_tab.as_deref(), Some("tasks"));
    }

    #[test]
    fn task_commands_persist_between_calls() {
        let (store, _dir) = store();
        let added = task_command(
            &store,
            TaskAction::Add {
                text: "- [ ] stretch\n- [x] water".into(),
            },
        )
        .expect("add");
        let ids: Vec<&str> = added.lines().collect();
        assert_eq!(ids.len(), 2);

        task_command(
            &store,
            TaskAction::Toggle {
                task_id: ids[0].to_string(),
            },
        )
        .expect("toggle");

        let board = TaskBoard::load(&store);
        let list = board.current().expect("current list");
        assert!(list.tasks[0].completed);

        let exported = task_command(&store, TaskAction::Export).expect("export");
        assert_eq!(exported, "- [ ] stretch\n- [ ] water");
    }

    #[test]
    fn unknown_list_is_an_error() {
        let (store, _dir) = store();
        let result = task_command(
            &store,
            TaskAction::Delete {
                list_id: "missing".into(),
            },
        );
        assert!(result.is_err());
    }
}
