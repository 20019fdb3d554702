use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use moodlog_core::config::CONFIG_FILE_NAME;
use moodlog_core::util::normalize_text_option;
use moodlog_core::{
    EntryId, FirestoreJournalStore, JournalEntry, JournalService, LocalJournalStore, Location,
    MoodLogConfig, SessionIdentity, SyncEngine,
};
use serde::Serialize;

use crate::error::CliError;

/// Resolved runtime settings shared by every command
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: MoodLogConfig,
    pub db_path: PathBuf,
    pub user_id: Option<String>,
}

impl AppContext {
    /// Merge CLI flags over environment over config file.
    pub fn resolve(
        cli_db_path: Option<PathBuf>,
        cli_config_path: Option<PathBuf>,
        cli_user: Option<String>,
    ) -> Self {
        let config_path = cli_config_path.unwrap_or_else(default_config_path);
        let config = MoodLogConfig::load_from_path(&config_path).with_env();
        Self::from_config(config, cli_db_path, cli_user)
    }

    pub fn from_config(
        config: MoodLogConfig,
        cli_db_path: Option<PathBuf>,
        cli_user: Option<String>,
    ) -> Self {
        let db_path = cli_db_path
            .or_else(|| config.db_path.clone())
            .unwrap_or_else(default_db_path);
        let user_id = normalize_text_option(cli_user).or_else(|| config.user_id.clone());
        Self {
            config,
            db_path,
            user_id,
        }
    }

    pub fn require_user(&self) -> Result<&str, CliError> {
        self.user_id.as_deref().ok_or(CliError::NoUser)
    }

    pub fn open_service(&self) -> Result<JournalService, CliError> {
        Ok(JournalService::open_path(&self.db_path)?)
    }

    /// Engine wired to Firestore for the selected user
    pub fn sync_engine(&self) -> Result<SyncEngine, CliError> {
        let user_id = self.require_user()?;
        let firestore = self
            .config
            .firestore_config()
            .ok_or(CliError::SyncNotConfigured)?;
        tracing::debug!("Using {:?}", firestore);

        let remote = FirestoreJournalStore::new(firestore)?;
        let local = self.open_service()?;
        Ok(SyncEngine::new(
            Arc::new(local),
            Arc::new(remote),
            Arc::new(SessionIdentity::signed_in(user_id)),
        ))
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("moodlog")
}

pub fn default_config_path() -> PathBuf {
    default_data_dir().join(CONFIG_FILE_NAME)
}

pub fn default_db_path() -> PathBuf {
    default_data_dir().join("moodlog.db")
}

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: i64,
    pub remote_id: Option<String>,
    pub mood: String,
    pub preview: String,
    pub content: String,
    pub date: String,
    pub date_iso: Option<String>,
    pub relative_time: Option<String>,
    pub location: Option<Location>,
    pub has_image: bool,
    pub needs_update: bool,
}

#[derive(Debug, Serialize)]
pub struct PendingItem {
    pub id: i64,
    pub action: String,
    pub remote_id: Option<String>,
    pub preview: String,
}

pub fn parse_entry_id(id: &str) -> Result<EntryId, CliError> {
    let trimmed = id.trim();
    trimmed
        .parse::<EntryId>()
        .map_err(|_| CliError::InvalidEntryId(trimmed.to_string()))
}

/// Visible entry of the user, or `EntryNotFound`
pub async fn find_visible_entry(
    service: &JournalService,
    user_id: &str,
    id: EntryId,
) -> Result<JournalEntry, CliError> {
    service
        .get(id)
        .await?
        .filter(|entry| !entry.is_deleted && entry.user_id == user_id)
        .ok_or_else(|| CliError::EntryNotFound(id.to_string()))
}

pub fn entry_to_list_item(entry: &JournalEntry) -> EntryListItem {
    let now_ms = Utc::now().timestamp_millis();
    let date_ms = entry.fields.date_millis();

    EntryListItem {
        id: entry.id.get(),
        remote_id: normalize_text_option(Some(entry.remote_id.clone())),
        mood: entry.fields.mood.to_string(),
        preview: entry.title_preview(80),
        content: entry.fields.content.clone(),
        date: entry.fields.date.clone(),
        date_iso: date_ms.map(format_timestamp),
        relative_time: date_ms.map(|ms| format_relative_time(ms, now_ms)),
        location: entry.fields.location.clone(),
        has_image: entry.fields.has_image(),
        needs_update: entry.needs_update,
    }
}

pub fn format_entry_lines(entries: &[JournalEntry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let id = entry.id.to_string();
            let mood = entry.fields.mood.as_str();
            let preview = entry.title_preview(40);
            let when = entry
                .fields
                .date_millis()
                .map_or_else(|| entry.fields.date.clone(), |ms| format_relative_time(ms, now_ms));
            let marker = sync_marker(entry);

            if marker.is_empty() {
                format!("{id:<6}  {mood:<17}  {preview:<40}  {when}")
            } else {
                format!("{id:<6}  {mood:<17}  {preview:<40}  {when:<10}  {marker}")
            }
        })
        .collect()
}

/// Short label for entries the cloud has not caught up with
pub fn sync_marker(entry: &JournalEntry) -> &'static str {
    if !entry.is_synced_remotely() {
        "[local]"
    } else if entry.needs_update {
        "[edited]"
    } else {
        ""
    }
}

pub fn pending_to_item(entry: &JournalEntry) -> Option<PendingItem> {
    let action = entry.sync_action()?;
    Some(PendingItem {
        id: entry.id.get(),
        action: action.to_string(),
        remote_id: normalize_text_option(Some(entry.remote_id.clone())),
        preview: entry.title_preview(80),
    })
}

pub fn format_pending_lines(entries: &[JournalEntry]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|entry| {
            let action = entry.sync_action()?;
            let id = entry.id.to_string();
            let action = action.to_string();
            Some(format!("{id:<6}  {action:<6}  {}", entry.title_preview(50)))
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_entry_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input("")? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input(initial_content: &str) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_entry_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let entry_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&entry_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_entry_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("moodlog-entry-{}-{now}.md", std::process::id()))
}
