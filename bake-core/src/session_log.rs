//! Local session logs.
//!
//! Tracks every classification, name repair, and bake action so a pipeline
//! run can be reconstructed after the fact. Newest entries first, capped.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LOG_FILENAME: &str = "session.json";
const MAX_ENTRIES: usize = 1000;

/// Action type for session entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Classification,
    NameRepair,
    Bake,
    BatchBake,
}

/// A single session log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub timestamp: String,
    pub action: SessionAction,
    pub material: Option<String>,
    pub scene_path: Option<String>,
    pub suffix: Option<String>,
    pub issue_count: Option<usize>,
    pub renamed_to: Option<String>,
    pub textures_baked: Option<usize>,
    pub succeeded: Option<usize>,
    pub failed: Option<usize>,
    pub skipped: Option<usize>,
}

/// In-memory session log, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    pub entries: Vec<SessionEntry>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, entry: SessionEntry) {
        self.entries.insert(0, entry);
        if self.entries.len() > MAX_ENTRIES {
            self.entries.truncate(MAX_ENTRIES);
        }
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Default log path: ~/.config/bake-studio/session.json or BAKE_STUDIO_LOG_PATH
pub fn default_log_path() -> PathBuf {
    if let Ok(p) = std::env::var("BAKE_STUDIO_LOG_PATH") {
        return PathBuf::from(p);
    }
    let config = std::env::var("XDG_CONFIG_HOME")
        .or_else(|_| std::env::var("HOME").map(|h| format!("{}/.config", h)))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(config).join("bake-studio").join(LOG_FILENAME)
}

fn ensure_config_dir(path: &Path) -> Result<(), crate::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Load session log from path
pub fn load_session_log(path: Option<&Path>) -> Result<SessionLog, crate::Error> {
    let default = default_log_path();
    let path = path.unwrap_or(&default);
    if !path.exists() {
        return Ok(SessionLog::new());
    }
    let bytes = std::fs::read(path)?;
    let log: SessionLog = serde_json::from_slice(&bytes)
        .map_err(|e| crate::Error::Other(format!("Invalid session log: {}", e)))?;
    Ok(log)
}

/// Save session log to path (JSON format)
pub fn save_session_log(path: Option<&Path>, log: &SessionLog) -> Result<(), crate::Error> {
    let default = default_log_path();
    let path = path.unwrap_or(&default);
    ensure_config_dir(path)?;
    let json = serde_json::to_string_pretty(log)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Export session log as human-readable text
pub fn export_session_log_text(log: &SessionLog, limit: Option<usize>) -> String {
    let slice = match limit {
        Some(n) => &log.entries[..log.entries.len().min(n)],
        None => &log.entries[..],
    };
    let mut lines = Vec::new();
    for e in slice {
        let action = match &e.action {
            SessionAction::Classification => "classify",
            SessionAction::NameRepair => "rename",
            SessionAction::Bake => "bake",
            SessionAction::BatchBake => "batch",
        };
        let material = e.material.as_deref().unwrap_or("-");
        let mut line = format!("{} [{}] material={}", e.timestamp, action, material);
        if let Some(s) = &e.suffix {
            line.push_str(&format!(" suffix={}", s));
        }
        if let Some(c) = e.issue_count {
            line.push_str(&format!(" issues={}", c));
        }
        if let Some(r) = &e.renamed_to {
            line.push_str(&format!(" renamed_to={}", r));
        }
        if let Some(t) = e.textures_baked {
            line.push_str(&format!(" textures={}", t));
        }
        if let (Some(ok), Some(fail), Some(skip)) = (e.succeeded, e.failed, e.skipped) {
            line.push_str(&format!(" ok={} failed={} skipped={}", ok, fail, skip));
        }
        if let Some(p) = &e.scene_path {
            line.push_str(&format!(" scene={}", p));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Record a classification action
pub fn record_classification(
    material: &str,
    suffix: &str,
    issue_count: usize,
    scene_path: Option<&Path>,
    log_path: Option<&Path>,
) -> Result<(), crate::Error> {
    let mut log = load_session_log(log_path)?;
    log.add(SessionEntry {
        timestamp: Utc::now().to_rfc3339(),
        action: SessionAction::Classification,
        material: Some(material.to_string()),
        scene_path: scene_path.map(|p| p.to_string_lossy().to_string()),
        suffix: Some(suffix.to_string()),
        issue_count: Some(issue_count),
        renamed_to: None,
        textures_baked: None,
        succeeded: None,
        failed: None,
        skipped: None,
    });
    save_session_log(log_path, &log)
}

/// Record a name repair
pub fn record_name_repair(
    material: &str,
    renamed_to: &str,
    scene_path: Option<&Path>,
    log_path: Option<&Path>,
) -> Result<(), crate::Error> {
    let mut log = load_session_log(log_path)?;
    log.add(SessionEntry {
        timestamp: Utc::now().to_rfc3339(),
        action: SessionAction::NameRepair,
        material: Some(material.to_string()),
        scene_path: scene_path.map(|p| p.to_string_lossy().to_string()),
        suffix: None,
        issue_count: None,
        renamed_to: Some(renamed_to.to_string()),
        textures_baked: None,
        succeeded: None,
        failed: None,
        skipped: None,
    });
    save_session_log(log_path, &log)
}

/// Record a single-material bake
pub fn record_bake(
    material: &str,
    textures_baked: usize,
    scene_path: Option<&Path>,
    log_path: Option<&Path>,
) -> Result<(), crate::Error> {
    let mut log = load_session_log(log_path)?;
    log.add(SessionEntry {
        timestamp: Utc::now().to_rfc3339(),
        action: SessionAction::Bake,
        material: Some(material.to_string()),
        scene_path: scene_path.map(|p| p.to_string_lossy().to_string()),
        suffix: None,
        issue_count: None,
        renamed_to: None,
        textures_baked: Some(textures_baked),
        succeeded: None,
        failed: None,
        skipped: None,
    });
    save_session_log(log_path, &log)
}

/// Record a batch bake summary
pub fn record_batch_bake(
    succeeded: usize,
    failed: usize,
    skipped: usize,
    scene_path: Option<&Path>,
    log_path: Option<&Path>,
) -> Result<(), crate::Error> {
    let mut log = load_session_log(log_path)?;
    log.add(SessionEntry {
        timestamp: Utc::now().to_rfc3339(),
        action: SessionAction::BatchBake,
        material: None,
        scene_path: scene_path.map(|p| p.to_string_lossy().to_string()),
        suffix: None,
        issue_count: None,
        renamed_to: None,
        textures_baked: None,
        succeeded: Some(succeeded),
        failed: Some(failed),
        skipped: Some(skipped),
    });
    save_session_log(log_path, &log)
}
