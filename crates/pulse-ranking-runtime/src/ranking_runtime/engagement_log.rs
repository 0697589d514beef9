//! Append-only CSV engagement log backing the incremental collection mode.
//!
//! Each collection tick appends one row per parent post that showed any
//! engagement. The ranking side reads the file back as a whole; within one
//! ranking computation the log is never re-read.

use std::{
    collections::HashMap,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};

pub(super) const ENGAGEMENT_LOG_HEADER: &str =
    "logged_at_unix,message_ts,channel_id,user_id,reaction_count,reply_count,unique_reply_user_count";

/// One collection-tick observation of a parent post's engagement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementLogRecord {
    pub logged_at_unix: u64,
    pub message_ts: String,
    pub channel_id: String,
    pub user_id: String,
    pub reaction_count: u64,
    pub reply_count: u64,
    pub unique_reply_user_count: u64,
}

impl EngagementLogRecord {
    fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.logged_at_unix,
            self.message_ts,
            self.channel_id,
            self.user_id,
            self.reaction_count,
            self.reply_count,
            self.unique_reply_user_count
        )
    }

    fn parse_csv_row(line: &str) -> Option<Self> {
        let mut fields = line.split(',');
        let logged_at_unix = fields.next()?.trim().parse().ok()?;
        let message_ts = fields.next()?.trim().to_string();
        if message_ts.is_empty() {
            return None;
        }
        let channel_id = fields.next()?.trim().to_string();
        let user_id = fields.next()?.trim().to_string();
        let reaction_count = fields.next()?.trim().parse().ok()?;
        let reply_count = fields.next()?.trim().parse().ok()?;
        let unique_reply_user_count = fields.next()?.trim().parse().ok()?;
        Some(Self {
            logged_at_unix,
            message_ts,
            channel_id,
            user_id,
            reaction_count,
            reply_count,
            unique_reply_user_count,
        })
    }
}

/// Append-only CSV sink. Writes the header when the file is new or empty.
pub(super) struct EngagementCsvLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl EngagementCsvLog {
    pub(super) fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let needs_header = file.metadata().map(|meta| meta.len() == 0).unwrap_or(true);
        if needs_header {
            writeln!(file, "{ENGAGEMENT_LOG_HEADER}")
                .with_context(|| format!("failed to write header to {}", path.display()))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub(super) fn append(&self, record: &EngagementLogRecord) -> Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("engagement log mutex is poisoned"))?;
        writeln!(file, "{}", record.to_csv_row())
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}

/// Parses log content into per-message records. A later row for the same
/// `message_ts` replaces the earlier one: each tick re-observes messages
/// with fresher counts, so the last observation is the accurate one.
/// First-seen order is preserved; malformed lines are skipped.
pub(super) fn parse_engagement_log(content: &str) -> Vec<EngagementLogRecord> {
    let mut index_by_ts: HashMap<String, usize> = HashMap::new();
    let mut records: Vec<EngagementLogRecord> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line == ENGAGEMENT_LOG_HEADER {
            continue;
        }
        let Some(record) = EngagementLogRecord::parse_csv_row(line) else {
            tracing::warn!(line, "skipping malformed engagement log line");
            continue;
        };
        match index_by_ts.get(&record.message_ts) {
            Some(&index) => records[index] = record,
            None => {
                index_by_ts.insert(record.message_ts.clone(), records.len());
                records.push(record);
            }
        }
    }

    records
}

pub(super) fn load_engagement_log(path: &Path) -> Result<Vec<EngagementLogRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_engagement_log(&content))
}
