use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use kava_types::{MentionId, SubstanceCategory, SubstanceMention, SubstanceName, ThreadId};

use crate::db_path::prepare_db_path;

/// Result of an append: either a fresh row or a rejected duplicate.
///
/// A duplicate is not an error. The same substance mentioned twice within
/// the dedup tolerance maps to one durable fact; the caller gets the id of
/// the row that already holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Committed(MentionId),
    Duplicate(MentionId),
}

impl AppendOutcome {
    #[must_use]
    pub fn id(self) -> MentionId {
        match self {
            Self::Committed(id) | Self::Duplicate(id) => id,
        }
    }

    #[must_use]
    pub fn is_committed(self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// A stored mention with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedMention {
    pub id: MentionId,
    pub mention: SubstanceMention,
}

/// Append-only SQLite store of substance mentions per conversation thread.
pub struct SubstanceLog {
    db: Connection,
}

impl SubstanceLog {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS mentions (
            id INTEGER PRIMARY KEY,
            thread_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            span TEXT NOT NULL,
            taken_at INTEGER NOT NULL,
            low_confidence INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_mentions_thread_taken
        ON mentions(thread_id, taken_at);

        CREATE INDEX IF NOT EXISTS idx_mentions_thread_name_taken
        ON mentions(thread_id, name, taken_at);
    ";

    /// Open or create the substance log at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        prepare_db_path(path)?;

        let db = Connection::open(path)
            .with_context(|| format!("Failed to open substance log at {}", path.display()))?;
        Self::initialize(db)
    }

    /// Open an in-memory substance log (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory substance log")?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;",
        )
        .context("Failed to set substance log pragmas")?;
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create substance log schema")?;
        Ok(Self { db })
    }

    /// Append one mention, rejecting duplicates inside the tolerance
    /// window.
    ///
    /// The duplicate probe and the insert run inside one transaction, so
    /// a write either fully commits or is fully rejected.
    pub fn append(
        &mut self,
        mention: &SubstanceMention,
        tolerance: Duration,
    ) -> Result<AppendOutcome> {
        let tx = self
            .db
            .transaction()
            .context("Failed to start substance log transaction")?;

        let taken_at = mention.taken_at.timestamp();
        let tolerance_secs = tolerance.as_secs() as i64;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM mentions
                 WHERE thread_id = ?1 AND name = ?2
                   AND ABS(taken_at - ?3) <= ?4
                 ORDER BY id ASC
                 LIMIT 1",
                params![
                    mention.thread.as_str(),
                    mention.name.as_str(),
                    taken_at,
                    tolerance_secs
                ],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to probe for duplicate mention")?;

        if let Some(id) = existing {
            tx.commit().context("Failed to commit duplicate probe")?;
            tracing::debug!(
                thread = %mention.thread,
                name = %mention.name,
                "Rejected duplicate mention within tolerance"
            );
            return Ok(AppendOutcome::Duplicate(MentionId::new(id)));
        }

        tx.execute(
            "INSERT INTO mentions
                 (thread_id, name, category, span, taken_at, low_confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                mention.thread.as_str(),
                mention.name.as_str(),
                mention.category.as_str(),
                &mention.span,
                taken_at,
                i64::from(mention.low_confidence),
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to insert mention")?;

        let id = tx.last_insert_rowid();
        tx.commit().context("Failed to commit mention")?;

        Ok(AppendOutcome::Committed(MentionId::new(id)))
    }

    /// Mentions for a thread whose timestamp falls inside the trailing
    /// window ending at `now`, ordered by timestamp then id.
    pub fn active_since(
        &self,
        thread: &ThreadId,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<LoggedMention>> {
        let cutoff = now.timestamp() - window.as_secs() as i64;

        let mut stmt = self
            .db
            .prepare(
                "SELECT id, name, category, span, taken_at, low_confidence
                 FROM mentions
                 WHERE thread_id = ?1 AND taken_at >= ?2
                 ORDER BY taken_at ASC, id ASC",
            )
            .context("Failed to prepare active window query")?;

        let rows = stmt
            .query_map(params![thread.as_str(), cutoff], |row| {
                let id: i64 = row.get(0)?;
                let name: String = row.get(1)?;
                let category: String = row.get(2)?;
                let span: String = row.get(3)?;
                let taken_at: i64 = row.get(4)?;
                let low_confidence: i64 = row.get(5)?;
                Ok((id, name, category, span, taken_at, low_confidence))
            })
            .context("Failed to query active mentions")?;

        let mut mentions = Vec::new();
        for row in rows {
            let (id, name, category, span, taken_at, low_confidence) =
                row.context("Failed to read mention row")?;

            // Rows that fail to decode are skipped rather than failing the
            // whole window; they can only appear through external edits.
            let Ok(name) = SubstanceName::new(&name) else {
                tracing::warn!(id, "Skipping mention with invalid name");
                continue;
            };
            let Some(category) = SubstanceCategory::parse(&category) else {
                tracing::warn!(id, category = %category, "Skipping mention with unknown category");
                continue;
            };
            let Some(taken_at) = Utc.timestamp_opt(taken_at, 0).single() else {
                tracing::warn!(id, "Skipping mention with out-of-range timestamp");
                continue;
            };

            mentions.push(LoggedMention {
                id: MentionId::new(id),
                mention: SubstanceMention::new(thread.clone(), name, category, span, taken_at)
                    .with_low_confidence(low_confidence != 0),
            });
        }

        Ok(mentions)
    }

    /// Atomically delete one thread's entire log. Other threads are
    /// untouched.
    pub fn reset_thread(&mut self, thread: &ThreadId) -> Result<usize> {
        let deleted = self
            .db
            .execute(
                "DELETE FROM mentions WHERE thread_id = ?1",
                params![thread.as_str()],
            )
            .context("Failed to reset thread")?;
        tracing::info!(thread = %thread, deleted, "Thread log reset");
        Ok(deleted)
    }

    #[must_use]
    pub fn mention_count(&self) -> usize {
        self.db
            .query_row("SELECT COUNT(*) FROM mentions", [], |row| {
                row.get::<_, i64>(0)
            })
            .unwrap_or(0) as usize
    }

    /// Cheap liveness probe for health reporting.
    pub fn ping(&self) -> Result<()> {
        self.db
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .context("Substance log ping failed")?;
        Ok(())
    }
}
