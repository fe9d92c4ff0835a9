//! Ingest record operations.

use crate::database::Database;
use crate::error::DbResult;
use chrono::{DateTime, SecondsFormat, Utc};
use pixsync_core::{ChangeKind, Channel, IngestRecord, RecordDraft, RecordTime};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

const RECORD_COLUMNS: &str = "channel, id, name, url, checksum, created_at";

/// Timestamps are stored as fixed-width RFC 3339 text so that text order is time order.
fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn row_to_record(row: &Row) -> rusqlite::Result<IngestRecord> {
    let channel_str: String = row.get(0)?;
    let created_at_str: String = row.get(5)?;

    let channel = channel_str.parse::<Channel>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
    })?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(IngestRecord {
        channel,
        id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        checksum: row.get(4)?,
        created_at,
    })
}

impl Database {
    /// Insert or overwrite a record keyed by `(channel, id)`.
    ///
    /// `RecordTime::ServerAssigned` is resolved by SQLite's clock inside the
    /// write; every write also takes the next store sequence number.
    pub fn upsert_record(&self, draft: &RecordDraft) -> DbResult<(IngestRecord, ChangeKind)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existed = tx
            .query_row(
                "SELECT 1 FROM records WHERE channel = ?1 AND id = ?2",
                params![draft.channel.as_str(), draft.id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        let created_at = match draft.time {
            RecordTime::ServerAssigned => None,
            RecordTime::At(time) => Some(format_time(&time)),
        };

        let record = tx.query_row(
            &format!(
                r#"
                INSERT INTO records (channel, id, name, url, checksum, created_at, seq)
                VALUES (?1, ?2, ?3, ?4, ?5,
                        COALESCE(?6, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                        (SELECT COALESCE(MAX(seq), 0) + 1 FROM records))
                ON CONFLICT(channel, id) DO UPDATE SET
                    name = excluded.name,
                    url = excluded.url,
                    checksum = excluded.checksum,
                    created_at = excluded.created_at,
                    seq = excluded.seq
                RETURNING {RECORD_COLUMNS}
                "#
            ),
            params![
                draft.channel.as_str(),
                draft.id,
                draft.name,
                draft.url,
                draft.checksum,
                created_at,
            ],
            row_to_record,
        )?;

        tx.commit()?;

        let kind = if existed {
            ChangeKind::DocumentUpdated
        } else {
            ChangeKind::DocumentAdded
        };
        Ok((record, kind))
    }

    /// Get a record by channel and id.
    pub fn get_record(&self, channel: Channel, id: &str) -> DbResult<Option<IngestRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE channel = ?1 AND id = ?2"),
                params![channel.as_str(), id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// List a channel's records, newest first.
    pub fn list_records(&self, channel: Channel, limit: Option<usize>) -> DbResult<Vec<IngestRecord>> {
        let conn = self.conn()?;
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE channel = ?1
             ORDER BY created_at DESC, seq DESC LIMIT ?2"
        ))?;

        let records = stmt
            .query_map(params![channel.as_str(), limit], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}
