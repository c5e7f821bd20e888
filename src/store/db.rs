//! Media Store Database
//!
//! SQLite-backed storage for the four entity kinds. The store owns a single
//! connection behind a mutex so read-modify-write sequences on one entity
//! (status transitions, share counting) are serialized.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::store::entities::{
    Analysis, MediaKind, MediaPayload, MediaStatus, Photo, ProcessedMedia, Suggestion,
    SuggestionParams, TransformationKind,
};
use crate::{imaging, now_rfc3339, CoreError, CoreResult};

// =============================================================================
// Query Filter
// =============================================================================

/// Filter for gallery-style listing of completed media
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaQuery {
    /// Only favorited media
    pub favorites_only: bool,
    /// Only shared media
    pub shared_only: bool,
}

impl MediaQuery {
    pub fn favorites() -> Self {
        Self {
            favorites_only: true,
            ..Default::default()
        }
    }

    pub fn shared() -> Self {
        Self {
            shared_only: true,
            ..Default::default()
        }
    }
}

// =============================================================================
// Media Store
// =============================================================================

/// Durable store for photos and everything derived from them
pub struct MediaStore {
    conn: Mutex<Connection>,
}

impl MediaStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// Any media left `pending`/`processing` by a previous session is swept
    /// to `cancelled`: abandoned jobs are never left dangling.
    pub fn open<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        let swept = store.sweep_stale_jobs()?;
        if swept > 0 {
            info!(swept, "cancelled stale media jobs from previous session");
        }
        Ok(store)
    }

    /// Creates an in-memory store (for testing)
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(
            r#"
            -- Photos: immutable originals
            CREATE TABLE IF NOT EXISTS photos (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                data BLOB NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                byte_size INTEGER NOT NULL,
                analysis_completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            -- Analyses: one per photo, replaced on re-analysis
            CREATE TABLE IF NOT EXISTS analyses (
                id TEXT PRIMARY KEY,
                photo_id TEXT NOT NULL UNIQUE REFERENCES photos(id) ON DELETE CASCADE,
                objects TEXT NOT NULL,
                scene_description TEXT NOT NULL,
                lighting TEXT NOT NULL,
                composition TEXT NOT NULL,
                mood TEXT NOT NULL,
                style TEXT NOT NULL,
                technical_quality TEXT NOT NULL,
                improvements TEXT NOT NULL,
                confidence REAL NOT NULL,
                mock INTEGER NOT NULL DEFAULT 0,
                fallback_error TEXT,
                created_at TEXT NOT NULL
            );

            -- Suggestions: appended in batches, order_index contiguous per photo
            CREATE TABLE IF NOT EXISTS suggestions (
                id TEXT PRIMARY KEY,
                photo_id TEXT NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                reasoning TEXT NOT NULL,
                confidence REAL NOT NULL,
                target_model TEXT NOT NULL,
                params TEXT NOT NULL,
                estimated_duration_sec REAL NOT NULL,
                order_index INTEGER NOT NULL,
                mock INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(photo_id, order_index)
            );

            -- Processed media: transformation outputs
            CREATE TABLE IF NOT EXISTS processed_media (
                id TEXT PRIMARY KEY,
                photo_id TEXT NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
                suggestion_id TEXT REFERENCES suggestions(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                media_data BLOB,
                thumbnail_data BLOB,
                filename TEXT NOT NULL,
                byte_size INTEGER NOT NULL DEFAULT 0,
                width INTEGER,
                height INTEGER,
                duration_sec REAL,
                progress REAL NOT NULL DEFAULT 0.0,
                error_text TEXT,
                job_id TEXT,
                favorited INTEGER NOT NULL DEFAULT 0,
                shared INTEGER NOT NULL DEFAULT 0,
                share_count INTEGER NOT NULL DEFAULT 0,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_suggestions_photo
                ON suggestions(photo_id, order_index);
            CREATE INDEX IF NOT EXISTS idx_media_photo ON processed_media(photo_id);
            CREATE INDEX IF NOT EXISTS idx_media_suggestion
                ON processed_media(suggestion_id, status);
            CREATE INDEX IF NOT EXISTS idx_media_created ON processed_media(created_at);
            "#,
        )?;
        Ok(())
    }

    // =========================================================================
    // Photos
    // =========================================================================

    /// Persists a new photo, probing dimensions from the bytes.
    pub fn create_photo(&self, data: Vec<u8>, filename: impl Into<String>) -> CoreResult<Photo> {
        let info = imaging::probe(&data)?;
        let photo = Photo::new(data, filename, info.width, info.height);

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO photos (id, filename, data, width, height, byte_size, analysis_completed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![
                photo.id,
                photo.filename,
                photo.data,
                photo.width,
                photo.height,
                photo.byte_size,
                photo.created_at,
            ],
        )?;

        debug!(photo_id = %photo.id, bytes = photo.byte_size, "photo created");
        Ok(photo)
    }

    /// Fetches a photo with its original bytes.
    pub fn get_photo(&self, photo_id: &str) -> CoreResult<Photo> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, filename, data, width, height, byte_size, analysis_completed, created_at
             FROM photos WHERE id = ?1",
            [photo_id],
            |row| {
                Ok(Photo {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    data: row.get(2)?,
                    width: row.get(3)?,
                    height: row.get(4)?,
                    byte_size: row.get(5)?,
                    analysis_completed: row.get(6)?,
                    created_at: row.get(7)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| CoreError::PhotoNotFound(photo_id.to_string()))
    }

    /// Deletes a photo and, by cascade, its analysis, suggestions, and media.
    pub fn delete_photo(&self, photo_id: &str) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM photos WHERE id = ?1", [photo_id])?;
        if deleted == 0 {
            return Err(CoreError::PhotoNotFound(photo_id.to_string()));
        }
        debug!(photo_id, "photo deleted (cascade)");
        Ok(())
    }

    // =========================================================================
    // Analyses
    // =========================================================================

    /// Attaches an analysis, replacing any prior one. The photo's
    /// `analysis_completed` flag is set only after the write succeeds.
    pub fn attach_analysis(&self, analysis: &Analysis) -> CoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM photos WHERE id = ?1",
                [&analysis.photo_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(CoreError::PhotoNotFound(analysis.photo_id.clone()));
        }

        tx.execute(
            "DELETE FROM analyses WHERE photo_id = ?1",
            [&analysis.photo_id],
        )?;
        tx.execute(
            "INSERT INTO analyses (id, photo_id, objects, scene_description, lighting, composition,
                                   mood, style, technical_quality, improvements, confidence, mock,
                                   fallback_error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                analysis.id,
                analysis.photo_id,
                serde_json::to_string(&analysis.objects)?,
                analysis.scene_description,
                analysis.lighting,
                analysis.composition,
                analysis.mood,
                analysis.style,
                analysis.technical_quality,
                serde_json::to_string(&analysis.improvements)?,
                analysis.confidence,
                analysis.mock,
                analysis.fallback_error,
                analysis.created_at,
            ],
        )?;
        tx.execute(
            "UPDATE photos SET analysis_completed = 1 WHERE id = ?1",
            [&analysis.photo_id],
        )?;
        tx.commit()?;

        debug!(photo_id = %analysis.photo_id, mock = analysis.mock, "analysis attached");
        Ok(())
    }

    /// Fetches the analysis for a photo, if one exists.
    pub fn get_analysis(&self, photo_id: &str) -> CoreResult<Option<Analysis>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, photo_id, objects, scene_description, lighting, composition, mood,
                        style, technical_quality, improvements, confidence, mock, fallback_error,
                        created_at
                 FROM analyses WHERE photo_id = ?1",
                [photo_id],
                analysis_row,
            )
            .optional()?;

        match row {
            Some(raw) => Ok(Some(raw.into_analysis()?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Suggestions
    // =========================================================================

    /// Appends a batch of suggestions atomically. Order indexes are assigned
    /// contiguously after the photo's existing suggestions; the passed batch
    /// order is preserved. Returns the persisted batch.
    pub fn attach_suggestions(
        &self,
        photo_id: &str,
        suggestions: Vec<Suggestion>,
    ) -> CoreResult<Vec<Suggestion>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let base: u32 = tx.query_row(
            "SELECT COUNT(*) FROM suggestions WHERE photo_id = ?1",
            [photo_id],
            |row| row.get(0),
        )?;

        let mut persisted = Vec::with_capacity(suggestions.len());
        for (i, mut suggestion) in suggestions.into_iter().enumerate() {
            suggestion.photo_id = photo_id.to_string();
            suggestion.order_index = base + i as u32;

            tx.execute(
                "INSERT INTO suggestions (id, photo_id, kind, title, description, reasoning,
                                          confidence, target_model, params, estimated_duration_sec,
                                          order_index, mock, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    suggestion.id,
                    suggestion.photo_id,
                    suggestion.kind.as_str(),
                    suggestion.title,
                    suggestion.description,
                    suggestion.reasoning,
                    suggestion.confidence,
                    suggestion.target_model,
                    serde_json::to_string(&suggestion.params)?,
                    suggestion.estimated_duration_sec,
                    suggestion.order_index,
                    suggestion.mock,
                    suggestion.created_at,
                ],
            )?;
            persisted.push(suggestion);
        }

        tx.commit()?;
        debug!(photo_id, count = persisted.len(), "suggestions attached");
        Ok(persisted)
    }

    /// Lists a photo's suggestions in display order.
    pub fn list_suggestions(&self, photo_id: &str) -> CoreResult<Vec<Suggestion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, photo_id, kind, title, description, reasoning, confidence, target_model,
                    params, estimated_duration_sec, order_index, mock, created_at
             FROM suggestions WHERE photo_id = ?1 ORDER BY order_index ASC",
        )?;

        let rows = stmt
            .query_map([photo_id], suggestion_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|r| r.into_suggestion()).collect()
    }

    /// Fetches one suggestion by id.
    pub fn get_suggestion(&self, suggestion_id: &str) -> CoreResult<Suggestion> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, photo_id, kind, title, description, reasoning, confidence, target_model,
                    params, estimated_duration_sec, order_index, mock, created_at
             FROM suggestions WHERE id = ?1",
            [suggestion_id],
            suggestion_row,
        )
        .optional()?
        .ok_or_else(|| CoreError::SuggestionNotFound(suggestion_id.to_string()))?
        .into_suggestion()
    }

    // =========================================================================
    // Processed Media
    // =========================================================================

    /// Creates a pending media record for a transformation job.
    ///
    /// If the suggestion already has a non-terminal record, that record is
    /// returned instead of creating a duplicate concurrent job.
    pub fn create_processed_media(
        &self,
        photo_id: &str,
        suggestion_id: Option<&str>,
        kind: MediaKind,
        filename: impl Into<String>,
    ) -> CoreResult<ProcessedMedia> {
        if let Some(sid) = suggestion_id {
            if let Some(active) = self.find_active_for_suggestion(sid)? {
                debug!(suggestion_id = sid, media_id = %active.id, "reusing in-flight media record");
                return Ok(active);
            }
        }

        let media = ProcessedMedia::new(
            photo_id,
            suggestion_id.map(|s| s.to_string()),
            kind,
            filename,
        );

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO processed_media (id, photo_id, suggestion_id, kind, status, filename,
                                          byte_size, progress, favorited, shared, share_count,
                                          metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0.0, 0, 0, 0, ?7, ?8)",
            params![
                media.id,
                media.photo_id,
                media.suggestion_id,
                media.kind.as_str(),
                media.status.as_str(),
                media.filename,
                serde_json::to_string(&media.metadata)?,
                media.created_at,
            ],
        )?;

        debug!(media_id = %media.id, photo_id, "media record created (pending)");
        Ok(media)
    }

    /// Returns the suggestion's in-flight (pending/processing) record, if any.
    pub fn find_active_for_suggestion(
        &self,
        suggestion_id: &str,
    ) -> CoreResult<Option<ProcessedMedia>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {MEDIA_COLUMNS} FROM processed_media
                     WHERE suggestion_id = ?1 AND status IN ('pending', 'processing')
                     ORDER BY created_at ASC LIMIT 1"
                ),
                [suggestion_id],
                media_row,
            )
            .optional()?;

        match row {
            Some(raw) => Ok(Some(raw.into_media()?)),
            None => Ok(None),
        }
    }

    /// Fetches one media record by id.
    pub fn get_media(&self, media_id: &str) -> CoreResult<ProcessedMedia> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {MEDIA_COLUMNS} FROM processed_media WHERE id = ?1"),
            [media_id],
            media_row,
        )
        .optional()?
        .ok_or_else(|| CoreError::MediaNotFound(media_id.to_string()))?
        .into_media()
    }

    /// Moves a pending record to `processing`, recording the external job id.
    ///
    /// Returns `false` (no-op) if the record is already processing; signals
    /// `InvalidStateTransition` if it is terminal.
    pub fn mark_processing(&self, media_id: &str, job_id: Option<&str>) -> CoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        match current_status(&conn, media_id)?.0 {
            MediaStatus::Processing => Ok(false),
            MediaStatus::Pending => {
                conn.execute(
                    "UPDATE processed_media SET status = 'processing', job_id = COALESCE(?2, job_id)
                     WHERE id = ?1",
                    params![media_id, job_id],
                )?;
                Ok(true)
            }
            status => Err(CoreError::InvalidStateTransition(format!(
                "{} -> processing",
                status.as_str()
            ))),
        }
    }

    /// Updates in-flight progress. Values are clamped to [0, 1]; decreases
    /// are ignored so the reported progress stays monotone. No-op once the
    /// record is terminal.
    pub fn update_progress(&self, media_id: &str, progress: f64) -> CoreResult<()> {
        let clamped = progress.clamp(0.0, 1.0);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE processed_media SET progress = ?2
             WHERE id = ?1 AND progress < ?2 AND status IN ('pending', 'processing')",
            params![media_id, clamped],
        )?;
        Ok(())
    }

    /// Completes a record with its final payload. One-shot: returns `false`
    /// (state unchanged) when the record is already terminal.
    pub fn mark_completed(&self, media_id: &str, payload: MediaPayload) -> CoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let (status, kind) = current_status(&conn, media_id)?;
        if status.is_terminal() {
            return Ok(false);
        }

        // duration is required iff the output is a video
        match kind {
            MediaKind::Video if payload.duration_sec.is_none() => {
                return Err(CoreError::ValidationError(
                    "Video media requires a duration".to_string(),
                ));
            }
            MediaKind::Image if payload.duration_sec.is_some() => {
                return Err(CoreError::ValidationError(
                    "Image media must not carry a duration".to_string(),
                ));
            }
            _ => {}
        }

        conn.execute(
            "UPDATE processed_media
             SET status = 'completed', media_data = ?2, thumbnail_data = ?3, byte_size = ?4,
                 width = ?5, height = ?6, duration_sec = ?7, progress = 1.0, error_text = NULL,
                 completed_at = ?8
             WHERE id = ?1",
            params![
                media_id,
                payload.data,
                payload.thumbnail,
                payload.data.len() as u64,
                payload.width,
                payload.height,
                payload.duration_sec,
                now_rfc3339(),
            ],
        )?;

        debug!(media_id, bytes = payload.data.len(), "media completed");
        Ok(true)
    }

    /// Fails a record with an error message. One-shot like `mark_completed`.
    pub fn mark_failed(&self, media_id: &str, error_text: &str) -> CoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        if current_status(&conn, media_id)?.0.is_terminal() {
            return Ok(false);
        }

        conn.execute(
            "UPDATE processed_media
             SET status = 'failed', error_text = ?2, completed_at = ?3
             WHERE id = ?1",
            params![media_id, error_text, now_rfc3339()],
        )?;
        Ok(true)
    }

    /// Cancels an in-flight record. One-shot like `mark_completed`.
    pub fn mark_cancelled(&self, media_id: &str) -> CoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        if current_status(&conn, media_id)?.0.is_terminal() {
            return Ok(false);
        }

        conn.execute(
            "UPDATE processed_media SET status = 'cancelled', completed_at = ?2 WHERE id = ?1",
            params![media_id, now_rfc3339()],
        )?;
        Ok(true)
    }

    /// Merges diagnostic metadata into a record (e.g. mock tags).
    pub fn merge_metadata(
        &self,
        media_id: &str,
        entries: BTreeMap<String, String>,
    ) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let raw: String = conn
            .query_row(
                "SELECT metadata FROM processed_media WHERE id = ?1",
                [media_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| CoreError::MediaNotFound(media_id.to_string()))?;

        let mut metadata: BTreeMap<String, String> = serde_json::from_str(&raw)?;
        metadata.extend(entries);

        conn.execute(
            "UPDATE processed_media SET metadata = ?2 WHERE id = ?1",
            params![media_id, serde_json::to_string(&metadata)?],
        )?;
        Ok(())
    }

    // =========================================================================
    // User-Facing Flags
    // =========================================================================

    /// Sets the favorite flag on a completed record.
    pub fn set_favorite(&self, media_id: &str, favorited: bool) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        require_completed(&conn, media_id)?;
        conn.execute(
            "UPDATE processed_media SET favorited = ?2 WHERE id = ?1",
            params![media_id, favorited],
        )?;
        Ok(())
    }

    /// Records one share: sets the shared flag and increments the count.
    /// The increment runs under the store lock, so concurrent shares from
    /// multiple pipelines serialize rather than losing updates.
    pub fn record_share(&self, media_id: &str) -> CoreResult<u32> {
        let conn = self.conn.lock().unwrap();
        require_completed(&conn, media_id)?;
        conn.execute(
            "UPDATE processed_media SET shared = 1, share_count = share_count + 1 WHERE id = ?1",
            [media_id],
        )?;
        let count: u32 = conn.query_row(
            "SELECT share_count FROM processed_media WHERE id = ?1",
            [media_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // =========================================================================
    // Queries and Maintenance
    // =========================================================================

    /// Lists completed media newest-first, optionally filtered by flags.
    pub fn query_media(&self, query: MediaQuery) -> CoreResult<Vec<ProcessedMedia>> {
        let mut sql = format!(
            "SELECT {MEDIA_COLUMNS} FROM processed_media WHERE status = 'completed'"
        );
        if query.favorites_only {
            sql.push_str(" AND favorited = 1");
        }
        if query.shared_only {
            sql.push_str(" AND shared = 1");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], media_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|r| r.into_media()).collect()
    }

    /// Cancels any record left in a non-terminal status. Returns the number
    /// of rows swept.
    pub fn sweep_stale_jobs(&self) -> CoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let swept = conn.execute(
            "UPDATE processed_media SET status = 'cancelled', completed_at = ?1
             WHERE status IN ('pending', 'processing')",
            [now_rfc3339()],
        )?;
        Ok(swept)
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

/// Reads a record's current status and kind under the caller's lock.
fn current_status(conn: &Connection, media_id: &str) -> CoreResult<(MediaStatus, MediaKind)> {
    let (status, kind): (String, String) = conn
        .query_row(
            "SELECT status, kind FROM processed_media WHERE id = ?1",
            [media_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| CoreError::MediaNotFound(media_id.to_string()))?;

    let status = MediaStatus::parse(&status)
        .ok_or_else(|| CoreError::Storage(format!("Unknown media status: {}", status)))?;
    let kind = MediaKind::parse(&kind)
        .ok_or_else(|| CoreError::Storage(format!("Unknown media kind: {}", kind)))?;
    Ok((status, kind))
}

fn require_completed(conn: &Connection, media_id: &str) -> CoreResult<()> {
    let (status, _) = current_status(conn, media_id)?;
    if status != MediaStatus::Completed {
        return Err(CoreError::InvalidStateTransition(format!(
            "user flags require completed media, status is {}",
            status.as_str()
        )));
    }
    Ok(())
}

const MEDIA_COLUMNS: &str = "id, photo_id, suggestion_id, kind, status, media_data, \
     thumbnail_data, filename, byte_size, width, height, duration_sec, progress, error_text, \
     job_id, favorited, shared, share_count, metadata, created_at, completed_at";

struct RawAnalysis {
    id: String,
    photo_id: String,
    objects: String,
    scene_description: String,
    lighting: String,
    composition: String,
    mood: String,
    style: String,
    technical_quality: String,
    improvements: String,
    confidence: f64,
    mock: bool,
    fallback_error: Option<String>,
    created_at: String,
}

fn analysis_row(row: &Row<'_>) -> rusqlite::Result<RawAnalysis> {
    Ok(RawAnalysis {
        id: row.get(0)?,
        photo_id: row.get(1)?,
        objects: row.get(2)?,
        scene_description: row.get(3)?,
        lighting: row.get(4)?,
        composition: row.get(5)?,
        mood: row.get(6)?,
        style: row.get(7)?,
        technical_quality: row.get(8)?,
        improvements: row.get(9)?,
        confidence: row.get(10)?,
        mock: row.get(11)?,
        fallback_error: row.get(12)?,
        created_at: row.get(13)?,
    })
}

impl RawAnalysis {
    fn into_analysis(self) -> CoreResult<Analysis> {
        Ok(Analysis {
            id: self.id,
            photo_id: self.photo_id,
            objects: serde_json::from_str(&self.objects)?,
            scene_description: self.scene_description,
            lighting: self.lighting,
            composition: self.composition,
            mood: self.mood,
            style: self.style,
            technical_quality: self.technical_quality,
            improvements: serde_json::from_str(&self.improvements)?,
            confidence: self.confidence,
            mock: self.mock,
            fallback_error: self.fallback_error,
            created_at: self.created_at,
        })
    }
}

struct RawSuggestion {
    id: String,
    photo_id: String,
    kind: String,
    title: String,
    description: String,
    reasoning: String,
    confidence: f64,
    target_model: String,
    params: String,
    estimated_duration_sec: f64,
    order_index: u32,
    mock: bool,
    created_at: String,
}

fn suggestion_row(row: &Row<'_>) -> rusqlite::Result<RawSuggestion> {
    Ok(RawSuggestion {
        id: row.get(0)?,
        photo_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        reasoning: row.get(5)?,
        confidence: row.get(6)?,
        target_model: row.get(7)?,
        params: row.get(8)?,
        estimated_duration_sec: row.get(9)?,
        order_index: row.get(10)?,
        mock: row.get(11)?,
        created_at: row.get(12)?,
    })
}

impl RawSuggestion {
    fn into_suggestion(self) -> CoreResult<Suggestion> {
        let kind = TransformationKind::parse(&self.kind)
            .ok_or_else(|| CoreError::Storage(format!("Unknown suggestion kind: {}", self.kind)))?;
        let params: SuggestionParams = serde_json::from_str(&self.params)?;

        Ok(Suggestion {
            id: self.id,
            photo_id: self.photo_id,
            kind,
            title: self.title,
            description: self.description,
            reasoning: self.reasoning,
            confidence: self.confidence,
            target_model: self.target_model,
            params,
            estimated_duration_sec: self.estimated_duration_sec,
            order_index: self.order_index,
            mock: self.mock,
            created_at: self.created_at,
        })
    }
}

struct RawMedia {
    id: String,
    photo_id: String,
    suggestion_id: Option<String>,
    kind: String,
    status: String,
    media_data: Option<Vec<u8>>,
    thumbnail_data: Option<Vec<u8>>,
    filename: String,
    byte_size: u64,
    width: Option<u32>,
    height: Option<u32>,
    duration_sec: Option<f64>,
    progress: f64,
    error_text: Option<String>,
    job_id: Option<String>,
    favorited: bool,
    shared: bool,
    share_count: u32,
    metadata: String,
    created_at: String,
    completed_at: Option<String>,
}

fn media_row(row: &Row<'_>) -> rusqlite::Result<RawMedia> {
    Ok(RawMedia {
        id: row.get(0)?,
        photo_id: row.get(1)?,
        suggestion_id: row.get(2)?,
        kind: row.get(3)?,
        status: row.get(4)?,
        media_data: row.get(5)?,
        thumbnail_data: row.get(6)?,
        filename: row.get(7)?,
        byte_size: row.get(8)?,
        width: row.get(9)?,
        height: row.get(10)?,
        duration_sec: row.get(11)?,
        progress: row.get(12)?,
        error_text: row.get(13)?,
        job_id: row.get(14)?,
        favorited: row.get(15)?,
        shared: row.get(16)?,
        share_count: row.get(17)?,
        metadata: row.get(18)?,
        created_at: row.get(19)?,
        completed_at: row.get(20)?,
    })
}

impl RawMedia {
    fn into_media(self) -> CoreResult<ProcessedMedia> {
        let kind = MediaKind::parse(&self.kind)
            .ok_or_else(|| CoreError::Storage(format!("Unknown media kind: {}", self.kind)))?;
        let status = MediaStatus::parse(&self.status)
            .ok_or_else(|| CoreError::Storage(format!("Unknown media status: {}", self.status)))?;

        Ok(ProcessedMedia {
            id: self.id,
            photo_id: self.photo_id,
            suggestion_id: self.suggestion_id,
            kind,
            status,
            media_data: self.media_data,
            thumbnail_data: self.thumbnail_data,
            filename: self.filename,
            byte_size: self.byte_size,
            width: self.width,
            height: self.height,
            duration_sec: self.duration_sec,
            progress: self.progress,
            error_text: self.error_text,
            job_id: self.job_id,
            favorited: self.favorited,
            shared: self.shared,
            share_count: self.share_count,
            metadata: serde_json::from_str(&self.metadata)?,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
