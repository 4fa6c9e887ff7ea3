//! SQLite store for the compliance data model
//!
//! Schema-versioned migrations over a single rusqlite connection. Documents
//! own chunks, standards own master controls, assessments own controls,
//! controls own evidence; all ownership edges cascade on delete.

use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CURRENT_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Invalid row data: {0}")]
    InvalidRow(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

macro_rules! db_str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self { $(Self::$variant => $s),+ }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($s => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let s = value.as_str()?;
                Self::parse(s).ok_or(rusqlite::types::FromSqlError::InvalidType)
            }
        }
    };
}

db_str_enum! {
    /// Document ingestion lifecycle
    DocumentStatus {
        Processing => "Processing",
        Ready => "Ready",
        Failed => "Failed",
    }
}

db_str_enum! {
    /// Assessment lifecycle
    AssessmentStatus {
        InProgress => "In Progress",
        Complete => "Complete",
    }
}

db_str_enum! {
    /// Per-control compliance state within an assessment
    ControlStatus {
        NotStarted => "Not Started",
        ReviewRequired => "Review Required",
        Compliant => "Compliant",
        Failed => "Failed",
        Missing => "Missing",
    }
}

db_str_enum! {
    /// Evidence verdict state
    EvidenceStatus {
        Pending => "Pending",
        Verified => "Verified",
        Failed => "Failed",
        Missing => "Missing",
    }
}

db_str_enum! {
    /// Where an evidence row came from
    EvidenceSource {
        Integration => "Integration",
        PolicyAi => "Policy_AI",
        Manual => "Manual",
    }
}

db_str_enum! {
    /// Schedule recurrence
    Frequency {
        Weekly => "Weekly",
        Monthly => "Monthly",
        Quarterly => "Quarterly",
    }
}

impl Frequency {
    /// Literal day-count interval. Monthly/Quarterly use fixed 30/90-day
    /// approximations, not calendar arithmetic.
    pub fn interval_days(&self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Quarterly => 90,
        }
    }
}

// ============================================================================
// Entity rows
// ============================================================================

/// Uploaded policy document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub status: DocumentStatus,
    pub chunk_count: i64,
    pub size_bytes: i64,
    pub created_at: String,
}

/// Embedded chunk of a document; immutable once written
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Compliance framework definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standard {
    pub id: String,
    pub name: String,
    pub description: String,
    pub total_controls: i64,
    pub created_at: String,
}

/// Template control owned by a standard
#[derive(Debug, Clone)]
pub struct MasterControl {
    pub id: String,
    pub standard_id: String,
    pub control_code: String,
    pub family: String,
    pub description: String,
    pub guidance: String,
    pub embedding: Vec<f32>,
}

/// Audit instance against one standard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: String,
    pub title: String,
    pub system_id: Option<String>,
    pub standard_name: String,
    pub status: AssessmentStatus,
    pub progress: i64,
    pub created_at: String,
}

/// Control instance cloned into an assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    pub id: String,
    pub assessment_id: String,
    pub control_code: String,
    pub family: String,
    pub description: String,
    pub status: ControlStatus,
}

/// Artifact or scan result supporting a control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub control_id: String,
    pub name: String,
    pub source_type: EvidenceSource,
    pub status: EvidenceStatus,
    pub url: Option<String>,
    pub snippet: Option<String>,
    pub ai_feedback: Option<String>,
    pub confidence_score: Option<i64>,
    pub created_at: String,
}

/// Recurrence definition for automated assessments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub standard_id: String,
    pub system_id: Option<String>,
    pub frequency: Frequency,
    pub last_run: Option<String>,
    pub next_run: Option<String>,
    pub status: String,
}

/// Stored integration credentials (jira, github)
#[derive(Debug, Clone)]
pub struct IntegrationRecord {
    pub provider: String,
    pub config: serde_json::Value,
    pub secret: String,
}

// ============================================================================
// Embedding blob codec
// ============================================================================

/// Encode an embedding as little-endian f32 bytes for BLOB storage
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into an embedding vector
pub fn embedding_from_blob(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

// ============================================================================
// Database
// ============================================================================

/// Database manager for auditcore
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open or create the database file
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Initialize database schema
    pub fn initialize(&self) -> Result<(), DbError> {
        let version = self.get_schema_version()?;
        if version < CURRENT_SCHEMA_VERSION {
            self.run_migrations(version)?;
        }
        Ok(())
    }

    /// Database file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get inner connection reference
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn get_schema_version(&self) -> Result<i32, DbError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        let version: SqliteResult<String> = self.conn.query_row(
            "SELECT value FROM settings WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        );

        match version {
            Ok(v) => v
                .parse()
                .map_err(|_| DbError::Migration("Invalid schema version".into())),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(DbError::Sqlite(e)),
        }
    }

    fn set_schema_version(&self, version: i32) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('schema_version', ?)",
            params![version.to_string()],
        )?;
        Ok(())
    }

    fn run_migrations(&self, from_version: i32) -> Result<(), DbError> {
        let tx = self.conn.unchecked_transaction()?;
        if from_version < 1 {
            self.migrate_v1()?;
        }
        tx.commit()?;
        self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        Ok(())
    }

    /// Migration to v1: full compliance schema
    fn migrate_v1(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            r#"
            -- Policy documents
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            -- Embedded chunks, all-or-nothing per document
            CREATE TABLE IF NOT EXISTS document_chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_doc ON document_chunks(document_id);

            -- Compliance standards library
            CREATE TABLE IF NOT EXISTS standards (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                total_controls INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS master_controls (
                id TEXT PRIMARY KEY,
                standard_id TEXT NOT NULL,
                control_code TEXT NOT NULL,
                family TEXT NOT NULL DEFAULT 'General',
                description TEXT NOT NULL,
                guidance TEXT NOT NULL DEFAULT '',
                embedding BLOB,
                FOREIGN KEY (standard_id) REFERENCES standards(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_masters_standard ON master_controls(standard_id);

            -- Audit instances
            CREATE TABLE IF NOT EXISTS assessments (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                system_id TEXT,
                standard_name TEXT NOT NULL,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS controls (
                id TEXT PRIMARY KEY,
                assessment_id TEXT NOT NULL,
                control_code TEXT NOT NULL,
                family TEXT NOT NULL DEFAULT 'General',
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                FOREIGN KEY (assessment_id) REFERENCES assessments(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_controls_assessment ON controls(assessment_id);

            CREATE TABLE IF NOT EXISTS evidence (
                id TEXT PRIMARY KEY,
                control_id TEXT NOT NULL,
                name TEXT NOT NULL,
                source_type TEXT NOT NULL,
                status TEXT NOT NULL,
                url TEXT,
                snippet TEXT,
                ai_feedback TEXT,
                confidence_score INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY (control_id) REFERENCES controls(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_evidence_control ON evidence(control_id);

            -- Recurring assessment schedules
            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                standard_id TEXT NOT NULL,
                system_id TEXT,
                frequency TEXT NOT NULL,
                last_run TEXT,
                next_run TEXT,
                status TEXT NOT NULL DEFAULT 'Active'
            );

            -- Integration credentials (one row per provider)
            CREATE TABLE IF NOT EXISTS integrations (
                provider TEXT PRIMARY KEY,
                config_json TEXT NOT NULL,
                secret TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    // ========================================================================
    // Documents and chunks
    // ========================================================================

    pub fn insert_document(&self, doc: &Document) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO documents (id, name, status, chunk_count, size_bytes, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                doc.id,
                doc.name,
                doc.status,
                doc.chunk_count,
                doc.size_bytes,
                doc.created_at
            ],
        )?;
        Ok(())
    }

    pub fn get_document(&self, id: &str) -> Result<Document, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, status, chunk_count, size_bytes, created_at
                 FROM documents WHERE id = ?",
                params![id],
                |row| {
                    Ok(Document {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        status: row.get(2)?,
                        chunk_count: row.get(3)?,
                        size_bytes: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound {
                entity: "document",
                id: id.to_string(),
            })
    }

    pub fn set_document_status(&self, id: &str, status: DocumentStatus) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE documents SET status = ? WHERE id = ?",
            params![status, id],
        )?;
        Ok(())
    }

    /// Mark a document ready with its final chunk count
    pub fn mark_document_ready(&self, id: &str, chunk_count: i64) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE documents SET status = ?, chunk_count = ? WHERE id = ?",
            params![DocumentStatus::Ready, chunk_count, id],
        )?;
        Ok(())
    }

    /// Insert all chunks for a document in a single transaction.
    /// Any failure aborts the whole batch; a document never ends up with a
    /// partial chunk index.
    ///
    /// The index has a fixed embedding dimensionality, set by the first chunk
    /// ever written. A batch carrying a vector of any other length is rejected
    /// before anything is stored, since a mismatched vector would silently
    /// score 0.0 against every query.
    pub fn insert_chunks(&self, chunks: &[ChunkRecord]) -> Result<usize, DbError> {
        let Some(first) = chunks.first() else {
            return Ok(0);
        };
        let expected = match self.embedding_dimension()? {
            Some(dim) => dim,
            None => first.embedding.len(),
        };
        for chunk in chunks {
            if chunk.embedding.len() != expected {
                return Err(DbError::InvalidRow(format!(
                    "chunk {} has embedding dimension {}, index expects {}",
                    chunk.id,
                    chunk.embedding.len(),
                    expected
                )));
            }
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO document_chunks (id, document_id, chunk_index, content, embedding)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.id,
                    chunk.document_id,
                    chunk.chunk_index,
                    chunk.content,
                    embedding_to_blob(&chunk.embedding),
                ])?;
            }
        }
        tx.commit()?;
        Ok(chunks.len())
    }

    /// Dimensionality of the stored chunk index, or None while it is empty
    fn embedding_dimension(&self) -> Result<Option<usize>, DbError> {
        let bytes: Option<i64> = self
            .conn
            .query_row(
                "SELECT length(embedding) FROM document_chunks LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes.map(|b| b as usize / std::mem::size_of::<f32>()))
    }

    /// Load every chunk with its embedding for similarity scanning
    pub fn all_chunks_with_embeddings(&self) -> Result<Vec<ChunkRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, document_id, chunk_index, content, embedding
             FROM document_chunks ORDER BY document_id, chunk_index",
        )?;

        let chunks = stmt
            .query_map([], |row| {
                let blob: Vec<u8> = row.get(4)?;
                Ok(ChunkRecord {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    chunk_index: row.get(2)?,
                    content: row.get(3)?,
                    embedding: embedding_from_blob(&blob),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(chunks)
    }

    pub fn document_count(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?)
    }

    pub fn chunk_count(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM document_chunks", [], |row| row.get(0))?)
    }

    // ========================================================================
    // Standards and master controls
    // ========================================================================

    pub fn insert_standard(&self, standard: &Standard) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO standards (id, name, description, total_controls, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                standard.id,
                standard.name,
                standard.description,
                standard.total_controls,
                standard.created_at
            ],
        )?;
        Ok(())
    }

    /// Standard display name, or None when the id is unknown
    pub fn standard_name(&self, id: &str) -> Result<Option<String>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT name FROM standards WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn insert_master_controls(&self, masters: &[MasterControl]) -> Result<usize, DbError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO master_controls
                 (id, standard_id, control_code, family, description, guidance, embedding)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )?;
            for m in masters {
                stmt.execute(params![
                    m.id,
                    m.standard_id,
                    m.control_code,
                    m.family,
                    m.description,
                    m.guidance,
                    embedding_to_blob(&m.embedding),
                ])?;
            }
        }
        tx.commit()?;
        Ok(masters.len())
    }

    pub fn master_controls_for_standard(
        &self,
        standard_id: &str,
    ) -> Result<Vec<MasterControl>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, standard_id, control_code, family, description, guidance, embedding
             FROM master_controls WHERE standard_id = ? ORDER BY control_code",
        )?;

        let masters = stmt
            .query_map(params![standard_id], |row| {
                let blob: Option<Vec<u8>> = row.get(6)?;
                Ok(MasterControl {
                    id: row.get(0)?,
                    standard_id: row.get(1)?,
                    control_code: row.get(2)?,
                    family: row.get(3)?,
                    description: row.get(4)?,
                    guidance: row.get(5)?,
                    embedding: blob.map(|b| embedding_from_blob(&b)).unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(masters)
    }

    // ========================================================================
    // Assessments, controls, evidence
    // ========================================================================

    pub fn insert_assessment(&self, assessment: &Assessment) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO assessments (id, title, system_id, standard_name, status, progress, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                assessment.id,
                assessment.title,
                assessment.system_id,
                assessment.standard_name,
                assessment.status,
                assessment.progress,
                assessment.created_at
            ],
        )?;
        Ok(())
    }

    pub fn get_assessment(&self, id: &str) -> Result<Assessment, DbError> {
        self.conn
            .query_row(
                "SELECT id, title, system_id, standard_name, status, progress, created_at
                 FROM assessments WHERE id = ?",
                params![id],
                |row| {
                    Ok(Assessment {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        system_id: row.get(2)?,
                        standard_name: row.get(3)?,
                        status: row.get(4)?,
                        progress: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound {
                entity: "assessment",
                id: id.to_string(),
            })
    }

    pub fn insert_controls(&self, controls: &[Control]) -> Result<usize, DbError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO controls (id, assessment_id, control_code, family, description, status)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )?;
            for c in controls {
                stmt.execute(params![
                    c.id,
                    c.assessment_id,
                    c.control_code,
                    c.family,
                    c.description,
                    c.status,
                ])?;
            }
        }
        tx.commit()?;
        Ok(controls.len())
    }

    pub fn get_control(&self, id: &str) -> Result<Control, DbError> {
        self.conn
            .query_row(
                "SELECT id, assessment_id, control_code, family, description, status
                 FROM controls WHERE id = ?",
                params![id],
                |row| {
                    Ok(Control {
                        id: row.get(0)?,
                        assessment_id: row.get(1)?,
                        control_code: row.get(2)?,
                        family: row.get(3)?,
                        description: row.get(4)?,
                        status: row.get(5)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound {
                entity: "control",
                id: id.to_string(),
            })
    }

    pub fn controls_for_assessment(&self, assessment_id: &str) -> Result<Vec<Control>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, assessment_id, control_code, family, description, status
             FROM controls WHERE assessment_id = ? ORDER BY control_code",
        )?;

        let controls = stmt
            .query_map(params![assessment_id], |row| {
                Ok(Control {
                    id: row.get(0)?,
                    assessment_id: row.get(1)?,
                    control_code: row.get(2)?,
                    family: row.get(3)?,
                    description: row.get(4)?,
                    status: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(controls)
    }

    /// Re-applying the same status is a no-op update, so callers may retry.
    pub fn update_control_status(&self, id: &str, status: ControlStatus) -> Result<(), DbError> {
        let updated = self.conn.execute(
            "UPDATE controls SET status = ? WHERE id = ?",
            params![status, id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound {
                entity: "control",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub fn insert_evidence(&self, evidence: &Evidence) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO evidence
             (id, control_id, name, source_type, status, url, snippet, ai_feedback, confidence_score, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                evidence.id,
                evidence.control_id,
                evidence.name,
                evidence.source_type,
                evidence.status,
                evidence.url,
                evidence.snippet,
                evidence.ai_feedback,
                evidence.confidence_score,
                evidence.created_at
            ],
        )?;
        Ok(())
    }

    pub fn get_evidence(&self, id: &str) -> Result<Evidence, DbError> {
        self.conn
            .query_row(
                "SELECT id, control_id, name, source_type, status, url, snippet,
                        ai_feedback, confidence_score, created_at
                 FROM evidence WHERE id = ?",
                params![id],
                |row| {
                    Ok(Evidence {
                        id: row.get(0)?,
                        control_id: row.get(1)?,
                        name: row.get(2)?,
                        source_type: row.get(3)?,
                        status: row.get(4)?,
                        url: row.get(5)?,
                        snippet: row.get(6)?,
                        ai_feedback: row.get(7)?,
                        confidence_score: row.get(8)?,
                        created_at: row.get(9)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound {
                entity: "evidence",
                id: id.to_string(),
            })
    }

    /// Persist an AI verdict on an evidence row; returns the owning control id
    pub fn update_evidence_verdict(
        &self,
        id: &str,
        status: EvidenceStatus,
        ai_feedback: &str,
        confidence_score: i64,
    ) -> Result<String, DbError> {
        let control_id: Option<String> = self
            .conn
            .query_row(
                "SELECT control_id FROM evidence WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        let control_id = control_id.ok_or_else(|| DbError::NotFound {
            entity: "evidence",
            id: id.to_string(),
        })?;

        self.conn.execute(
            "UPDATE evidence SET status = ?, ai_feedback = ?, confidence_score = ? WHERE id = ?",
            params![status, ai_feedback, confidence_score, id],
        )?;

        Ok(control_id)
    }

    // ========================================================================
    // Schedules
    // ========================================================================

    pub fn insert_schedule(&self, schedule: &Schedule) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO schedules (id, name, standard_id, system_id, frequency, last_run, next_run, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                schedule.id,
                schedule.name,
                schedule.standard_id,
                schedule.system_id,
                schedule.frequency,
                schedule.last_run,
                schedule.next_run,
                schedule.status
            ],
        )?;
        Ok(())
    }

    pub fn get_schedule(&self, id: &str) -> Result<Schedule, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, standard_id, system_id, frequency, last_run, next_run, status
                 FROM schedules WHERE id = ?",
                params![id],
                |row| {
                    Ok(Schedule {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        standard_id: row.get(2)?,
                        system_id: row.get(3)?,
                        frequency: row.get(4)?,
                        last_run: row.get(5)?,
                        next_run: row.get(6)?,
                        status: row.get(7)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound {
                entity: "schedule",
                id: id.to_string(),
            })
    }

    pub fn update_schedule_run(
        &self,
        id: &str,
        last_run: &str,
        next_run: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE schedules SET last_run = ?, next_run = ? WHERE id = ?",
            params![last_run, next_run, id],
        )?;
        Ok(())
    }

    // ========================================================================
    // Integrations
    // ========================================================================

    pub fn get_integration(&self, provider: &str) -> Result<Option<IntegrationRecord>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT provider, config_json, secret FROM integrations WHERE provider = ?",
                params![provider],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((provider, config_json, secret)) => {
                let config = serde_json::from_str(&config_json)
                    .map_err(|e| DbError::InvalidRow(format!("integration config: {}", e)))?;
                Ok(Some(IntegrationRecord {
                    provider,
                    config,
                    secret,
                }))
            }
        }
    }

    pub fn upsert_integration(&self, record: &IntegrationRecord) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO integrations (provider, config_json, secret) VALUES (?, ?, ?)",
            params![record.provider, record.config.to_string(), record.secret],
        )?;
        Ok(())
    }
}

/// Current UTC timestamp in the storage format
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
