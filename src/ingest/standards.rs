//! Standards spreadsheet importer
//!
//! Real framework exports (NIST, CMMC, ISO) never agree on column names, so
//! the header row is matched fuzzily. Detection is positional on ties: the
//! leftmost matching column wins.

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ai::EmbeddingClient;
use crate::db::{now_rfc3339, Database, MasterControl, Standard};
use crate::error::{AppError, ErrorCategory, ErrorCode};

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub standard_id: String,
    pub imported: usize,
    pub skipped: usize,
}

/// Header-to-field assignment for one spreadsheet
#[derive(Debug, Default, PartialEq)]
struct ColumnMap {
    code: Option<usize>,
    description: Option<usize>,
    family: Option<usize>,
    guidance: Option<usize>,
}

/// One usable row after header mapping
#[derive(Debug, Clone, PartialEq)]
struct ParsedControl {
    code: String,
    family: String,
    description: String,
    guidance: String,
}

const CODE_HINTS: &[&str] = &["id", "control", "number", "ref"];
// "Control Text" or "Requirement Description" must never be mistaken for a
// code column.
const CODE_EXCLUDES: &[&str] = &["desc", "text", "question", "requirement"];
const DESCRIPTION_HINTS: &[&str] = &["desc", "requirement", "question", "text", "guidance"];
const FAMILY_HINTS: &[&str] = &["family", "domain", "group", "category"];
const GUIDANCE_HINTS: &[&str] = &["guide", "help", "discussion", "implementation"];

/// Two-pass column lookup: exact lowercase match first, then substring match
/// honoring the exclusion list. Leftmost matching column wins within a pass.
fn find_column(headers: &[String], hints: &[&str], excludes: &[&str]) -> Option<usize> {
    if let Some(i) = headers
        .iter()
        .position(|h| hints.iter().any(|c| h == c))
    {
        return Some(i);
    }

    headers.iter().position(|h| {
        hints.iter().any(|c| h.contains(c)) && !excludes.iter().any(|e| h.contains(e))
    })
}

fn detect_columns(headers: &[String]) -> ColumnMap {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    ColumnMap {
        code: find_column(&lowered, CODE_HINTS, CODE_EXCLUDES),
        description: find_column(&lowered, DESCRIPTION_HINTS, &[]),
        family: find_column(&lowered, FAMILY_HINTS, &[]),
        guidance: find_column(&lowered, GUIDANCE_HINTS, &[]),
    }
}

/// Map data rows through the detected columns. Rows without a description
/// are skipped; rows without a code get a synthetic `ROW-{n}` code keyed to
/// their 1-based data row number.
fn parse_master_rows(headers: &[String], rows: &[Vec<String>]) -> (Vec<ParsedControl>, usize) {
    let map = detect_columns(headers);
    let cell = |row: &[String], idx: Option<usize>| -> String {
        idx.and_then(|i| row.get(i))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let mut parsed = Vec::new();
    let mut skipped = 0;

    for (n, row) in rows.iter().enumerate() {
        let description = cell(row, map.description);
        if description.is_empty() {
            skipped += 1;
            continue;
        }

        let code = match cell(row, map.code) {
            c if c.is_empty() => format!("ROW-{}", n + 1),
            c => c,
        };
        let family = match cell(row, map.family) {
            f if f.is_empty() => "General".to_string(),
            f => f,
        };

        parsed.push(ParsedControl {
            code,
            family,
            description,
            guidance: cell(row, map.guidance),
        });
    }

    (parsed, skipped)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

pub struct StandardImporter<'a> {
    db: &'a Database,
    embedder: &'a dyn EmbeddingClient,
}

impl<'a> StandardImporter<'a> {
    pub fn new(db: &'a Database, embedder: &'a dyn EmbeddingClient) -> Self {
        Self { db, embedder }
    }

    /// Import an xlsx control catalog as a new standard
    pub async fn import_xlsx(&self, path: &Path, name: &str) -> Result<ImportSummary, AppError> {
        let unreadable = |detail: String| {
            AppError::new(
                ErrorCode::EXTRACT_UNREADABLE,
                "Could not read spreadsheet",
                ErrorCategory::Extraction,
            )
            .with_detail(detail)
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| unreadable("workbook has no sheets".to_string()))?
            .map_err(|e| unreadable(e.to_string()))?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|r| r.iter().map(cell_to_string).collect())
            .unwrap_or_default();
        let data_rows: Vec<Vec<String>> = rows
            .map(|r| r.iter().map(cell_to_string).collect())
            .collect();

        let (parsed, skipped) = parse_master_rows(&headers, &data_rows);
        if parsed.is_empty() {
            return Err(AppError::new(
                ErrorCode::EXTRACT_EMPTY,
                format!("No usable control rows found in '{}'", name),
                ErrorCategory::Extraction,
            ));
        }
        if skipped > 0 {
            warn!(standard = name, skipped, "skipped rows without a description");
        }

        let standard_id = Uuid::new_v4().to_string();
        let mut masters = Vec::with_capacity(parsed.len());
        for control in &parsed {
            // The embedded text is what policy mapping matches against, so
            // it carries code, description and guidance together.
            let embed_text = format!(
                "{}: {} {}",
                control.code, control.description, control.guidance
            );
            let embedding = self.embedder.embed(embed_text.trim()).await?;
            masters.push(MasterControl {
                id: Uuid::new_v4().to_string(),
                standard_id: standard_id.clone(),
                control_code: control.code.clone(),
                family: control.family.clone(),
                description: control.description.clone(),
                guidance: control.guidance.clone(),
                embedding,
            });
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.db.insert_standard(&Standard {
            id: standard_id.clone(),
            name: name.to_string(),
            description: format!("Imported from {}", file_name),
            // Row count at import time, including rows later skipped for
            // having no description.
            total_controls: data_rows.len() as i64,
            created_at: now_rfc3339(),
        })?;
        let imported = self.db.insert_master_controls(&masters)?;

        info!(standard = name, imported, skipped, "standard imported");
        Ok(ImportSummary {
            standard_id,
            imported,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(h: &[&str]) -> Vec<String> {
        h.iter().map(|s| s.to_string()).collect()
    }

    fn row(r: &[&str]) -> Vec<String> {
        r.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detects_standard_nist_headers() {
        let map = detect_columns(&headers(&[
            "Control Identifier",
            "Control Text",
            "Family",
            "Discussion",
        ]));
        assert_eq!(map.code, Some(0));
        assert_eq!(map.description, Some(1));
        assert_eq!(map.family, Some(2));
        assert_eq!(map.guidance, Some(3));
    }

    #[test]
    fn test_control_text_is_not_a_code_column() {
        // "Control Text" matches a code hint ("control") but must land as
        // the description column.
        let map = detect_columns(&headers(&["Control Text", "Domain"]));
        assert_eq!(map.code, None);
        assert_eq!(map.description, Some(0));
        assert_eq!(map.family, Some(1));
    }

    #[test]
    fn test_leftmost_column_wins_ties() {
        let map = detect_columns(&headers(&["Req ID", "Ref Number", "Requirement"]));
        assert_eq!(map.code, Some(0));
        assert_eq!(map.description, Some(2));
    }

    #[test]
    fn test_rows_without_description_are_skipped() {
        let h = headers(&["ID", "Description"]);
        let rows = vec![row(&["AC-1", "Limit access"]), row(&["AC-2", ""])];
        let (parsed, skipped) = parse_master_rows(&h, &rows);
        assert_eq!(parsed.len(), 1);
        assert_eq!(skipped, 1);
        assert_eq!(parsed[0].code, "AC-1");
    }

    #[test]
    fn test_missing_code_gets_row_number() {
        let h = headers(&["ID", "Description", "Category"]);
        let rows = vec![
            row(&["", "First requirement text here"]),
            row(&["", "Second requirement text here"]),
        ];
        let (parsed, _) = parse_master_rows(&h, &rows);
        assert_eq!(parsed[0].code, "ROW-1");
        assert_eq!(parsed[1].code, "ROW-2");
        assert_eq!(parsed[0].family, "General");
    }

    #[test]
    fn test_cell_to_string_trims_float_zero() {
        assert_eq!(cell_to_string(&Data::Float(3.0)), "3");
        assert_eq!(cell_to_string(&Data::Float(3.5)), "3.5");
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String("AC-1".into())), "AC-1");
    }
}
