use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, Xlsx};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use thiserror::Error;

use super::model::{CellValue, Column, Table};

/// Table queried back from an uploaded SQL script unless configured otherwise.
pub const DEFAULT_SQL_TABLE: &str = "your_table";

// ---------------------------------------------------------------------------
// Uploaded files and their kinds
// ---------------------------------------------------------------------------

/// A file handed over by the upload dialog: its name and raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        UploadedFile {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(UploadedFile { name, bytes })
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_name(&self.name)
    }
}

/// How an upload gets parsed.  Resolved once from the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    Spreadsheet,
    Delimited,
    SqlScript,
    PlainText,
    Unsupported { mime: String },
}

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "xlsx" => FileKind::Spreadsheet,
            "csv" => FileKind::Delimited,
            "sql" => FileKind::SqlScript,
            "txt" => FileKind::PlainText,
            _ => FileKind::Unsupported {
                mime: mime_guess::from_path(name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("{name}: file type {mime} is not supported")]
    UnsupportedFileType { name: String, mime: String },
    #[error("{name}: {message}")]
    ParseFailure { name: String, message: String },
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Table read back after running an uploaded SQL script.
    pub sql_table_name: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            sql_table_name: DEFAULT_SQL_TABLE.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Sheet names of a spreadsheet upload; empty for every other kind.
pub fn sheet_names(file: &UploadedFile) -> Result<Vec<String>, IngestError> {
    match file.kind() {
        FileKind::Spreadsheet => {
            let workbook = open_workbook(&file.bytes).map_err(|e| parse_failure(file, e))?;
            Ok(workbook.sheet_names())
        }
        _ => Ok(Vec::new()),
    }
}

/// Parse an upload into a table.
///
/// Supported formats:
/// * `.xlsx` – the given sheet (or the first one), header in the first row
/// * `.csv`  – header row, per-column type inference
/// * `.sql`  – script run against an empty in-memory SQLite database, then
///   `SELECT * FROM <options.sql_table_name>`
/// * `.txt`  – the whole content as a single `Text` cell
pub fn ingest(
    file: &UploadedFile,
    sheet: Option<&str>,
    options: &IngestOptions,
) -> Result<Table, IngestError> {
    let result = match file.kind() {
        FileKind::Spreadsheet => load_spreadsheet(&file.bytes, sheet),
        FileKind::Delimited => load_csv(&file.bytes),
        FileKind::SqlScript => load_sql_script(&file.bytes, &options.sql_table_name),
        FileKind::PlainText => load_text(&file.bytes),
        FileKind::Unsupported { mime } => {
            log::warn!("Rejected upload {} ({mime})", file.name);
            return Err(IngestError::UnsupportedFileType {
                name: file.name.clone(),
                mime,
            });
        }
    };

    match result {
        Ok(table) => {
            log::info!(
                "Ingested {}: {} rows x {} columns",
                file.name,
                table.len(),
                table.width()
            );
            Ok(table)
        }
        Err(e) => {
            log::error!("Failed to ingest {}: {e:#}", file.name);
            Err(parse_failure(file, e))
        }
    }
}

fn parse_failure(file: &UploadedFile, e: anyhow::Error) -> IngestError {
    IngestError::ParseFailure {
        name: file.name.clone(),
        message: format!("{e:#}"),
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

fn open_workbook(bytes: &[u8]) -> Result<Xlsx<Cursor<&[u8]>>> {
    Xlsx::new(Cursor::new(bytes)).context("opening workbook")
}

fn load_spreadsheet(bytes: &[u8], sheet: Option<&str>) -> Result<Table> {
    let mut workbook = open_workbook(bytes)?;
    let sheet = match sheet {
        Some(s) => s.to_string(),
        None => workbook
            .sheet_names()
            .into_iter()
            .next()
            .context("workbook has no sheets")?,
    };
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading sheet '{sheet}'"))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let names = dedupe_headers(header.iter().map(|c| match c {
        Data::Empty => None,
        other => Some(spreadsheet_value(other).to_string()),
    }));

    let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (idx, values) in columns.iter_mut().enumerate() {
            values.push(row.get(idx).map_or(CellValue::Null, spreadsheet_value));
        }
    }

    build_table(names, columns)
}

fn spreadsheet_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or_else(|| CellValue::Float(dt.as_f64()), CellValue::DateTime),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(format!("#{e:?}")),
    }
}

/// Blank headers become `Unnamed: <idx>`; repeats get `.1`, `.2`, ... suffixes.
fn dedupe_headers(raw: impl Iterator<Item = Option<String>>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (idx, name) in raw.enumerate() {
        let base = match name {
            Some(n) if !n.trim().is_empty() => n,
            _ => format!("Unnamed: {idx}"),
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while names.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        names.push(candidate);
    }
    names
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(bytes: &[u8]) -> Result<Table> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new().from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let names = dedupe_headers(headers.into_iter().map(Some));

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (idx, values) in raw.iter_mut().enumerate() {
            values.push(record.get(idx).unwrap_or("").to_string());
        }
    }

    let columns = raw.into_iter().map(|cells| infer_csv_column(&cells)).collect();
    build_table(names, columns)
}

/// Whole-column inference: Integer, else Float, else Bool, else String.
fn infer_csv_column(cells: &[String]) -> Vec<CellValue> {
    let present = || cells.iter().map(|c| c.trim()).filter(|c| !c.is_empty());

    let convert = |parse: &dyn Fn(&str) -> Option<CellValue>| -> Vec<CellValue> {
        cells
            .iter()
            .map(|c| match c.trim() {
                "" => CellValue::Null,
                t => parse(t).unwrap_or_else(|| CellValue::String(c.clone())),
            })
            .collect()
    };

    if present().all(|c| c.parse::<i64>().is_ok()) {
        convert(&|t| t.parse::<i64>().ok().map(CellValue::Integer))
    } else if present().all(|c| c.parse::<f64>().is_ok()) {
        convert(&|t| t.parse::<f64>().ok().map(CellValue::Float))
    } else if present().all(|c| parse_bool(c).is_some()) {
        convert(&|t| parse_bool(t).map(CellValue::Bool))
    } else {
        cells
            .iter()
            .map(|c| {
                if c.trim().is_empty() {
                    CellValue::Null
                } else {
                    CellValue::String(c.clone())
                }
            })
            .collect()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// SQL script loader
// ---------------------------------------------------------------------------

/// Run the script in a throwaway in-memory database and read `table` back.
///
/// Only scripts that create a table with exactly this name can be loaded.
fn load_sql_script(bytes: &[u8], table: &str) -> Result<Table> {
    let script = std::str::from_utf8(bytes).context("SQL script is not valid UTF-8")?;

    let conn = Connection::open_in_memory().context("opening in-memory database")?;
    conn.execute_batch(script).context("executing SQL script")?;

    let query = format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""));
    let mut stmt = conn
        .prepare(&query)
        .with_context(|| format!("script does not define table '{table}'"))?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    // SQLite stores booleans as integers; the declared type is all that is left.
    let declared_bool: Vec<bool> = stmt
        .columns()
        .iter()
        .map(|c| c.decl_type().is_some_and(is_boolean_type))
        .collect();
    let width = names.len();

    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(sql_value))
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .with_context(|| format!("querying table '{table}'"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("reading rows of '{table}'"))?;

    let columns = Table::from_rows(&names, rows)?
        .into_columns()
        .into_iter()
        .zip(declared_bool)
        .map(|(column, boolean)| {
            let values = promote_numeric(column.values);
            if boolean {
                Column::categorical(column.name, values)
            } else {
                Column::new(column.name, values)
            }
        })
        .collect();
    Ok(Table::new(columns)?)
}

fn is_boolean_type(decl: &str) -> bool {
    decl.eq_ignore_ascii_case("BOOLEAN") || decl.eq_ignore_ascii_case("BOOL")
}

fn sql_value(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(f) => CellValue::Float(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            CellValue::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}

// ---------------------------------------------------------------------------
// Plain-text loader
// ---------------------------------------------------------------------------

fn load_text(bytes: &[u8]) -> Result<Table> {
    let text = std::str::from_utf8(bytes).context("text file is not valid UTF-8")?;
    build_table(
        vec!["Text".to_string()],
        vec![vec![CellValue::String(text.to_string())]],
    )
}

// -- shared helpers --

/// Integers mixed with floats become floats, as a float64 column would.
fn promote_numeric(values: Vec<CellValue>) -> Vec<CellValue> {
    let mut has_float = false;
    for v in &values {
        match v {
            CellValue::Float(_) => has_float = true,
            CellValue::Integer(_) | CellValue::Null => {}
            _ => return values,
        }
    }
    if !has_float {
        return values;
    }
    values
        .into_iter()
        .map(|v| match v {
            CellValue::Integer(i) => CellValue::Float(i as f64),
            other => other,
        })
        .collect()
}

fn build_table(names: Vec<String>, columns: Vec<Vec<CellValue>>) -> Result<Table> {
    if names.len() != columns.len() {
        bail!("{} headers but {} columns", names.len(), columns.len());
    }
    let columns = names
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name, promote_numeric(values)))
        .collect();
    Ok(Table::new(columns)?)
}
