use crate::data::filter::DatetimeColumns;
use crate::data::join::{JoinError, JoinSpec, inner_join};
use crate::data::loader::{self, IngestError, IngestOptions, UploadedFile};
use crate::data::model::Table;

// ---------------------------------------------------------------------------
// Page variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    SingleFile,
    MultipleFiles,
}

impl PageKind {
    pub const ALL: [PageKind; 2] = [PageKind::SingleFile, PageKind::MultipleFiles];

    pub fn title(self) -> &'static str {
        match self {
            PageKind::SingleFile => "Single File Layout",
            PageKind::MultipleFiles => "Multiple File Layout",
        }
    }

    pub fn slot_count(self) -> usize {
        match self {
            PageKind::SingleFile => 1,
            PageKind::MultipleFiles => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Upload slot – one file input and its cached table
// ---------------------------------------------------------------------------

/// An upload plus the table parsed from it.
///
/// Parsing only reruns when the file or the chosen sheet changes; every
/// re-parse bumps `version` so downstream caches know to refresh.
#[derive(Debug, Default)]
pub struct UploadSlot {
    file: Option<UploadedFile>,
    sheets: Vec<String>,
    pub selected_sheet: Option<String>,
    parsed: Option<(Option<String>, Result<Table, IngestError>)>,
    version: u64,
}

impl UploadSlot {
    pub fn set_file(&mut self, file: UploadedFile) {
        self.sheets = loader::sheet_names(&file).unwrap_or_default();
        self.selected_sheet = self.sheets.first().cloned();
        self.file = Some(file);
        self.parsed = None;
    }

    pub fn clear(&mut self) {
        *self = UploadSlot {
            version: self.version + 1,
            ..UploadSlot::default()
        };
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    /// Sheet names when the upload is a workbook.
    pub fn sheets(&self) -> &[String] {
        &self.sheets
    }

    pub fn result(&self) -> Option<&Result<Table, IngestError>> {
        self.parsed.as_ref().map(|(_, r)| r)
    }

    fn refresh(&mut self, options: &IngestOptions) {
        let Some(file) = &self.file else {
            return;
        };
        let stale = match &self.parsed {
            Some((sheet, _)) => *sheet != self.selected_sheet,
            None => true,
        };
        if stale {
            let result = loader::ingest(file, self.selected_sheet.as_deref(), options);
            self.parsed = Some((self.selected_sheet.clone(), result));
            self.version += 1;
        }
    }

    fn table(&self) -> Option<&Table> {
        self.result().and_then(|r| r.as_ref().ok())
    }
}

// ---------------------------------------------------------------------------
// Page controller
// ---------------------------------------------------------------------------

/// What a page can show after ingesting (and joining) its uploads.
#[derive(Debug)]
pub enum PageOutcome<'a> {
    /// Not every upload is in yet.
    Waiting,
    /// Inline diagnostics, one per failed upload.
    Failed(Vec<String>),
    /// Uploads that parsed but have no rows to join on.
    NoRows(Vec<String>),
    JoinFailed(String),
    /// The table to hand to the filter builder, with its date-like columns parsed.
    Ready {
        table: &'a Table,
        datetimes: &'a DatetimeColumns,
    },
}

/// Selected join key columns; `None` falls back to each table's first column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinKeys {
    pub primary: Option<String>,
    pub foreign: Option<String>,
}

/// Identifies the table a page shows: which parse of each upload, joined how.
///
/// Any sheet change, re-upload or key change yields a different id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableId {
    versions: Vec<u64>,
    join: Option<JoinSpec>,
}

#[derive(Debug)]
pub struct Page {
    pub kind: PageKind,
    pub slots: Vec<UploadSlot>,
    pub join_keys: JoinKeys,
    joined: Option<((u64, u64, JoinSpec), Result<Table, JoinError>)>,
    datetimes: Option<(TableId, DatetimeColumns)>,
}

impl Page {
    pub fn new(kind: PageKind) -> Self {
        Page {
            kind,
            slots: (0..kind.slot_count()).map(|_| UploadSlot::default()).collect(),
            join_keys: JoinKeys::default(),
            joined: None,
            datetimes: None,
        }
    }

    /// Re-parse changed uploads and redo the join if its inputs changed.
    pub fn refresh(&mut self, options: &IngestOptions) {
        for slot in &mut self.slots {
            slot.refresh(options);
        }
        if self.kind == PageKind::MultipleFiles {
            self.refresh_join();
        }

        let id = self.table_id();
        if self.datetimes.as_ref().is_some_and(|(k, _)| *k == id) {
            return;
        }
        let datetimes = self.prepared_table().map(DatetimeColumns::of).unwrap_or_default();
        self.datetimes = Some((id, datetimes));
    }

    pub fn table_id(&self) -> TableId {
        TableId {
            versions: self.slots.iter().map(|s| s.version).collect(),
            join: match self.kind {
                PageKind::SingleFile => None,
                PageKind::MultipleFiles => self.join_spec(),
            },
        }
    }

    /// Column names offered as join keys once both tables have rows.
    pub fn key_options(&self) -> Option<(Vec<String>, Vec<String>)> {
        match self.slots.as_slice() {
            [a, b] => {
                let (left, right) = (a.table()?, b.table()?);
                if left.is_empty() || right.is_empty() {
                    return None;
                }
                Some((left.column_names(), right.column_names()))
            }
            _ => None,
        }
    }

    /// The key pair in effect, with stale or missing picks replaced by defaults.
    pub fn join_spec(&self) -> Option<JoinSpec> {
        let (left, right) = self.key_options()?;
        let pick = |choice: &Option<String>, names: &[String]| {
            choice
                .clone()
                .filter(|c| names.contains(c))
                .or_else(|| names.first().cloned())
        };
        Some(JoinSpec {
            primary: pick(&self.join_keys.primary, &left)?,
            foreign: pick(&self.join_keys.foreign, &right)?,
        })
    }

    fn refresh_join(&mut self) {
        let Some(spec) = self.join_spec() else {
            self.joined = None;
            return;
        };
        let key = (self.slots[0].version, self.slots[1].version, spec);
        if self.joined.as_ref().is_some_and(|(k, _)| *k == key) {
            return;
        }
        let (Some(left), Some(right)) = (self.slots[0].table(), self.slots[1].table()) else {
            return;
        };
        let result = inner_join(left, right, &key.2);
        if let Err(e) = &result {
            log::warn!("Join failed: {e}");
        }
        self.joined = Some((key, result));
    }

    /// The table the filter builder starts from: the upload, or the join of both.
    pub fn prepared_table(&self) -> Option<&Table> {
        match self.kind {
            PageKind::SingleFile => self.slots.first().and_then(UploadSlot::table),
            PageKind::MultipleFiles => match &self.joined {
                Some((_, Ok(table))) => Some(table),
                _ => None,
            },
        }
    }

    pub fn outcome(&self) -> PageOutcome<'_> {
        if self.slots.iter().any(|s| s.file().is_none()) {
            return PageOutcome::Waiting;
        }
        let failures: Vec<String> = self
            .slots
            .iter()
            .filter_map(|s| s.result()?.as_ref().err().map(|e| e.to_string()))
            .collect();
        if !failures.is_empty() {
            return PageOutcome::Failed(failures);
        }

        if self.kind == PageKind::MultipleFiles {
            let empty: Vec<String> = self
                .slots
                .iter()
                .filter(|s| s.table().is_some_and(Table::is_empty))
                .filter_map(|s| s.file())
                .map(|f| format!("{}: no rows to join on", f.name))
                .collect();
            if !empty.is_empty() {
                return PageOutcome::NoRows(empty);
            }
            if let Some((_, Err(e))) = &self.joined {
                return PageOutcome::JoinFailed(e.to_string());
            }
        }

        match (self.prepared_table(), &self.datetimes) {
            (Some(table), Some((_, datetimes))) => PageOutcome::Ready { table, datetimes },
            _ => PageOutcome::Waiting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, ColumnKind};

    impl Page {
        fn prepare(&mut self, options: &IngestOptions) -> PageOutcome<'_> {
            self.refresh(options);
            self.outcome()
        }
    }

    fn csv(name: &str, text: &str) -> UploadedFile {
        UploadedFile::new(name, text)
    }

    #[test]
    fn single_file_page_waits_then_shows_the_table() {
        let mut page = Page::new(PageKind::SingleFile);
        let options = IngestOptions::default();
        assert!(matches!(page.prepare(&options), PageOutcome::Waiting));

        page.slots[0].set_file(csv("a.csv", "id,name\n1,a\n2,b\n"));
        match page.prepare(&options) {
            PageOutcome::Ready { table, .. } => assert_eq!(table.len(), 2),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn unsupported_upload_is_a_diagnostic() {
        let mut page = Page::new(PageKind::SingleFile);
        page.slots[0].set_file(UploadedFile::new("photo.png", vec![1, 2, 3]));
        match page.prepare(&IngestOptions::default()) {
            PageOutcome::Failed(messages) => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].contains("image/png"), "{}", messages[0]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn two_file_page_needs_both_uploads() {
        let mut page = Page::new(PageKind::MultipleFiles);
        page.slots[0].set_file(csv("a.csv", "id,name\n1,a\n"));
        assert!(matches!(
            page.prepare(&IngestOptions::default()),
            PageOutcome::Waiting
        ));
    }

    #[test]
    fn two_file_page_joins_on_selected_keys() {
        let mut page = Page::new(PageKind::MultipleFiles);
        let options = IngestOptions::default();
        page.slots[0].set_file(csv("a.csv", "id,name\n1,a\n2,b\n"));
        page.slots[1].set_file(csv("b.csv", "id,val\n1,10\n3,30\n"));

        match page.prepare(&options) {
            PageOutcome::Ready { table, .. } => {
                assert_eq!(table.column_names(), vec!["id", "name", "val"]);
                assert_eq!(table.len(), 1);
                assert_eq!(table.column("val").unwrap().values, vec![CellValue::Integer(10)]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        page.join_keys.primary = Some("name".into());
        match page.prepare(&options) {
            PageOutcome::JoinFailed(message) => assert!(message.contains("name"), "{message}"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn stale_key_choice_falls_back_to_first_column() {
        let mut page = Page::new(PageKind::MultipleFiles);
        page.slots[0].set_file(csv("a.csv", "id,name\n1,a\n"));
        page.slots[1].set_file(csv("b.csv", "id,val\n1,10\n"));
        page.join_keys.foreign = Some("gone".into());
        page.prepare(&IngestOptions::default());
        assert_eq!(
            page.join_spec(),
            Some(JoinSpec {
                primary: "id".into(),
                foreign: "id".into()
            })
        );
    }

    #[test]
    fn cleared_slot_returns_to_waiting() {
        let mut page = Page::new(PageKind::SingleFile);
        page.slots[0].set_file(csv("a.csv", "id\n1\n"));
        page.prepare(&IngestOptions::default());
        page.slots[0].clear();
        assert!(matches!(
            page.prepare(&IngestOptions::default()),
            PageOutcome::Waiting
        ));
    }

    #[test]
    fn date_like_columns_are_parsed_once_per_table() {
        let mut page = Page::new(PageKind::SingleFile);
        page.slots[0].set_file(csv("a.csv", "id,day\n1,2020-01-01\n2,2020-02-01\n"));
        match page.prepare(&IngestOptions::default()) {
            PageOutcome::Ready { table, datetimes } => {
                assert_eq!(table.column("day").unwrap().kind(), ColumnKind::Text);
                assert_eq!(datetimes.get("day").unwrap().kind(), ColumnKind::DateTime);
                assert!(datetimes.get("id").is_none());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn table_id_follows_uploads_and_keys() {
        let options = IngestOptions::default();
        let mut page = Page::new(PageKind::MultipleFiles);
        page.slots[0].set_file(csv("a.csv", "id,ref\n1,1\n2,2\n"));
        page.slots[1].set_file(csv("b.csv", "id,val\n1,10\n2,20\n"));
        page.refresh(&options);
        let first = page.table_id();

        page.refresh(&options);
        assert_eq!(page.table_id(), first);

        page.join_keys.primary = Some("ref".into());
        page.refresh(&options);
        let rekeyed = page.table_id();
        assert_ne!(rekeyed, first);

        page.slots[1].set_file(csv("b.csv", "id,val\n1,11\n"));
        page.refresh(&options);
        assert_ne!(page.table_id(), rekeyed);
    }

    #[test]
    fn empty_upload_on_two_file_page_is_reported() {
        let mut page = Page::new(PageKind::MultipleFiles);
        page.slots[0].set_file(csv("a.csv", "id,name\n1,a\n"));
        page.slots[1].set_file(csv("empty.csv", "id,val\n"));
        match page.prepare(&IngestOptions::default()) {
            PageOutcome::NoRows(messages) => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].contains("empty.csv"), "{}", messages[0]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
