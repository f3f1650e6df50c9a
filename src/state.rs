use crate::data::loader::{IngestOptions, UploadedFile};
use crate::page::{Page, PageKind};
use crate::ui::filter_input::FilterControls;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// A page controller together with its filter widget state.
#[derive(Debug)]
pub struct PageState {
    pub page: Page,
    pub controls: FilterControls,
}

/// The full UI state, independent of rendering.
#[derive(Debug)]
pub struct AppState {
    /// Page shown in the central area.
    pub current: PageKind,

    /// One entry per `PageKind::ALL`, in that order.
    pub pages: Vec<PageState>,

    /// Status / error message shown in the top bar.
    pub status_message: Option<String>,
}

impl PageState {
    pub fn new(kind: PageKind) -> Self {
        PageState {
            page: Page::new(kind),
            controls: FilterControls::default(),
        }
    }

    /// Bring the page up to date; selections made on another table are dropped.
    pub fn refresh(&mut self, options: &IngestOptions) {
        self.page.refresh(options);
        self.controls.follow(&self.page.table_id());
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            current: PageKind::SingleFile,
            pages: PageKind::ALL.iter().map(|&kind| PageState::new(kind)).collect(),
            status_message: None,
        }
    }
}

impl AppState {
    fn current_index(&self) -> usize {
        PageKind::ALL
            .iter()
            .position(|k| *k == self.current)
            .unwrap_or(0)
    }

    pub fn current_page(&self) -> &PageState {
        &self.pages[self.current_index()]
    }

    pub fn current_page_mut(&mut self) -> &mut PageState {
        let idx = self.current_index();
        &mut self.pages[idx]
    }

    /// Put a freshly uploaded file into a slot of the current page.
    pub fn set_upload(&mut self, slot: usize, file: UploadedFile) {
        let state = self.current_page_mut();
        let Some(target) = state.page.slots.get_mut(slot) else {
            log::warn!("No upload slot {slot} on this page");
            return;
        };
        log::info!("Uploaded {} ({} bytes) into slot {slot}", file.name, file.bytes.len());
        target.set_file(file);
        state.controls.reset();
        self.status_message = None;
    }

    pub fn clear_upload(&mut self, slot: usize) {
        let state = self.current_page_mut();
        if let Some(target) = state.page.slots.get_mut(slot) {
            target.clear();
            state.controls.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui;

    use super::*;
    use crate::data::filter::FilterBuilder;
    use crate::page::PageOutcome;
    use crate::ui::filter_input::EguiFilterInput;

    /// One egui frame of the page's filter widgets; returns the rows shown.
    fn visible_rows(ctx: &egui::Context, state: &mut PageState) -> usize {
        let mut rows = 0;
        let _ = ctx.run(egui::RawInput::default(), |ctx: &egui::Context| {
            egui::CentralPanel::default().show(ctx, |ui: &mut egui::Ui| {
                let PageState { page, controls } = &mut *state;
                if let PageOutcome::Ready { table, datetimes } = page.outcome() {
                    let mut input = EguiFilterInput::new(ui, controls);
                    rows = FilterBuilder::default()
                        .apply(table, datetimes, &mut input)
                        .len();
                }
            });
        });
        rows
    }

    fn filter_on(state: &mut PageState, column: &str) {
        state.controls.enabled = true;
        state.controls.columns = vec![column.to_string()];
    }

    #[test]
    fn changing_join_keys_restores_filter_defaults() {
        let options = IngestOptions::default();
        let ctx = egui::Context::default();
        let mut state = PageState::new(PageKind::MultipleFiles);
        state.page.slots[0].set_file(UploadedFile::new(
            "people.csv",
            "id,city\n1,Oslo\n2,Rome\n3,Lima\n",
        ));
        state.page.slots[1].set_file(UploadedFile::new("refs.csv", "ref,alt\n1,1\n2,2\n9,3\n"));

        // id = ref matches Oslo and Rome only.
        state.refresh(&options);
        filter_on(&mut state, "city");
        assert_eq!(visible_rows(&ctx, &mut state), 2);

        // id = alt matches all three; Lima must not be hidden by the old value set.
        state.page.join_keys.foreign = Some("alt".into());
        state.refresh(&options);
        assert!(state.controls.columns.is_empty());
        filter_on(&mut state, "city");
        assert_eq!(visible_rows(&ctx, &mut state), 3);
    }

    #[test]
    fn reparsed_upload_restores_filter_defaults() {
        let options = IngestOptions::default();
        let ctx = egui::Context::default();
        let mut state = PageState::new(PageKind::SingleFile);
        state.page.slots[0].set_file(UploadedFile::new("a.csv", "city\nOslo\nRome\n"));
        state.refresh(&options);
        filter_on(&mut state, "city");
        assert_eq!(visible_rows(&ctx, &mut state), 2);

        // Same column name, different values: what a sheet switch looks like.
        state.page.slots[0].set_file(UploadedFile::new("a.csv", "city\nOslo\nParis\nLima\n"));
        state.refresh(&options);
        filter_on(&mut state, "city");
        assert_eq!(visible_rows(&ctx, &mut state), 3);
    }

    #[test]
    fn unchanged_table_keeps_filter_selections() {
        let options = IngestOptions::default();
        let mut state = PageState::new(PageKind::SingleFile);
        state.page.slots[0].set_file(UploadedFile::new("a.csv", "city\nOslo\nRome\n"));
        state.refresh(&options);
        filter_on(&mut state, "city");
        state.refresh(&options);
        assert_eq!(state.controls.columns, vec!["city".to_string()]);
    }

    #[test]
    fn uploads_go_to_the_current_page() {
        let mut state = AppState::default();
        state.current = PageKind::MultipleFiles;
        state.set_upload(1, UploadedFile::new("b.csv", "id\n1\n"));

        assert!(state.pages[0].page.slots[0].file().is_none());
        assert_eq!(
            state.pages[1].page.slots[1].file().map(|f| f.name.as_str()),
            Some("b.csv")
        );
    }

    #[test]
    fn out_of_range_slot_is_ignored() {
        let mut state = AppState::default();
        state.set_upload(3, UploadedFile::new("b.csv", "id\n1\n"));
        assert!(state.pages[0].page.slots[0].file().is_none());
    }
}
