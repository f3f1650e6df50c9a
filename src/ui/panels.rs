use std::borrow::Cow;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::config::AppConfig;
use crate::data::loader::UploadedFile;
use crate::data::model::Table;
use crate::page::{PageKind, PageOutcome};
use crate::state::{AppState, PageState};
use crate::ui::filter_input::EguiFilterInput;
use crate::ui::table::data_grid;

pub const APP_TITLE: &str = "SQL Automation For Client Analysis";

/// Where the grid's rows come from.
#[derive(Debug, Default)]
pub enum Grid {
    #[default]
    Empty,
    /// The page's prepared table, nothing filtered out.
    Prepared,
    Filtered(Table),
}

/// What the central panel should draw after the side panel ran the pipeline.
#[derive(Debug, Default)]
pub struct PageView {
    pub grid: Grid,
    /// Inline diagnostics (unsupported, unparsable or empty uploads).
    pub notes: Vec<String>,
    /// Non-fatal warnings (failed joins).
    pub warnings: Vec<String>,
    pub show_export_note: bool,
}

// ---------------------------------------------------------------------------
// Left side panel – uploads, join keys, filter widgets
// ---------------------------------------------------------------------------

/// Render the left panel of the current page and return what to display.
pub fn side_panel(ui: &mut Ui, state: &mut AppState, config: &AppConfig) -> PageView {
    let kind = state.current;
    ui.heading(kind.title());
    ui.separator();

    let mut view = PageView::default();
    let mut picked: Option<(usize, UploadedFile)> = None;
    let mut cleared: Option<usize> = None;
    let mut read_error: Option<String> = None;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            let current = state.current_page_mut();

            // ---- Upload slots ----
            for (idx, slot) in current.page.slots.iter_mut().enumerate() {
                ui.push_id(idx, |ui: &mut Ui| {
                    ui.strong("Please upload a .xlsx, .csv, or .sql file");
                    ui.horizontal(|ui: &mut Ui| {
                        if ui.button("Browse…").clicked() {
                            match pick_upload() {
                                Ok(Some(file)) => picked = Some((idx, file)),
                                Ok(None) => {}
                                Err(e) => {
                                    log::error!("Failed to read upload: {e:#}");
                                    read_error = Some(format!("Error: {e:#}"));
                                }
                            }
                        }
                        if let Some(file) = slot.file() {
                            ui.label(&file.name);
                            if ui.small_button("✖").clicked() {
                                cleared = Some(idx);
                            }
                        }
                    });

                    // ---- Sheet selector for workbooks ----
                    if slot.sheets().len() > 1 {
                        let name = slot.file().map(|f| f.name.clone()).unwrap_or_default();
                        let current = slot.selected_sheet.clone().unwrap_or_default();
                        egui::ComboBox::from_label(format!("Select a sheet to display for {name}"))
                            .selected_text(&current)
                            .show_ui(ui, |ui: &mut Ui| {
                                for sheet in slot.sheets().to_vec() {
                                    if ui.selectable_label(current == sheet, &sheet).clicked() {
                                        slot.selected_sheet = Some(sheet);
                                    }
                                }
                            });
                    }
                });
                ui.add_space(6.0);
            }

            current.refresh(&config.ingest_options());

            // ---- Join key selectors ----
            let page = &mut current.page;
            if let (Some((left, right)), Some(spec)) = (page.key_options(), page.join_spec()) {
                ui.separator();
                if let Some(k) =
                    key_selector(ui, "Select a Primary Key from Table 1", &left, &spec.primary)
                {
                    page.join_keys.primary = Some(k);
                }
                if let Some(k) =
                    key_selector(ui, "Select a Foreign Key from Table 2", &right, &spec.foreign)
                {
                    page.join_keys.foreign = Some(k);
                }
                current.refresh(&config.ingest_options());
            }

            ui.separator();
            let PageState { page, controls } = current;
            view.show_export_note =
                kind == PageKind::SingleFile && page.slots.iter().any(|s| s.file().is_some());

            match page.outcome() {
                PageOutcome::Waiting => {}
                PageOutcome::Failed(messages) | PageOutcome::NoRows(messages) => {
                    view.notes = messages
                }
                PageOutcome::JoinFailed(message) => view.warnings.push(message),
                PageOutcome::Ready { table, datetimes } => {
                    let mut input = EguiFilterInput::new(ui, controls);
                    view.grid = match config.filter_builder().apply(table, datetimes, &mut input) {
                        Cow::Borrowed(_) => Grid::Prepared,
                        Cow::Owned(filtered) => Grid::Filtered(filtered),
                    };
                }
            }
        });

    if let Some((slot, file)) = picked {
        state.set_upload(slot, file);
    }
    if let Some(slot) = cleared {
        state.clear_upload(slot);
    }
    if read_error.is_some() {
        state.status_message = read_error;
    }
    view
}

/// A combo box over `options`; returns the newly chosen one, if any.
fn key_selector(ui: &mut Ui, label: &str, options: &[String], current: &str) -> Option<String> {
    let mut chosen = None;
    egui::ComboBox::from_label(label)
        .selected_text(current)
        .show_ui(ui, |ui: &mut Ui| {
            for opt in options {
                if ui.selectable_label(opt == current, opt).clicked() {
                    chosen = Some(opt.clone());
                }
            }
        });
    chosen
}

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render diagnostics, the filtered grid, and the export note.
pub fn central_panel(ui: &mut Ui, state: &AppState, view: &PageView) {
    for note in &view.notes {
        ui.label(note);
    }
    for warning in &view.warnings {
        ui.label(RichText::new(warning).color(Color32::YELLOW));
    }

    if view.show_export_note {
        ui.label(
            RichText::new("DOWNLOAD BUTTON WAS TAKEN OUT DUE TO FILES GETTING CORRUPTED.")
                .color(Color32::YELLOW),
        );
        ui.separator();
    }

    let table = match &view.grid {
        Grid::Empty => None,
        Grid::Prepared => state.current_page().page.prepared_table(),
        Grid::Filtered(table) => Some(table),
    };
    match table {
        Some(table) => data_grid(ui, table),
        None if view.notes.is_empty() && view.warnings.is_empty() => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading("Upload a file to explore it  (Browse… on the left)");
            });
        }
        None => {}
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top bar: title, page switcher, status.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.strong(APP_TITLE);
        ui.separator();

        for kind in PageKind::ALL {
            if ui.selectable_label(state.current == kind, kind.title()).clicked() {
                state.current = kind;
            }
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

/// Ask for a file and read it; `Ok(None)` when the dialog was cancelled.
fn pick_upload() -> anyhow::Result<Option<UploadedFile>> {
    let path = rfd::FileDialog::new()
        .set_title("Upload a table")
        .add_filter("Supported files", &["xlsx", "csv", "sql"])
        .add_filter("Excel workbook", &["xlsx"])
        .add_filter("CSV", &["csv"])
        .add_filter("SQL script", &["sql"])
        .add_filter("All files", &["*"])
        .pick_file();

    path.map(|p| UploadedFile::from_path(&p)).transpose()
}
