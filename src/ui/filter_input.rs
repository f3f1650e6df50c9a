use std::collections::HashMap;

use chrono::NaiveDate;
use eframe::egui::{self, Color32, RichText, Ui};
use egui_extras::DatePickerButton;

use crate::data::filter::FilterInput;
use crate::data::model::CellValue;
use crate::page::TableId;

// ---------------------------------------------------------------------------
// Widget state that survives between frames
// ---------------------------------------------------------------------------

/// Selections made in the filter widgets of one page.
///
/// A column without an entry shows the widget's default. Entries are only
/// valid for the table they were made on, see [`FilterControls::follow`].
#[derive(Debug, Default)]
pub struct FilterControls {
    pub enabled: bool,
    table: Option<TableId>,
    /// Columns to filter on, in the order they were ticked.
    pub columns: Vec<String>,
    values: HashMap<String, Vec<CellValue>>,
    ranges: HashMap<String, (f64, f64)>,
    dates: HashMap<String, [Option<NaiveDate>; 2]>,
    patterns: HashMap<String, String>,
}

impl FilterControls {
    /// Forget every selection (a new table was loaded).
    pub fn reset(&mut self) {
        *self = FilterControls {
            enabled: self.enabled,
            ..FilterControls::default()
        };
    }

    /// Forget every selection when `table` is not the one they were made on.
    pub fn follow(&mut self, table: &TableId) {
        if self.table.as_ref() == Some(table) {
            return;
        }
        if self.table.is_some() {
            log::debug!("Filtered table changed, resetting filter selections");
        }
        self.reset();
        self.table = Some(table.clone());
    }
}

// ---------------------------------------------------------------------------
// egui-backed FilterInput
// ---------------------------------------------------------------------------

/// Renders each widget the filter builder asks for and answers with its value.
pub struct EguiFilterInput<'a> {
    ui: &'a mut Ui,
    controls: &'a mut FilterControls,
}

impl<'a> EguiFilterInput<'a> {
    pub fn new(ui: &'a mut Ui, controls: &'a mut FilterControls) -> Self {
        EguiFilterInput { ui, controls }
    }
}

/// Indented row under the column picker, like a tree branch.
fn branch<R>(ui: &mut Ui, add_contents: impl FnOnce(&mut Ui) -> R) -> R {
    ui.horizontal(|ui: &mut Ui| {
        ui.label("↳");
        ui.vertical(add_contents).inner
    })
    .inner
}

impl FilterInput for EguiFilterInput<'_> {
    fn wants_filters(&mut self) -> bool {
        self.ui.checkbox(&mut self.controls.enabled, "Add filters");
        self.controls.enabled
    }

    fn columns_to_filter(&mut self, columns: &[String]) -> Vec<String> {
        let chosen = &mut self.controls.columns;
        let header = format!("Filter dataframe on  ({}/{})", chosen.len(), columns.len());

        egui::CollapsingHeader::new(RichText::new(header).strong())
            .id_salt("filter_columns")
            .default_open(true)
            .show(self.ui, |ui: &mut Ui| {
                for col in columns {
                    let mut checked = chosen.contains(col);
                    if ui.checkbox(&mut checked, col).changed() {
                        if checked {
                            chosen.push(col.clone());
                        } else {
                            chosen.retain(|c| c != col);
                        }
                    }
                }
            });

        chosen
            .iter()
            .filter(|c| columns.contains(c))
            .cloned()
            .collect()
    }

    fn select_values(
        &mut self,
        column: &str,
        options: &[CellValue],
        default: &[CellValue],
    ) -> Vec<CellValue> {
        let selected = self
            .controls
            .values
            .entry(column.to_string())
            .or_insert_with(|| default.to_vec());

        branch(self.ui, |ui: &mut Ui| {
            let header = format!("Values for {column}  ({}/{})", selected.len(), options.len());
            egui::CollapsingHeader::new(header)
                .id_salt(("values", column))
                .default_open(false)
                .show(ui, |ui: &mut Ui| {
                    ui.horizontal(|ui: &mut Ui| {
                        if ui.small_button("All").clicked() {
                            *selected = options.to_vec();
                        }
                        if ui.small_button("None").clicked() {
                            selected.clear();
                        }
                    });
                    for val in options {
                        let mut checked = selected.contains(val);
                        if ui.checkbox(&mut checked, val.to_string()).changed() {
                            if checked {
                                selected.push(val.clone());
                            } else {
                                selected.retain(|v| v != val);
                            }
                        }
                    }
                });
        });
        selected.clone()
    }

    fn select_range(&mut self, column: &str, bounds: (f64, f64), step: f64) -> (f64, f64) {
        let (min, max) = bounds;
        let range = self
            .controls
            .ranges
            .entry(column.to_string())
            .or_insert(bounds);
        range.0 = range.0.clamp(min, max);
        range.1 = range.1.clamp(range.0, max);

        branch(self.ui, |ui: &mut Ui| {
            ui.label(format!("Values for {column}"));
            ui.add(
                egui::Slider::new(&mut range.0, min..=max)
                    .step_by(step)
                    .text("from"),
            );
            ui.add(
                egui::Slider::new(&mut range.1, min..=max)
                    .step_by(step)
                    .text("to"),
            );
        });
        if range.0 > range.1 {
            range.1 = range.0;
        }
        *range
    }

    fn select_dates(&mut self, column: &str, bounds: (NaiveDate, NaiveDate)) -> Vec<NaiveDate> {
        let endpoints = self
            .controls
            .dates
            .entry(column.to_string())
            .or_insert([Some(bounds.0), Some(bounds.1)]);

        branch(self.ui, |ui: &mut Ui| {
            ui.label(format!("Values for {column}"));
            for (idx, (label, fallback)) in [("from", bounds.0), ("to", bounds.1)].into_iter().enumerate() {
                ui.horizontal(|ui: &mut Ui| {
                    let mut enabled = endpoints[idx].is_some();
                    if ui.checkbox(&mut enabled, label).changed() {
                        endpoints[idx] = enabled.then_some(fallback);
                    }
                    if let Some(date) = endpoints[idx].as_mut() {
                        ui.add(DatePickerButton::new(date).id_salt(&format!("{column}-{label}")));
                    }
                });
            }
        });
        endpoints.iter().flatten().copied().collect()
    }

    fn text_pattern(&mut self, column: &str) -> String {
        let pattern = self.controls.patterns.entry(column.to_string()).or_default();
        branch(self.ui, |ui: &mut Ui| {
            ui.label(format!("Substring or regex in {column}"));
            ui.text_edit_singleline(pattern);
        });
        pattern.clone()
    }

    fn warn(&mut self, message: String) {
        self.ui.label(RichText::new(message).color(Color32::YELLOW));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{DatetimeColumns, FilterBuilder};
    use crate::data::model::{Column, Table};

    fn cities(names: &[&str]) -> Table {
        Table::new(vec![Column::new(
            "city",
            names.iter().map(|&n| CellValue::from(n)).collect(),
        )])
        .unwrap()
    }

    /// Run one egui frame of the filter widgets over `table`; returns the rows kept.
    fn frame(ctx: &egui::Context, controls: &mut FilterControls, table: &Table) -> usize {
        let mut kept = 0;
        let _ = ctx.run(egui::RawInput::default(), |ctx: &egui::Context| {
            egui::CentralPanel::default().show(ctx, |ui: &mut Ui| {
                let mut input = EguiFilterInput::new(ui, &mut *controls);
                kept = FilterBuilder::default()
                    .apply(table, &DatetimeColumns::of(table), &mut input)
                    .len();
            });
        });
        kept
    }

    fn filtering_city() -> FilterControls {
        FilterControls {
            enabled: true,
            columns: vec!["city".into()],
            ..FilterControls::default()
        }
    }

    #[test]
    fn untouched_widgets_keep_every_row() {
        let ctx = egui::Context::default();
        let table = cities(&["Oslo", "Rome", "Oslo"]);
        let mut controls = filtering_city();
        assert_eq!(frame(&ctx, &mut controls, &table), 3);
        assert_eq!(frame(&ctx, &mut controls, &table), 3);
    }

    #[test]
    fn selections_persist_between_frames() {
        let ctx = egui::Context::default();
        let table = cities(&["Oslo", "Paris", "Lima"]);
        let mut controls = filtering_city();
        frame(&ctx, &mut controls, &table);
        controls
            .values
            .insert("city".into(), vec![CellValue::from("Oslo")]);
        assert_eq!(frame(&ctx, &mut controls, &table), 1);
        assert_eq!(frame(&ctx, &mut controls, &table), 1);
    }

    #[test]
    fn reset_keeps_only_the_toggle() {
        let ctx = egui::Context::default();
        let mut controls = filtering_city();
        frame(&ctx, &mut controls, &cities(&["Oslo", "Rome"]));
        assert!(controls.values.contains_key("city"));

        controls.reset();
        assert!(controls.enabled);
        assert!(controls.columns.is_empty());
        assert!(controls.values.is_empty());
    }
}
