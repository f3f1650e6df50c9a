use eframe::egui::{self, Align, Layout, RichText, Ui};
use egui_extras::{Column as GridColumn, TableBuilder};

use crate::data::model::Table;

// ---------------------------------------------------------------------------
// Data grid (central panel)
// ---------------------------------------------------------------------------

/// Render a table as a scrollable grid with a size caption.
pub fn data_grid(ui: &mut Ui, table: &Table) {
    ui.label(format!("{} rows × {} columns", table.len(), table.width()));
    ui.separator();

    if table.width() == 0 {
        ui.label("The table has no columns.");
        return;
    }

    let row_height = ui.text_style_height(&egui::TextStyle::Body) + 6.0;
    let columns = table.columns();

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .cell_layout(Layout::left_to_right(Align::Center))
        .columns(GridColumn::auto().at_least(60.0).clip(true), columns.len())
        .header(22.0, |mut header| {
            for col in columns {
                header.col(|ui: &mut Ui| {
                    ui.label(RichText::new(&col.name).strong())
                        .on_hover_text(col.kind().to_string());
                });
            }
        })
        .body(|body| {
            body.rows(row_height, table.len(), |mut row| {
                for value in table.row(row.index()) {
                    row.col(|ui: &mut Ui| {
                        ui.label(value.to_string());
                    });
                }
            });
        });
}
