use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use super::model::{CellValue, Column, ColumnKind, Table};

/// Columns with fewer distinct values than this get a multi-select.
pub const CATEGORICAL_THRESHOLD: usize = 10;

// ---------------------------------------------------------------------------
// FilterInput – the UI capability the builder asks for selections
// ---------------------------------------------------------------------------

/// Supplies the user's choices while the builder walks the table.
///
/// Each method corresponds to one widget. The egui implementation renders the
/// widget and returns its current value; tests script the answers.
pub trait FilterInput {
    /// The "Add filters" toggle.
    fn wants_filters(&mut self) -> bool;

    /// Columns to filter on, in the order the user picked them.
    fn columns_to_filter(&mut self, columns: &[String]) -> Vec<String>;

    fn select_values(
        &mut self,
        column: &str,
        options: &[CellValue],
        default: &[CellValue],
    ) -> Vec<CellValue>;

    fn select_range(&mut self, column: &str, bounds: (f64, f64), step: f64) -> (f64, f64);

    /// Zero, one or two endpoints; a range only applies with both.
    fn select_dates(&mut self, column: &str, bounds: (NaiveDate, NaiveDate)) -> Vec<NaiveDate>;

    fn text_pattern(&mut self, column: &str) -> String;

    /// Input that could not be honoured; filtering carries on without it.
    fn warn(&mut self, message: String);
}

// ---------------------------------------------------------------------------
// Per-column widgets and predicates
// ---------------------------------------------------------------------------

/// Which widget a column gets, checked in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterWidget {
    MultiSelect,
    Range,
    DateRange,
    Pattern,
}

#[derive(Debug, Clone)]
enum Predicate {
    OneOf(HashSet<CellValue>),
    Between(f64, f64),
    /// Whole days, both ends inclusive.
    DatesBetween(NaiveDate, NaiveDate),
    Contains { literal: String, regex: Regex },
}

impl Predicate {
    fn matches(&self, value: &CellValue) -> bool {
        match self {
            Predicate::OneOf(selected) => selected.contains(value),
            Predicate::Between(lo, hi) => value.as_f64().is_some_and(|v| *lo <= v && v <= *hi),
            Predicate::DatesBetween(start, end) => {
                value
                    .as_datetime()
                    .is_some_and(|d| *start <= d.date() && d.date() <= *end)
            }
            Predicate::Contains { literal, regex } => {
                if value.is_null() {
                    return false;
                }
                let text = value.to_string();
                text.contains(literal.as_str()) || regex.is_match(&text)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct FilterBuilder {
    pub categorical_threshold: usize,
}

impl Default for FilterBuilder {
    fn default() -> Self {
        FilterBuilder {
            categorical_threshold: CATEGORICAL_THRESHOLD,
        }
    }
}

impl FilterBuilder {
    /// Narrow `table` by the predicates the user declares through `input`.
    ///
    /// Predicates are applied one column at a time in selection order, each
    /// on the rows the previous ones kept. Selected columns found in
    /// `datetimes` are filtered and returned as datetimes. When nothing is
    /// selected or nothing is dropped the input is handed back as is.
    pub fn apply<'a>(
        &self,
        table: &'a Table,
        datetimes: &DatetimeColumns,
        input: &mut dyn FilterInput,
    ) -> Cow<'a, Table> {
        if !input.wants_filters() {
            return Cow::Borrowed(table);
        }

        let chosen = input.columns_to_filter(&table.column_names());
        let mut rows: Vec<usize> = (0..table.len()).collect();
        let mut reinterpreted: Vec<&str> = Vec::new();

        for name in &chosen {
            let column = match (datetimes.get(name), table.column(name)) {
                (Some(parsed), _) => {
                    reinterpreted.push(name.as_str());
                    parsed
                }
                (None, Some(column)) => column,
                (None, None) => {
                    log::debug!("Ignoring filter on unknown column '{name}'");
                    continue;
                }
            };
            let narrowed = if rows.len() == table.len() {
                Cow::Borrowed(column)
            } else {
                Cow::Owned(column.take(&rows))
            };
            let Some(predicate) = self.declare(&narrowed, input) else {
                continue;
            };
            rows = rows
                .iter()
                .zip(&narrowed.values)
                .filter(|(_, v)| predicate.matches(v))
                .map(|(&row, _)| row)
                .collect();
        }

        if reinterpreted.is_empty() && rows.len() == table.len() {
            return Cow::Borrowed(table);
        }
        let columns = table
            .columns()
            .iter()
            .map(|c| match datetimes.get(&c.name) {
                Some(parsed) if reinterpreted.contains(&c.name.as_str()) => parsed.take(&rows),
                _ => c.take(&rows),
            })
            .collect();
        // Parsed columns have the input's row count.
        Cow::Owned(Table::new(columns).unwrap_or_else(|_| table.take_rows(&rows)))
    }

    pub fn widget_for(&self, column: &Column) -> FilterWidget {
        let kind = column.kind();
        if kind == ColumnKind::Categorical || column.distinct_count() < self.categorical_threshold {
            FilterWidget::MultiSelect
        } else if kind == ColumnKind::Numeric {
            FilterWidget::Range
        } else if kind == ColumnKind::DateTime {
            FilterWidget::DateRange
        } else {
            FilterWidget::Pattern
        }
    }

    /// Ask for the column's selection; `None` means the column keeps every row.
    fn declare(&self, column: &Column, input: &mut dyn FilterInput) -> Option<Predicate> {
        let name = column.name.as_str();
        match self.widget_for(column) {
            FilterWidget::MultiSelect => {
                let options = column.distinct();
                let selected = input.select_values(name, &options, &options);
                let selected: HashSet<CellValue> = selected.into_iter().collect();
                // Everything selected, no filtering needed.
                if options.iter().all(|v| selected.contains(v)) {
                    return None;
                }
                Some(Predicate::OneOf(selected))
            }
            FilterWidget::Range => {
                let (min, max) = column.numeric_bounds()?;
                let step = (max - min) / 100.0;
                let (lo, hi) = input.select_range(name, (min, max), step);
                if lo <= min && hi >= max {
                    return None;
                }
                Some(Predicate::Between(lo, hi))
            }
            FilterWidget::DateRange => {
                let (min, max) = column.datetime_bounds()?;
                let dates = input.select_dates(name, (min.date(), max.date()));
                match dates.as_slice() {
                    [start, end] => Some(Predicate::DatesBetween(*start, *end)),
                    _ => None,
                }
            }
            FilterWidget::Pattern => {
                let pattern = input.text_pattern(name);
                if pattern.is_empty() {
                    return None;
                }
                match Regex::new(&pattern) {
                    Ok(regex) => Some(Predicate::Contains {
                        literal: pattern,
                        regex,
                    }),
                    Err(e) => {
                        log::warn!("Invalid pattern for column '{name}': {e}");
                        input.warn(format!("Ignoring pattern for {name}: {e}"));
                        None
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Datetime normalisation
// ---------------------------------------------------------------------------

/// Text columns that hold only datetimes, parsed once per table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatetimeColumns {
    columns: HashMap<String, Column>,
}

impl DatetimeColumns {
    /// Columns that do not parse are left out; this never fails.
    pub fn of(table: &Table) -> Self {
        let columns = table
            .columns()
            .iter()
            .filter_map(|c| Some((c.name.clone(), reinterpret_datetime(c)?)))
            .collect();
        DatetimeColumns { columns }
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }
}

/// `Some` only when every non-null value is a string that parses as a datetime.
fn reinterpret_datetime(column: &Column) -> Option<Column> {
    if column.categorical || column.kind() != ColumnKind::Text {
        return None;
    }
    let values = column
        .values
        .iter()
        .map(|v| match v {
            CellValue::Null => Some(CellValue::Null),
            CellValue::String(s) => parse_datetime(s).map(CellValue::DateTime),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(Column::new(column.name.clone(), values))
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse a datetime, dropping any UTC offset but keeping the wall-clock time.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(s, f).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        })
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|f| {
                NaiveDate::parse_from_str(s, f)
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
        })
}
