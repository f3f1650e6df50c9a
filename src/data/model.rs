use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common Pandas dtypes.
/// Filters put values in hash sets and sort them, so `CellValue` is `Eq + Ord + Hash`.
#[derive(Debug, Clone)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Always offset-naive.
    DateTime(NaiveDateTime),
}

// -- Manual Eq/Ord so floats can live in sets --

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                DateTime(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (DateTime(a), DateTime(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::DateTime(d) => d.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::DateTime(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Integer(v)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        CellValue::Integer(v.into())
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::String(v.to_string())
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(v: NaiveDateTime) -> Self {
        CellValue::DateTime(v)
    }
}

impl CellValue {
    /// Numeric view used by range filters and join keys.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::DateTime(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// ---------------------------------------------------------------------------
// ColumnKind – the semantic type driving filter widgets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Categorical,
    Numeric,
    DateTime,
    /// Strings, mixed values, or a column with no values at all.
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Categorical => "categorical",
            ColumnKind::Numeric => "numeric",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Text => "text",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
    /// Explicitly declared categorical, regardless of the values it holds.
    pub categorical: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Column {
            name: name.into(),
            values,
            categorical: false,
        }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Column {
            categorical: true,
            ..Column::new(name, values)
        }
    }

    /// Infer the semantic type from the non-null values.
    pub fn kind(&self) -> ColumnKind {
        if self.categorical {
            return ColumnKind::Categorical;
        }
        let mut present = self.values.iter().filter(|v| !v.is_null()).peekable();
        if present.peek().is_none() {
            return ColumnKind::Text;
        }

        let (mut bools, mut numbers, mut dates, mut other) = (0usize, 0usize, 0usize, 0usize);
        for v in present {
            match v {
                CellValue::Bool(_) => bools += 1,
                CellValue::Integer(_) | CellValue::Float(_) => numbers += 1,
                CellValue::DateTime(_) => dates += 1,
                _ => other += 1,
            }
        }
        match (bools, numbers, dates, other) {
            (_, 0, 0, 0) => ColumnKind::Categorical,
            (0, _, 0, 0) => ColumnKind::Numeric,
            (0, 0, _, 0) => ColumnKind::DateTime,
            _ => ColumnKind::Text,
        }
    }

    /// Distinct values in order of first appearance (nulls included).
    pub fn distinct(&self) -> Vec<CellValue> {
        let mut seen = HashSet::new();
        self.values
            .iter()
            .filter(|v| seen.insert(*v))
            .cloned()
            .collect()
    }

    /// Number of distinct non-null values.
    pub fn distinct_count(&self) -> usize {
        self.values
            .iter()
            .filter(|v| !v.is_null())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn numeric_bounds(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .filter_map(CellValue::as_f64)
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn datetime_bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut dates = self.values.iter().filter_map(CellValue::as_datetime);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }

    /// The values at `rows`, in that order.
    pub fn take(&self, rows: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            values: rows.iter().map(|&r| self.values[r].clone()).collect(),
            categorical: self.categorical,
        }
    }
}

// ---------------------------------------------------------------------------
// Table – the complete tabular structure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("column '{column}' has {found} rows, expected {expected}")]
    RaggedColumns {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// Ordered, named columns that all share one row count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, ModelError> {
        if let Some(first) = columns.first() {
            let expected = first.values.len();
            if let Some(bad) = columns.iter().find(|c| c.values.len() != expected) {
                return Err(ModelError::RaggedColumns {
                    column: bad.name.clone(),
                    expected,
                    found: bad.values.len(),
                });
            }
        }
        Ok(Table { columns })
    }

    /// Build a table from row-oriented data (every row must have one value per name).
    pub fn from_rows<S: AsRef<str>>(
        names: &[S],
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self, ModelError> {
        let mut columns: Vec<Column> = names
            .iter()
            .map(|n| Column::new(n.as_ref(), Vec::with_capacity(rows.len())))
            .collect();
        for (row_no, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ModelError::RaggedColumns {
                    column: format!("row {row_no}"),
                    expected: columns.len(),
                    found: row.len(),
                });
            }
            for (col, value) in columns.iter_mut().zip(row) {
                col.values.push(value);
            }
        }
        Table::new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, index: usize) -> Vec<&CellValue> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }

    /// Select rows by index; indices may repeat (joins duplicate rows).
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_columns_are_rejected() {
        let err = Table::new(vec![
            Column::new("a", vec![1.into(), 2.into()]),
            Column::new("b", vec![1.into()]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ModelError::RaggedColumns {
                column: "b".into(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn kind_is_inferred_from_non_null_values() {
        let numeric = Column::new("n", vec![1.into(), CellValue::Null, 2.5.into()]);
        assert_eq!(numeric.kind(), ColumnKind::Numeric);

        let flags = Column::new("b", vec![true.into(), false.into()]);
        assert_eq!(flags.kind(), ColumnKind::Categorical);

        let mixed = Column::new("m", vec![1.into(), "a".into()]);
        assert_eq!(mixed.kind(), ColumnKind::Text);

        let empty = Column::new("e", vec![CellValue::Null]);
        assert_eq!(empty.kind(), ColumnKind::Text);

        let declared = Column::categorical("c", vec![1.into(), 2.into()]);
        assert_eq!(declared.kind(), ColumnKind::Categorical);
    }

    #[test]
    fn distinct_keeps_first_appearance_order() {
        let col = Column::new(
            "c",
            vec!["b".into(), "a".into(), "b".into(), CellValue::Null],
        );
        assert_eq!(
            col.distinct(),
            vec![CellValue::from("b"), CellValue::from("a"), CellValue::Null]
        );
        assert_eq!(col.distinct_count(), 2);
    }

    #[test]
    fn take_rows_may_duplicate() {
        let table = Table::from_rows(&["id"], vec![vec![1.into()], vec![2.into()]]).unwrap();
        let taken = table.take_rows(&[1, 1, 0]);
        assert_eq!(taken.len(), 3);
        assert_eq!(taken.row(0), vec![&CellValue::Integer(2)]);
    }

    #[test]
    fn float_equality_is_total() {
        assert_eq!(CellValue::Float(f64::NAN), CellValue::Float(f64::NAN));
        assert_ne!(CellValue::Integer(1), CellValue::Float(1.0));
    }
}
