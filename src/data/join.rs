use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use thiserror::Error;

use super::model::{CellValue, Column, ColumnKind, ModelError, Table};

/// Key columns for an inner equality join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    /// Column of the first (left) table.
    pub primary: String,
    /// Column of the second (right) table.
    pub foreign: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("column '{0}' not found")]
    MissingColumn(String),
    #[error("cannot merge on {left} column '{primary}' and {right} column '{foreign}'")]
    IncompatibleKeys {
        primary: String,
        foreign: String,
        left: ColumnKind,
        right: ColumnKind,
    },
    #[error("column '{0}' would appear twice in the joined table")]
    DuplicateColumn(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Hashable key where numerically equal integers and floats coincide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum JoinKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl From<&CellValue> for JoinKey {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Null => JoinKey::Null,
            CellValue::Bool(b) => JoinKey::Bool(*b),
            CellValue::Integer(i) => JoinKey::Int(*i),
            CellValue::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    JoinKey::Int(*f as i64)
                } else {
                    JoinKey::Float(f.to_bits())
                }
            }
            CellValue::String(s) => JoinKey::Text(s.clone()),
            CellValue::DateTime(d) => JoinKey::DateTime(*d),
        }
    }
}

fn has_values(column: &Column) -> bool {
    column.values.iter().any(|v| !v.is_null())
}

/// Inner equality join of `left` and `right`.
///
/// Produces one row per matching key pair, in left-row order and then
/// right-row order. A key shared by name appears once; any other column name
/// present on both sides gets an `_x` (left) or `_y` (right) suffix.
pub fn inner_join(left: &Table, right: &Table, spec: &JoinSpec) -> Result<Table, JoinError> {
    let left_key = left
        .column(&spec.primary)
        .ok_or_else(|| JoinError::MissingColumn(spec.primary.clone()))?;
    let right_key = right
        .column(&spec.foreign)
        .ok_or_else(|| JoinError::MissingColumn(spec.foreign.clone()))?;

    let (lk, rk) = (left_key.kind(), right_key.kind());
    if lk != rk && has_values(left_key) && has_values(right_key) {
        return Err(JoinError::IncompatibleKeys {
            primary: spec.primary.clone(),
            foreign: spec.foreign.clone(),
            left: lk,
            right: rk,
        });
    }

    let names = output_names(left, right, spec)?;

    let mut index: HashMap<JoinKey, Vec<usize>> = HashMap::new();
    for (row, value) in right_key.values.iter().enumerate() {
        index.entry(JoinKey::from(value)).or_default().push(row);
    }

    let mut left_rows = Vec::new();
    let mut right_rows = Vec::new();
    for (row, value) in left_key.values.iter().enumerate() {
        if let Some(matches) = index.get(&JoinKey::from(value)) {
            for &r in matches {
                left_rows.push(row);
                right_rows.push(r);
            }
        }
    }

    let merged_key = spec.primary == spec.foreign;
    let columns = left
        .take_rows(&left_rows)
        .into_columns()
        .into_iter()
        .chain(
            right
                .take_rows(&right_rows)
                .into_columns()
                .into_iter()
                .filter(|c| !(merged_key && c.name == spec.foreign)),
        )
        .zip(names)
        .map(|(column, name)| Column { name, ..column })
        .collect();

    let joined = Table::new(columns)?;
    log::info!(
        "Joined {} x {} rows on {} = {}: {} rows",
        left.len(),
        right.len(),
        spec.primary,
        spec.foreign,
        joined.len()
    );
    Ok(joined)
}

/// Final column names: left columns, then right columns minus a merged key.
fn output_names(left: &Table, right: &Table, spec: &JoinSpec) -> Result<Vec<String>, JoinError> {
    let merged_key = spec.primary == spec.foreign;
    let left_names = left.column_names();
    let right_names: Vec<String> = right
        .column_names()
        .into_iter()
        .filter(|n| !(merged_key && *n == spec.foreign))
        .collect();

    let left_set: HashSet<&String> = left_names.iter().collect();
    let right_set: HashSet<&String> = right_names.iter().collect();

    let mut names = Vec::with_capacity(left_names.len() + right_names.len());
    for name in &left_names {
        if right_set.contains(name) {
            names.push(format!("{name}_x"));
        } else {
            names.push(name.clone());
        }
    }
    for name in &right_names {
        if left_set.contains(name) {
            names.push(format!("{name}_y"));
        } else {
            names.push(name.clone());
        }
    }

    let mut seen = HashSet::new();
    if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
        return Err(JoinError::DuplicateColumn(dup.clone()));
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(primary: &str, foreign: &str) -> JoinSpec {
        JoinSpec {
            primary: primary.into(),
            foreign: foreign.into(),
        }
    }

    fn table(names: &[&str], rows: Vec<Vec<CellValue>>) -> Table {
        Table::from_rows(names, rows).unwrap()
    }

    #[test]
    fn unmatched_rows_are_dropped_and_shared_key_appears_once() {
        let left = table(
            &["id", "name"],
            vec![vec![1.into(), "a".into()], vec![2.into(), "b".into()]],
        );
        let right = table(
            &["id", "val"],
            vec![vec![1.into(), 10.into()], vec![3.into(), 30.into()]],
        );
        let joined = inner_join(&left, &right, &spec("id", "id")).unwrap();
        let expected = table(
            &["id", "name", "val"],
            vec![vec![1.into(), "a".into(), 10.into()]],
        );
        assert_eq!(joined, expected);
    }

    #[test]
    fn row_count_equals_matching_pairs() {
        let left = table(
            &["k"],
            vec![vec![1.into()], vec![1.into()], vec![2.into()], vec![4.into()]],
        );
        let right = table(
            &["fk", "v"],
            vec![
                vec![1.into(), "x".into()],
                vec![1.into(), "y".into()],
                vec![1.into(), "z".into()],
                vec![2.into(), "w".into()],
            ],
        );
        let joined = inner_join(&left, &right, &spec("k", "fk")).unwrap();
        // 2 left ones x 3 right ones + 1 pair of twos
        assert_eq!(joined.len(), 7);
        assert_eq!(joined.column_names(), vec!["k", "fk", "v"]);
        assert_eq!(
            joined.row(0),
            vec![
                &CellValue::Integer(1),
                &CellValue::Integer(1),
                &CellValue::from("x")
            ]
        );
    }

    #[test]
    fn integers_match_integral_floats() {
        let left = table(&["id"], vec![vec![2.into()]]);
        let right = table(&["ref"], vec![vec![2.0.into()], vec![2.5.into()]]);
        let joined = inner_join(&left, &right, &spec("id", "ref")).unwrap();
        assert_eq!(joined.len(), 1);
    }

    #[test]
    fn overlapping_names_get_suffixes() {
        let left = table(&["id", "name"], vec![vec![1.into(), "a".into()]]);
        let right = table(&["owner", "name"], vec![vec![1.into(), "b".into()]]);
        let joined = inner_join(&left, &right, &spec("id", "owner")).unwrap();
        assert_eq!(joined.column_names(), vec!["id", "name_x", "owner", "name_y"]);
    }

    #[test]
    fn suffix_collision_is_a_join_failure() {
        let left = table(
            &["id", "name", "name_x"],
            vec![vec![1.into(), "a".into(), "c".into()]],
        );
        let right = table(&["id", "name"], vec![vec![1.into(), "b".into()]]);
        let err = inner_join(&left, &right, &spec("id", "id")).unwrap_err();
        assert_eq!(err, JoinError::DuplicateColumn("name_x".into()));
    }

    #[test]
    fn incompatible_key_kinds_are_rejected() {
        let left = table(&["id"], vec![vec![1.into()]]);
        let right = table(&["id"], vec![vec!["1".into()]]);
        let err = inner_join(&left, &right, &spec("id", "id")).unwrap_err();
        assert!(matches!(err, JoinError::IncompatibleKeys { .. }), "{err}");
    }

    #[test]
    fn missing_key_column_is_reported() {
        let left = table(&["id"], vec![vec![1.into()]]);
        let right = table(&["id"], vec![vec![1.into()]]);
        assert_eq!(
            inner_join(&left, &right, &spec("nope", "id")).unwrap_err(),
            JoinError::MissingColumn("nope".into())
        );
    }
}
