//! Code-keyed tables of numeric columns.

/// One row of a [`ValueTable`]: a unit code and one value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRow {
    /// Unit code in the table's key generation.
    pub code: String,
    /// Values in column order.
    pub values: Vec<f64>,
}

/// A table keyed by unit code with one or more named numeric columns.
///
/// The key column name identifies which generation the codes belong to
/// (e.g. `"PARL10"`). Row shape is only checked when the table is handed to
/// [`convert`](crate::convert), so importers can build tables freely.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    key_column: String,
    columns: Vec<String>,
    rows: Vec<ValueRow>,
}

impl ValueTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(key_column: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            key_column: key_column.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a one-column table from `(code, value)` pairs.
    #[must_use]
    pub fn single_column<I, S>(key_column: impl Into<String>, column: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut table = Self::new(key_column, vec![column.into()]);
        for (code, value) in rows {
            table.push_row(code, vec![value]);
        }
        table
    }

    /// Appends a row.
    pub fn push_row(&mut self, code: impl Into<String>, values: Vec<f64>) {
        self.rows.push(ValueRow {
            code: code.into(),
            values,
        });
    }

    /// Name of the key column.
    #[must_use]
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Value column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[ValueRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of one column over all rows.
    #[must_use]
    pub fn column_total(&self, index: usize) -> f64 {
        self.rows
            .iter()
            .filter_map(|row| row.values.get(index))
            .sum()
    }

    /// `(code, value)` pairs for one column.
    #[must_use]
    pub fn column_values(&self, index: usize) -> Vec<(String, f64)> {
        self.rows
            .iter()
            .filter_map(|row| row.values.get(index).map(|v| (row.code.clone(), *v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_column_table() {
        let table = ValueTable::single_column("PARL10", "population", [("A1", 10.0), ("A2", 5.5)]);

        assert_eq!(table.key_column(), "PARL10");
        assert_eq!(table.columns(), ["population".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1].values, vec![5.5]);
        assert!((table.column_total(0) - 15.5).abs() < f64::EPSILON);
        assert_eq!(
            table.column_values(0),
            vec![("A1".to_string(), 10.0), ("A2".to_string(), 5.5)]
        );
    }
}
