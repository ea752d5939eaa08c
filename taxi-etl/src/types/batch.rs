use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::Cell;

/// One row of a [`Batch`], with cells in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    values: Vec<Cell>,
}

impl TableRow {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }
}

/// An in-memory table: named columns plus rows of equal width.
///
/// Column order is significant; it is the order in which columns are written out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

impl Batch {
    /// Creates an empty batch with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Creates a batch, checking that every row matches the column count.
    pub fn with_rows(columns: Vec<String>, rows: Vec<TableRow>) -> EtlResult<Self> {
        let mut batch = Batch::new(columns);
        for row in rows {
            batch.push_row(row)?;
        }

        Ok(batch)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Returns the index of `name`, failing with [`ErrorKind::MissingColumn`] if absent.
    pub fn require_column(&self, name: &str) -> EtlResult<usize> {
        match self.column_index(name) {
            Some(index) => Ok(index),
            None => bail!(
                ErrorKind::MissingColumn,
                "Column is missing from the batch",
                format!(
                    "expected column `{name}`, batch has [{}]",
                    self.columns.join(", ")
                )
            ),
        }
    }

    /// Iterates over the cells of one column.
    pub fn column_values(&self, name: &str) -> EtlResult<impl Iterator<Item = &Cell>> {
        let index = self.require_column(name)?;

        Ok(self.rows.iter().map(move |row| &row.values[index]))
    }

    /// Appends a row, failing with [`ErrorKind::InvalidData`] on a width mismatch.
    pub fn push_row(&mut self, row: TableRow) -> EtlResult<()> {
        if row.values.len() != self.columns.len() {
            bail!(
                ErrorKind::InvalidData,
                "Row width does not match the batch columns",
                format!(
                    "row {} has {} cells, batch has {} columns",
                    self.rows.len(),
                    row.values.len(),
                    self.columns.len()
                )
            );
        }
        self.rows.push(row);

        Ok(())
    }

    /// Appends a column holding one value per row.
    ///
    /// Fails with [`ErrorKind::IntegrityError`] if the column already exists, and with
    /// [`ErrorKind::InvalidData`] if the number of values differs from the row count.
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<Cell>) -> EtlResult<()> {
        let name = name.into();
        if self.column_index(&name).is_some() {
            bail!(
                ErrorKind::IntegrityError,
                "Column already exists in the batch",
                format!("column `{name}` would be added twice")
            );
        }
        if values.len() != self.rows.len() {
            bail!(
                ErrorKind::InvalidData,
                "Column length does not match the batch",
                format!(
                    "column `{name}` has {} values, batch has {} rows",
                    values.len(),
                    self.rows.len()
                )
            );
        }

        self.columns.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.values.push(value);
        }

        Ok(())
    }

    /// Removes the named columns; names that are not present are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|column| !names.contains(&column.as_str()))
            .collect();
        if keep.iter().all(|keep| *keep) {
            return;
        }

        let mut flags = keep.iter();
        self.columns.retain(|_| *flags.next().unwrap_or(&true));
        for row in &mut self.rows {
            let mut flags = keep.iter();
            row.values.retain(|_| *flags.next().unwrap_or(&true));
        }
    }

    /// Renames a column. Returns `false` if `from` is not present.
    ///
    /// Fails with [`ErrorKind::IntegrityError`] if another column is already named `to`.
    pub fn rename_column(&mut self, from: &str, to: &str) -> EtlResult<bool> {
        let Some(index) = self.column_index(from) else {
            return Ok(false);
        };
        if from != to && self.column_index(to).is_some() {
            bail!(
                ErrorKind::IntegrityError,
                "Column already exists in the batch",
                format!("renaming `{from}` would duplicate column `{to}`")
            );
        }
        self.columns[index] = to.to_owned();

        Ok(true)
    }

    /// Keeps only the rows for which `keep` returns `true`.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&TableRow) -> bool) {
        self.rows.retain(|row| keep(row));
    }

    /// Replaces every cell of a column with the result of `convert`.
    ///
    /// `convert` receives the row index and the current cell.
    pub fn map_column(
        &mut self,
        name: &str,
        mut convert: impl FnMut(usize, &Cell) -> EtlResult<Cell>,
    ) -> EtlResult<()> {
        let index = self.require_column(name)?;
        for (row_index, row) in self.rows.iter_mut().enumerate() {
            row.values[index] = convert(row_index, &row.values[index])?;
        }

        Ok(())
    }
}
