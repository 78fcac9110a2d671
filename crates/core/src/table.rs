//! Demographics table.
//!
//! One row per subject; columns are the union of every cell name seen so far, in
//! first-seen order. Columns are never removed, so a subject lacking a series simply
//! leaves those cells blank.

use crate::constants::{ORDER_COLUMN, SUBJECT_ID_COLUMN};
use crate::SurveyResult;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

/// All cells collected for one subject, in insertion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectRow {
    pub id: String,
    pub order: u64,
    cells: Vec<(String, String)>,
}

impl SubjectRow {
    pub fn new(id: impl Into<String>, order: u64) -> Self {
        Self {
            id: id.into(),
            order,
            cells: Vec::new(),
        }
    }

    /// Adds cells; a repeated column name keeps the latest value.
    pub fn extend<I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.cells.extend(cells);
    }

    pub fn cells(&self) -> &[(String, String)] {
        &self.cells
    }
}

#[derive(Clone, Debug)]
pub struct DemographicsTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<BTreeMap<usize, String>>,
}

impl Default for DemographicsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DemographicsTable {
    pub fn new() -> Self {
        let mut table = Self {
            columns: Vec::new(),
            index: HashMap::new(),
            rows: Vec::new(),
        };
        table.column(SUBJECT_ID_COLUMN);
        table.column(ORDER_COLUMN);
        table
    }

    fn column(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.columns.len();
        self.columns.push(name.to_string());
        self.index.insert(name.to_string(), i);
        i
    }

    /// Appends a subject row, adding any column not seen before.
    pub fn push(&mut self, row: SubjectRow) {
        let mut values = BTreeMap::new();
        values.insert(0, row.id);
        values.insert(1, row.order.to_string());
        for (name, value) in row.cells {
            let i = self.column(&name);
            values.insert(i, value);
        }
        self.rows.push(values);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `row`, or `None` for a blank cell.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let i = *self.index.get(column)?;
        self.rows.get(row)?.get(&i).map(String::as_str)
    }

    /// Writes the table as CSV: a header row, then one line per subject with blank
    /// cells for missing values.
    pub fn write_csv<W: Write>(&self, writer: W) -> SurveyResult<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(&self.columns)?;

        for row in &self.rows {
            let record = (0..self.columns.len()).map(|i| row.get(&i).map(String::as_str).unwrap_or(""));
            csv.write_record(record)?;
        }

        csv.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Writes the table to `path`, replacing any previous file.
    pub fn save(&self, path: &Path) -> SurveyResult<()> {
        let file = std::fs::File::create(path).map_err(csv::Error::from)?;
        self.write_csv(file)
    }
}
