//! Small delimited text tables: the behavioural logs, participant sheets
//! and the CSV outputs that are merged into the statistics dataset.
//!
//! Cells are kept as text.  A cell holding the separator, a quote or a line
//! break is quoted on output; quoted cells are read back.
use std::collections::HashMap;
use std::io::Write;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn split_record(line: &str, sep: char) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            '"' if quoted => quoted = false,
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            c if c == sep && !quoted => fields.push(std::mem::take(&mut field).trim().to_string()),
            c => field.push(c),
        }
    }
    if quoted {
        return Err(Error::input(format!("unterminated quote in `{line}`")));
    }
    fields.push(field.trim().to_string());
    Ok(fields)
}

fn quote(cell: &str, sep: char) -> String {
    if cell.contains(sep) || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

impl Table {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self { columns: columns.iter().map(|c| c.as_ref().to_string()).collect(), rows: Vec::new() }
    }

    /// Header line followed by records; blank lines are skipped.
    ///
    /// # Errors
    ///
    /// [`Error::Input`] for an empty text or a record whose cell count
    /// differs from the header.
    pub fn parse(text: &str, sep: char) -> Result<Self> {
        let mut lines = text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty());
        let header = lines.next().ok_or_else(|| Error::input("table has no header line"))?;
        let mut table = Table { columns: split_record(header.trim_start_matches('\u{feff}'), sep)?, rows: Vec::new() };
        for (i, line) in lines.enumerate() {
            table
                .push_row(split_record(line, sep)?)
                .map_err(|e| Error::input(format!("record {}: {e}", i + 1)))?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::input(format!("no `{name}` column (have {:?})", self.columns)))
    }

    /// All cells of one column.
    pub fn values(&self, name: &str) -> Result<Vec<&str>> {
        let i = self.column(name)?;
        Ok(self.rows.iter().map(|r| r[i].as_str()).collect())
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::input(format!("{} cells for {} columns", row.len(), self.columns.len())));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Rename a column if present.
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(c) = self.columns.iter_mut().find(|c| *c == from) {
            *c = to.to_string();
        }
    }

    /// Append a column computed from every row.
    pub fn add_column(&mut self, name: &str, value: impl Fn(&[String]) -> String) {
        for row in &mut self.rows {
            let v = value(row);
            row.push(v);
        }
        self.columns.push(name.to_string());
    }

    pub fn filter(&self, keep: impl Fn(&[String]) -> bool) -> Table {
        Table { columns: self.columns.clone(), rows: self.rows.iter().filter(|r| keep(r)).cloned().collect() }
    }

    /// The named columns in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table> {
        let idx: Vec<usize> = names.iter().map(|n| self.column(n.as_ref())).collect::<Result<_>>()?;
        Ok(Table {
            columns: names.iter().map(|n| n.as_ref().to_string()).collect(),
            rows: self.rows.iter().map(|r| idx.iter().map(|&i| r[i].clone()).collect()).collect(),
        })
    }

    /// Stack tables with identical columns.
    pub fn concat(tables: &[Table]) -> Result<Table> {
        let Some(first) = tables.first() else {
            return Ok(Table::default());
        };
        let mut out = Table::new(first.columns());
        for t in tables {
            if t.columns != first.columns {
                return Err(Error::input(format!(
                    "cannot stack tables with columns {:?} and {:?}",
                    first.columns, t.columns
                )));
            }
            out.rows.extend(t.rows.iter().cloned());
        }
        Ok(out)
    }

    /// Rows of `self` matched with every row of `right` sharing the `keys`
    /// cells.  Output columns are `self`'s followed by `right`'s non-key
    /// columns; row order follows `self`, then `right`.
    ///
    /// # Errors
    ///
    /// [`Error::Input`] if a key is missing on either side or a non-key
    /// column name appears on both sides.
    pub fn inner_join(&self, right: &Table, keys: &[&str]) -> Result<Table> {
        let left_keys: Vec<usize> = keys.iter().map(|k| self.column(k)).collect::<Result<_>>()?;
        let right_keys: Vec<usize> = keys.iter().map(|k| right.column(k)).collect::<Result<_>>()?;
        let right_rest: Vec<usize> = (0..right.columns.len()).filter(|i| !right_keys.contains(i)).collect();
        if let Some(&dup) = right_rest.iter().find(|&&i| self.columns.contains(&right.columns[i])) {
            return Err(Error::input(format!("column `{}` is present on both sides of the join", right.columns[dup])));
        }

        let mut index: HashMap<Vec<&str>, Vec<usize>> = HashMap::new();
        for (r, row) in right.rows.iter().enumerate() {
            index.entry(right_keys.iter().map(|&k| row[k].as_str()).collect()).or_default().push(r);
        }

        let mut columns = self.columns.clone();
        columns.extend(right_rest.iter().map(|&i| right.columns[i].clone()));
        let mut rows = Vec::new();
        for row in &self.rows {
            let key: Vec<&str> = left_keys.iter().map(|&k| row[k].as_str()).collect();
            for &r in index.get(&key).map(Vec::as_slice).unwrap_or(&[]) {
                let mut joined = row.clone();
                joined.extend(right_rest.iter().map(|&i| right.rows[r][i].clone()));
                rows.push(joined);
            }
        }
        Ok(Table { columns, rows })
    }

    pub fn write_csv<W: Write>(&self, mut w: W) -> anyhow::Result<()> {
        let line = |cells: &[String]| cells.iter().map(|c| quote(c, ',')).collect::<Vec<_>>().join(",");
        writeln!(w, "{}", line(&self.columns))?;
        for row in &self.rows {
            writeln!(w, "{}", line(row))?;
        }
        w.flush()?;
        Ok(())
    }
}
