//! Row-oriented tables built from a response block.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

use crate::{error::DataError, model::VariableBlock};

pub const DATE_COLUMN: &str = "date";

/// Timestamps from `start` up to but excluding `end`, `interval` apart.
///
/// A non-positive interval yields nothing.
pub fn date_range(start: DateTime<Utc>, end: DateTime<Utc>, interval: TimeDelta) -> Vec<DateTime<Utc>> {
    if interval <= TimeDelta::zero() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut current = start;
    while current < end {
        out.push(current);
        match current.checked_add_signed(interval) {
            Some(next) => current = next,
            None => break,
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub date: DateTime<Utc>,
    /// One cell per column, same order as `Table::columns`.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// "hourly" or "daily"; used in file names and log lines.
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Zip the block's generated timestamps with the same-index value of
    /// every variable. Every variable must have exactly one value per
    /// timestamp.
    pub fn from_block(name: &str, block: &VariableBlock) -> Result<Self, DataError> {
        let dates = date_range(block.start, block.end, block.interval);

        if let Some(bad) = block.variables.iter().find(|v| v.values.len() != dates.len()) {
            return Err(DataError::LengthMismatch {
                block: name.to_string(),
                variable: bad.name.clone(),
                expected: dates.len(),
                actual: bad.values.len(),
            });
        }

        let rows = dates
            .into_iter()
            .enumerate()
            .map(|(i, date)| Row {
                date,
                values: block.variables.iter().map(|v| v.values[i]).collect(),
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            columns: block.variable_names().map(str::to_string).collect(),
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `date` followed by the variable columns.
    pub fn header(&self) -> Vec<&str> {
        std::iter::once(DATE_COLUMN)
            .chain(self.columns.iter().map(String::as_str))
            .collect()
    }

    /// Aligned text rendering of the first and last `edge` rows.
    pub fn preview(&self, edge: usize) -> String {
        let header: Vec<String> = std::iter::once(String::new())
            .chain(self.header().into_iter().map(str::to_string))
            .collect();

        let shown: Vec<usize> = if self.len() <= edge * 2 {
            (0..self.len()).collect()
        } else {
            (0..edge).chain(self.len() - edge..self.len()).collect()
        };

        let mut lines: Vec<Vec<String>> = vec![header];
        for (pos, &i) in shown.iter().enumerate() {
            if pos == edge && self.len() > edge * 2 {
                lines.push(vec!["...".to_string(); self.columns.len() + 2]);
            }
            let row = &self.rows[i];
            let mut cells = vec![i.to_string(), format_date(row.date)];
            cells.extend(row.values.iter().map(|v| match v {
                Some(v) => v.to_string(),
                None => "NaN".to_string(),
            }));
            lines.push(cells);
        }

        let widths: Vec<usize> = (0..self.columns.len() + 2)
            .map(|col| lines.iter().map(|l| l[col].len()).max().unwrap_or(0))
            .collect();

        let mut out = String::new();
        for line in &lines {
            let rendered: Vec<String> = line
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{cell:>width$}"))
                .collect();
            out.push_str(rendered.join("  ").trim_end());
            out.push('\n');
        }
        out.push_str(&format!("\n[{} rows x {} columns]", self.len(), self.columns.len() + 1));
        out
    }
}

pub fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// CSV cell for a value; missing samples become empty cells.
pub fn format_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
