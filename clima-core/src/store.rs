use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

use crate::table::{Table, format_cell, format_date};

/// Mode given to finished CSV files; the temp file starts out owner-only.
#[cfg(unix)]
const CSV_MODE: u32 = 0o644;

/// Folder under the base directory that holds one subfolder per day.
pub const DATA_DIR: &str = "datos_clima";

/// `<base>/datos_clima/<YYYY-MM-DD>/<kind>_data_<YYYY-MM-DD>.csv`
#[derive(Debug, Clone)]
pub struct OutputLayout {
    base: PathBuf,
}

impl OutputLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.base.join(DATA_DIR).join(date.format("%Y-%m-%d").to_string())
    }

    pub fn table_path(&self, date: NaiveDate, kind: &str) -> PathBuf {
        let day = date.format("%Y-%m-%d");
        self.day_dir(date).join(format!("{kind}_data_{day}.csv"))
    }

    /// Create the folder for `date`; succeeds if it already exists.
    pub fn ensure_day_dir(&self, date: NaiveDate) -> Result<PathBuf> {
        let dir = self.day_dir(date);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        Ok(dir)
    }
}

/// Write `table` as CSV to `path`, replacing any existing file.
///
/// Rows go to a temporary file next to `path` first, which is then renamed
/// over it, so a failed write leaves the previous file intact.
pub fn write_csv(table: &Table, path: &Path) -> Result<usize> {
    tracing::info!(path = %path.display(), rows = table.len(), "writing CSV");

    let dir = path
        .parent()
        .with_context(|| format!("Output path has no parent directory: {}", path.display()))?;

    let tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    let mut wtr = csv::Writer::from_writer(tmp);
    wtr.write_record(table.header())
        .context("Failed to write CSV header")?;

    for row in &table.rows {
        let record = std::iter::once(format_date(row.date))
            .chain(row.values.iter().map(|v| format_cell(*v)));
        wtr.write_record(record)
            .with_context(|| format!("Failed to write CSV row for {}", format_date(row.date)))?;
    }

    let tmp = wtr
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV for {}: {}", path.display(), e.error()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(CSV_MODE))
            .with_context(|| format!("Failed to set permissions on CSV for {}", path.display()))?;
    }

    tmp.persist(path)
        .with_context(|| format!("Failed to move CSV into place: {}", path.display()))?;

    Ok(table.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    use crate::table::Row;

    fn sample_table() -> Table {
        let ts = |s| DateTime::<Utc>::from_timestamp(s, 0).expect("valid timestamp");
        Table {
            name: "hourly".into(),
            columns: vec!["temperature_2m".into(), "uv_index".into()],
            rows: vec![
                Row {
                    date: ts(1714521600),
                    values: vec![Some(18.5), None],
                },
                Row {
                    date: ts(1714525200),
                    values: vec![Some(17.0), Some(0.0)],
                },
            ],
        }
    }

    #[test]
    fn layout_paths_follow_date() {
        let layout = OutputLayout::new("/srv/clima");
        let date = NaiveDate::from_ymd_opt(2024, 5, 9).expect("valid date");

        assert_eq!(layout.day_dir(date), PathBuf::from("/srv/clima/datos_clima/2024-05-09"));
        assert_eq!(
            layout.table_path(date, "daily"),
            PathBuf::from("/srv/clima/datos_clima/2024-05-09/daily_data_2024-05-09.csv")
        );
    }

    #[test]
    fn ensure_day_dir_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = OutputLayout::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 5, 9).expect("valid date");

        let first = layout.ensure_day_dir(date).expect("first create");
        let second = layout.ensure_day_dir(date).expect("second create");
        assert_eq!(first, second);
        assert!(first.is_dir());
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hourly.csv");

        let written = write_csv(&sample_table(), &path).expect("write");
        assert_eq!(written, 2);

        let contents = fs::read_to_string(&path).expect("read back");
        assert_eq!(
            contents,
            "date,temperature_2m,uv_index\n\
             2024-05-01T00:00:00Z,18.5,\n\
             2024-05-01T01:00:00Z,17,0\n"
        );
    }

    #[test]
    fn rewriting_overwrites_instead_of_appending() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hourly.csv");

        write_csv(&sample_table(), &path).expect("first write");
        write_csv(&sample_table(), &path).expect("second write");

        let contents = fs::read_to_string(&path).expect("read back");
        assert_eq!(contents.lines().count(), 3);

        let leftovers = fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(leftovers, 1);
    }

    #[cfg(unix)]
    #[test]
    fn written_csv_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("daily.csv");

        write_csv(&sample_table(), &path).expect("write");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
