//! Purpose: Own a uniquely-headed, ordered set of columns and coordinate table-wide edits.
//! Exports: `Frame`, `Rows`.
//! Role: Header-keyed lookup, column reordering, whole-frame sort, row-major and CSV round trips.
//! Invariants: Headers are unique; the header index is rebuilt inside the same critical section as
//! every structural edit.
//! Invariants: A frame-wide sort is not atomic across columns; readers holding a column handle may
//! observe some columns permuted and others not yet.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::column::{sort_permutation, Column, SortOption, SortType};
use crate::core::csv::{self, CsvOptions, Table};
use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;

/// Row-major snapshot of a frame.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Rows {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct FrameState {
    columns: Vec<Arc<Column>>,
    header_index: HashMap<String, usize>,
}

impl FrameState {
    fn reindex(&mut self) {
        self.header_index = self
            .columns
            .iter()
            .enumerate()
            .map(|(position, column)| (column.header(), position))
            .collect();
    }

    fn position(&self, header: &str) -> Result<usize, Error> {
        self.header_index
            .get(header)
            .copied()
            .ok_or_else(|| Error::not_found(header))
    }

    fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.header()).collect()
    }

    fn push(&mut self, column: Column) -> Result<(), Error> {
        let header = column.header();
        if self.header_index.contains_key(&header) {
            return Err(Error::duplicate_header(&header));
        }
        self.columns.push(Arc::new(column));
        self.header_index.insert(header, self.columns.len() - 1);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Frame {
    state: Mutex<FrameState>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes ownership of `column` and appends it after the existing columns.
    pub fn add_column(&self, column: Column) -> Result<(), Error> {
        let header = column.header();
        let mut state = self.lock();
        state.push(column)?;
        debug!(header = %header, columns = state.columns.len(), "added column");
        Ok(())
    }

    /// Returns a handle to the frame's column. Edits through the handle are
    /// visible to the frame.
    pub fn column(&self, header: &str) -> Result<Arc<Column>, Error> {
        let state = self.lock();
        let position = state.position(header)?;
        Ok(Arc::clone(&state.columns[position]))
    }

    pub fn column_count(&self) -> usize {
        self.lock().columns.len()
    }

    /// Largest row count across all columns.
    pub fn row_count(&self) -> usize {
        self.lock()
            .columns
            .iter()
            .map(|column| column.row_count())
            .max()
            .unwrap_or(0)
    }

    pub fn delete_column(&self, header: &str) -> bool {
        let mut state = self.lock();
        let Ok(position) = state.position(header) else {
            return false;
        };
        state.columns.remove(position);
        state.reindex();
        debug!(header, "deleted column");
        true
    }

    pub fn update_header(&self, old_header: &str, new_header: &str) -> Result<(), Error> {
        let mut state = self.lock();
        let position = state.position(old_header)?;
        if old_header == new_header {
            return Ok(());
        }
        if state.header_index.contains_key(new_header) {
            return Err(Error::duplicate_header(new_header));
        }
        state.columns[position].rename(new_header);
        state.reindex();
        debug!(old_header, new_header, "renamed column");
        Ok(())
    }

    pub fn headers(&self) -> Vec<String> {
        self.lock().headers()
    }

    /// Moves one column to `new_index`, shifting the columns in between.
    pub fn move_column(&self, header: &str, new_index: usize) -> Result<(), Error> {
        let mut state = self.lock();
        let position = state.position(header)?;
        if new_index >= state.columns.len() {
            return Err(Error::index_out_of_range(new_index, state.columns.len()).with_header(header));
        }
        if position == new_index {
            return Ok(());
        }
        let column = state.columns.remove(position);
        state.columns.insert(new_index, column);
        state.reindex();
        debug!(header, from = position, to = new_index, "moved column");
        Ok(())
    }

    /// Sorts every column by the permutation that sorts `header`.
    pub fn sort(&self, header: &str, sort_type: SortType, option: SortOption) -> Result<(), Error> {
        let state = self.lock();
        let position = state.position(header)?;
        let keys = state.columns[position].values();
        let order = sort_permutation(&keys, sort_type, option);

        if let Some(uneven) = state
            .columns
            .iter()
            .find(|column| column.row_count() != order.len())
        {
            return Err(Error::new(ErrorKind::ShapeMismatch)
                .with_message(format!(
                    "column has {} rows, sort key has {}",
                    uneven.row_count(),
                    order.len()
                ))
                .with_header(uneven.header()));
        }

        for column in &state.columns {
            trace!(header = %column.header(), "applying sort permutation");
            column.apply_permutation(&order)?;
        }
        debug!(header, %sort_type, %option, rows = order.len(), "sorted frame");
        Ok(())
    }

    /// Row `i` holds the text of row `i` of every column in column order.
    /// Columns shorter than the longest one contribute empty cells.
    pub fn to_rows(&self) -> Rows {
        let state = self.lock();
        let snapshots: Vec<Vec<Value>> = state.columns.iter().map(|column| column.values()).collect();
        let row_count = snapshots.iter().map(Vec::len).max().unwrap_or(0);
        let rows = (0..row_count)
            .map(|row| {
                snapshots
                    .iter()
                    .map(|values| {
                        values
                            .get(row)
                            .map(|value| value.text().to_string())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();
        Rows {
            headers: state.headers(),
            rows,
        }
    }

    pub fn from_rows<H, C>(headers: &[H], rows: &[Vec<C>]) -> Result<Self, Error>
    where
        H: AsRef<str>,
        C: AsRef<str>,
    {
        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != headers.len())
        {
            return Err(Error::new(ErrorKind::ShapeMismatch)
                .with_message(format!(
                    "row has {} cells, expected {}",
                    cells.len(),
                    headers.len()
                ))
                .with_row(row));
        }

        let frame = Frame::new();
        for (position, header) in headers.iter().enumerate() {
            let values = rows
                .iter()
                .map(|cells| Value::from(cells[position].as_ref()))
                .collect();
            frame.add_column(Column::from_values(header.as_ref(), values))?;
        }
        Ok(frame)
    }

    /// Builds a frame from columns of uneven length, padding each at the back
    /// with `fill` up to the longest column.
    pub fn from_columns(fill: Value, columns: impl IntoIterator<Item = Column>) -> Result<Self, Error> {
        let columns: Vec<Column> = columns.into_iter().collect();
        let target = columns.iter().map(Column::row_count).max().unwrap_or(0);
        let frame = Frame::new();
        for column in columns {
            column.appends(fill.clone(), target)?;
            frame.add_column(column)?;
        }
        Ok(frame)
    }

    /// Loads a frame from a comma-delimited file. With `selected`, only those
    /// headers are loaded, in the given order, and a header missing from the
    /// file fails the whole load. Repeated header names in the file are only an
    /// error when they would be loaded. An empty file loads as an empty frame.
    pub fn from_csv(selected: Option<&[&str]>, path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_csv_with(selected, path, &CsvOptions::default())
    }

    pub fn from_csv_with(
        selected: Option<&[&str]>,
        path: impl AsRef<Path>,
        options: &CsvOptions,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        let table = csv::read_table(path, options)?;

        let mut positions = HashMap::with_capacity(table.headers.len());
        let mut repeated = HashSet::new();
        for (position, header) in table.headers.iter().enumerate() {
            if positions.insert(header.as_str(), position).is_some() {
                repeated.insert(header.as_str());
            }
        }

        let wanted: Vec<(usize, &str)> = match selected {
            Some(selected) => selected
                .iter()
                .map(|&header| {
                    if repeated.contains(header) {
                        return Err(Error::duplicate_header(header).with_path(path));
                    }
                    positions
                        .get(header)
                        .map(|&position| (position, header))
                        .ok_or_else(|| Error::not_found(header).with_path(path))
                })
                .collect::<Result<_, _>>()?,
            None => {
                if let Some(header) = table.headers.iter().find(|h| repeated.contains(h.as_str())) {
                    return Err(Error::duplicate_header(header).with_path(path));
                }
                table
                    .headers
                    .iter()
                    .enumerate()
                    .map(|(position, header)| (position, header.as_str()))
                    .collect()
            }
        };

        let frame = Frame::new();
        for (position, header) in wanted {
            let values = table
                .records
                .iter()
                .map(|record| Value::from(record[position].as_str()))
                .collect();
            frame
                .add_column(Column::from_values(header, values))
                .map_err(|err| err.with_path(path))?;
        }
        debug!(
            path = %path.display(),
            columns = frame.column_count(),
            rows = table.records.len(),
            "loaded frame from csv"
        );
        Ok(frame)
    }

    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.to_csv_with(path, &CsvOptions::default())
    }

    pub fn to_csv_with(&self, path: impl AsRef<Path>, options: &CsvOptions) -> Result<(), Error> {
        let path = path.as_ref();
        let Rows { headers, rows } = self.to_rows();
        let row_count = rows.len();
        let table = Table {
            headers,
            records: rows,
        };
        csv::write_table(path, options, &table)?;
        debug!(
            path = %path.display(),
            columns = table.headers.len(),
            rows = row_count,
            "stored frame as csv"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Frame, Rows};
    use crate::core::column::{Column, SortOption, SortType};
    use crate::core::error::ErrorKind;
    use crate::core::value::Value;

    fn column(header: &str, cells: &[&str]) -> Column {
        Column::from_values(header, cells.iter().map(|&c| Value::new(c)).collect())
    }

    fn numbered(header: &str, n: usize) -> Column {
        let column = Column::new(header);
        for i in 0..n {
            column.push_back(Value::new(i));
        }
        column
    }

    #[test]
    fn add_lookup_delete() {
        let frame = Frame::new();
        frame.add_column(numbered("second1", 100)).expect("add second1");
        let err = frame.add_column(numbered("second1", 1)).expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::DuplicateHeader);
        frame.add_column(numbered("second2", 100)).expect("add second2");

        assert_eq!(frame.column("second1").expect("second1").row_count(), 100);
        assert_eq!(frame.headers(), vec!["second1", "second2"]);

        assert!(frame.delete_column("second1"));
        assert_eq!(frame.column_count(), 1);
        assert!(!frame.delete_column("second1"));
        assert_eq!(frame.column("second1").expect_err("gone").kind(), ErrorKind::NotFound);
        assert_eq!(frame.column("second2").expect("reindexed").header(), "second2");

        assert!(frame.delete_column("second2"));
        assert_eq!(frame.column_count(), 0);
    }

    #[test]
    fn handle_edits_are_visible() {
        let frame = Frame::new();
        frame.add_column(numbered("c", 3)).expect("add");
        let handle = frame.column("c").expect("c");
        handle.push_back(Value::new("x"));
        assert_eq!(frame.column("c").expect("c").back(), Some(Value::new("x")));
        assert_eq!(frame.row_count(), 4);
    }

    #[test]
    fn update_header_rules() {
        let frame = Frame::new();
        frame.add_column(numbered("a", 1)).expect("a");
        frame.add_column(numbered("b", 1)).expect("b");

        frame.update_header("a", "a").expect("same name");
        assert_eq!(frame.headers(), vec!["a", "b"]);

        assert_eq!(frame.update_header("a", "b").expect_err("taken").kind(), ErrorKind::DuplicateHeader);
        assert_eq!(frame.update_header("z", "y").expect_err("absent").kind(), ErrorKind::NotFound);

        frame.update_header("a", "c").expect("rename");
        assert_eq!(frame.headers(), vec!["c", "b"]);
        assert_eq!(frame.column("c").expect("c").header(), "c");
        assert_eq!(frame.column("a").expect_err("old").kind(), ErrorKind::NotFound);
    }

    #[test]
    fn move_column_preserves_other_order() {
        let frame = Frame::new();
        for header in ["a", "b", "c", "d"] {
            frame.add_column(numbered(header, 1)).expect("add");
        }
        frame.move_column("a", 2).expect("move right");
        assert_eq!(frame.headers(), vec!["b", "c", "a", "d"]);
        frame.move_column("d", 0).expect("move left");
        assert_eq!(frame.headers(), vec!["d", "b", "c", "a"]);
        frame.move_column("c", 2).expect("no-op");
        assert_eq!(frame.headers(), vec!["d", "b", "c", "a"]);
        assert_eq!(frame.column("a").expect("a").header(), "a");

        assert_eq!(frame.move_column("a", 4).expect_err("past end").kind(), ErrorKind::IndexOutOfRange);
        assert_eq!(frame.move_column("x", 0).expect_err("absent").kind(), ErrorKind::NotFound);
    }

    #[test]
    fn sort_permutes_every_column() {
        let frame = Frame::new();
        frame.add_column(column("key", &["2", "x", "10", "1"])).expect("key");
        frame.add_column(column("tag", &["two", "zero", "ten", "one"])).expect("tag");

        frame.sort("key", SortType::Number, SortOption::Descending).expect("sort");
        let rows = frame.to_rows();
        assert_eq!(
            rows.rows,
            vec![
                vec!["10", "ten"],
                vec!["2", "two"],
                vec!["1", "one"],
                vec!["x", "zero"],
            ]
        );

        frame.sort("tag", SortType::String, SortOption::Ascending).expect("sort by tag");
        assert_eq!(frame.column("key").expect("key").values()[0], Value::new("1"));

        assert_eq!(
            frame.sort("nope", SortType::String, SortOption::Ascending).expect_err("absent").kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn sort_rejects_uneven_columns_without_permuting() {
        let frame = Frame::new();
        frame.add_column(column("key", &["2", "1"])).expect("key");
        frame.add_column(column("short", &["b"])).expect("short");
        let err = frame
            .sort("key", SortType::Number, SortOption::Ascending)
            .expect_err("uneven");
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert_eq!(frame.column("key").expect("key").front(), Some(Value::new("2")));
    }

    #[test]
    fn from_columns_pads_with_fill() {
        let frame = Frame::from_columns(
            Value::new("0"),
            [column("A", &["1"]), column("B", &["1", "2"]), column("C", &["1", "2", "3"])],
        )
        .expect("from columns");
        assert_eq!(
            frame.to_rows().rows,
            vec![vec!["1", "1", "1"], vec!["0", "2", "2"], vec!["0", "0", "3"]]
        );

        let err = Frame::from_columns(Value::nil(), [column("A", &[]), column("A", &["1"])])
            .expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::DuplicateHeader);
    }

    #[test]
    fn rows_round_trip() {
        let rows = Rows {
            headers: vec!["a".into(), "b".into()],
            rows: vec![vec!["1".into(), "".into()], vec!["2".into(), "y".into()]],
        };
        let frame = Frame::from_rows(&rows.headers, &rows.rows).expect("from rows");
        assert!(frame.column("b").expect("b").value(0).expect("cell").is_nil());
        assert_eq!(frame.to_rows(), rows);
    }

    #[test]
    fn from_rows_checks_arity() {
        let err = Frame::from_rows(&["a", "b"], &[vec!["1", "2"], vec!["3"]]).expect_err("short row");
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert_eq!(err.row(), Some(1));

        let err = Frame::from_rows(&["a", "a"], &[vec!["1", "2"]]).expect_err("dup");
        assert_eq!(err.kind(), ErrorKind::DuplicateHeader);
    }

    #[test]
    fn uneven_rows_render_missing_cells_empty() {
        let frame = Frame::new();
        frame.add_column(column("a", &["1", "2"])).expect("a");
        frame.add_column(column("b", &["x"])).expect("b");
        assert_eq!(frame.to_rows().rows, vec![vec!["1", "x"], vec!["2", ""]]);
    }

    #[test]
    fn rows_serialize_to_json() {
        let frame = Frame::from_rows(&["a"], &[vec!["1"]]).expect("frame");
        let encoded = serde_json::to_value(frame.to_rows()).expect("encode");
        assert_eq!(encoded, serde_json::json!({"headers": ["a"], "rows": [["1"]]}));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn add_column_event_names_header() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            Frame::new().add_column(column("latency", &["1"])).expect("add");
        });

        let logged = String::from_utf8(captured.0.lock().expect("log buffer").clone()).expect("utf8");
        assert!(logged.contains("added column"), "{logged}");
        assert!(logged.contains("header=latency"), "{logged}");
    }
}
