//! Purpose: Delimited-text reader/writer shared by frame load and store.
//! Exports: `CsvOptions`, `Terminator` (crate-internal: `Table`, `read_table`, `write_table`).
//! Role: Single place that knows the on-disk layout; frames only see headers and cells.
//! Invariants: Reader and writer share one delimiter/quote convention, so output reads back verbatim.
//! Invariants: The first record is always the header row; ragged records are rejected.
//! Invariants: A table with no headers is stored as an empty file, and an empty file reads back as
//! a table with no headers.

use std::fs::File;
use std::path::Path;

use crate::core::error::{Error, ErrorKind};

/// Record terminator used when writing. Reading accepts `\n`, `\r\n` and `\r` either way.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Terminator {
    #[default]
    Lf,
    CrLf,
}

impl Terminator {
    fn for_writer(self) -> csv::Terminator {
        match self {
            Terminator::Lf => csv::Terminator::Any(b'\n'),
            Terminator::CrLf => csv::Terminator::CRLF,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote: u8,
    pub terminator: Terminator,
}

impl CsvOptions {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            terminator: Terminator::Lf,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Headers plus row-major cell text as stored in a file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

pub(crate) fn read_table(path: &Path, options: &CsvOptions) -> Result<Table, Error> {
    let file = File::open(path)
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .quote(options.quote)
        .terminator(csv::Terminator::CRLF)
        .flexible(false)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| csv_error(err, path))?
        .iter()
        .map(str::to_string)
        .collect();
    // Any non-empty line yields at least one field, so no headers means an empty file.
    if headers.is_empty() {
        return Ok(Table::default());
    }

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| csv_error(err, path))?;
        records.push(record.iter().map(str::to_string).collect());
    }
    Ok(Table { headers, records })
}

pub(crate) fn write_table(path: &Path, options: &CsvOptions, table: &Table) -> Result<(), Error> {
    let file = File::create(path)
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .terminator(options.terminator.for_writer())
        .flexible(false)
        .from_writer(file);

    // The writer would emit `""` for an empty record, which reads back as one unnamed column.
    if table.headers.is_empty() {
        return Ok(());
    }
    writer
        .write_record(&table.headers)
        .map_err(|err| csv_error(err, path))?;
    for record in &table.records {
        writer.write_record(record).map_err(|err| csv_error(err, path))?;
    }
    writer
        .flush()
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    Ok(())
}

fn csv_error(err: csv::Error, path: &Path) -> Error {
    let kind = if err.is_io_error() {
        ErrorKind::Io
    } else if matches!(err.kind(), csv::ErrorKind::UnequalLengths { .. }) {
        ErrorKind::ShapeMismatch
    } else {
        ErrorKind::Malformed
    };
    let mut out = Error::new(kind).with_path(path);
    if let Some(position) = err.position() {
        out = out.with_row(position.record() as usize);
    }
    match err.into_kind() {
        csv::ErrorKind::Io(io) => out.with_source(io),
        other => out.with_message(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::{read_table, write_table, CsvOptions, Table, Terminator};
    use crate::core::error::ErrorKind;
    use std::fs;

    fn table(headers: &[&str], records: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            records: records
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn quoted_fields_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("quoted.csv");
        let original = table(
            &["name", "note"],
            &[&["a,b", "line1\nline2"], &["say \"hi\"", ""], &["", "plain"]],
        );
        write_table(&path, &CsvOptions::default(), &original).expect("write");
        let read = read_table(&path, &CsvOptions::default()).expect("read");
        assert_eq!(read, original);
    }

    #[test]
    fn custom_delimiter_is_shared() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tabs.tsv");
        let options = CsvOptions::new().with_delimiter(b'\t');
        let original = table(&["a", "b"], &[&["1,5", "2"]]);
        write_table(&path, &options, &original).expect("write");
        let raw = fs::read_to_string(&path).expect("read raw");
        assert_eq!(raw, "a\tb\n1,5\t2\n");
        assert_eq!(read_table(&path, &options).expect("read"), original);
    }

    #[test]
    fn ragged_records_are_shape_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ragged.csv");
        fs::write(&path, "a,b\n1,2\n3\n").expect("write");
        let err = read_table(&path, &CsvOptions::default()).expect_err("ragged");
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn crlf_terminator_is_shared() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("crlf-out.csv");
        let options = CsvOptions::new().with_terminator(Terminator::CrLf);
        let original = table(&["a", "b"], &[&["1", "x\ny"], &["", "2"]]);
        write_table(&path, &options, &original).expect("write");
        let raw = fs::read_to_string(&path).expect("read raw");
        assert_eq!(raw, "a,b\r\n1,\"x\ny\"\r\n,2\r\n");
        assert_eq!(read_table(&path, &options).expect("read"), original);
        assert_eq!(read_table(&path, &CsvOptions::default()).expect("read lf"), original);
    }

    #[test]
    fn empty_file_is_headerless_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").expect("write");
        let read = read_table(&path, &CsvOptions::default()).expect("empty");
        assert_eq!(read, Table::default());
    }

    #[test]
    fn headerless_table_writes_empty_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("none.csv");
        fs::write(&path, "stale\n").expect("seed");
        write_table(&path, &CsvOptions::default(), &Table::default()).expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read raw"), "");
        assert_eq!(read_table(&path, &CsvOptions::default()).expect("read"), Table::default());
    }

    #[test]
    fn missing_file_is_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nope.csv");
        let err = read_table(&path, &CsvOptions::default()).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn crlf_input_is_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("crlf.csv");
        fs::write(&path, "a,b\r\n1,\r\n").expect("write");
        let read = read_table(&path, &CsvOptions::default()).expect("read");
        assert_eq!(read, table(&["a", "b"], &[&["1", ""]]));
    }
}
