// Error kinds and the context-carrying error type shared by every engine operation.
use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    IndexOutOfRange,
    NotFound,
    DuplicateHeader,
    ShapeMismatch,
    SizeTooSmall,
    UnsupportedType,
    Malformed,
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    path: Option<PathBuf>,
    header: Option<String>,
    row: Option<usize>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            path: None,
            header: None,
            row: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn row(&self) -> Option<usize> {
        self.row
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub(crate) fn index_out_of_range(row: usize, size: usize) -> Self {
        Self::new(ErrorKind::IndexOutOfRange)
            .with_message(format!("index out of range (got {row} for size {size})"))
            .with_row(row)
    }

    pub(crate) fn not_found(header: &str) -> Self {
        Self::new(ErrorKind::NotFound)
            .with_message(format!("{header:?} does not exist"))
            .with_header(header)
    }

    pub(crate) fn duplicate_header(header: &str) -> Self {
        Self::new(ErrorKind::DuplicateHeader)
            .with_message(format!("{header:?} already exists"))
            .with_header(header)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(header) = &self.header {
            write!(f, " (header: {header})")?;
        }
        if let Some(row) = self.row {
            write!(f, " (row: {row})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}
