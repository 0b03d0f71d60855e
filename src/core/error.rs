use std::fmt;

use crate::core::types::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    DuplicateKey,
    NotFound,
    MalformedInput,
    UnparseableDate,
    InvalidArgument,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn duplicate(id: &str) -> Self {
        Error::new(ErrorKind::DuplicateKey, format!("record '{}' already indexed", id))
    }

    pub fn not_found(id: &str) -> Self {
        Error::new(ErrorKind::NotFound, format!("record '{}' not indexed", id))
    }

    pub fn malformed(line: usize, reason: impl fmt::Display) -> Self {
        Error::new(ErrorKind::MalformedInput, format!("line {}: {}", line, reason))
    }

    pub fn is_duplicate(&self) -> bool {
        self.kind == ErrorKind::DuplicateKey
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        let kind = if err.is_io_error() {
            ErrorKind::Io
        } else {
            ErrorKind::MalformedInput
        };
        Error {
            kind,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Internal,
            context: format!("JSON error: {}", err),
        }
    }
}

/// A rejected insert. The record is handed back so the caller still owns it.
#[derive(Debug)]
pub struct InsertError {
    pub record: Record,
    pub error: Error,
}

impl InsertError {
    pub fn duplicate(record: Record) -> Self {
        let error = Error::duplicate(&record.id);
        InsertError { record, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind
    }
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for InsertError {}

impl From<InsertError> for Error {
    fn from(err: InsertError) -> Self {
        err.error
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_errors_keep_their_kind() {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(&b"a,b\nc\n"[..]);
        let err = reader
            .records()
            .find_map(|row| row.err())
            .map(Error::from)
            .unwrap();
        assert_eq!(err.kind, ErrorKind::MalformedInput);

        let io = csv::Error::from(std::io::Error::other("gone"));
        assert_eq!(Error::from(io).kind, ErrorKind::Io);
    }

    #[test]
    fn insert_error_hands_the_record_back() {
        let record = Record::new("A-1", "IL", None);
        let err = InsertError::duplicate(record.clone());
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert_eq!(err.record, record);
        assert!(Error::from(err).is_duplicate());
    }
}
