use std::fmt;
use std::io;

use smartstring::alias::{String as SmartString};


#[derive(Debug)]
pub enum FetchError {
	Request(reqwest::Error),
	Status{url: String, status: reqwest::StatusCode},
	Io(io::Error),
	Csv(csv::Error),
	Json(serde_json::Error),
	Payload(String),
}

impl fmt::Display for FetchError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Request(e) => fmt::Display::fmt(e, f),
			Self::Status{url, status} => write!(f, "GET {} returned {}", url, status),
			Self::Io(e) => fmt::Display::fmt(e, f),
			Self::Csv(e) => write!(f, "malformed csv: {}", e),
			Self::Json(e) => write!(f, "malformed json: {}", e),
			Self::Payload(msg) => write!(f, "unexpected payload: {}", msg),
		}
	}
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
	fn from(other: reqwest::Error) -> Self {
		Self::Request(other)
	}
}

impl From<io::Error> for FetchError {
	fn from(other: io::Error) -> Self {
		Self::Io(other)
	}
}

impl From<csv::Error> for FetchError {
	fn from(other: csv::Error) -> Self {
		Self::Csv(other)
	}
}

impl From<serde_json::Error> for FetchError {
	fn from(other: serde_json::Error) -> Self {
		Self::Json(other)
	}
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormatError {
	pub literal: String,
	pub pattern: &'static str,
}

impl fmt::Display for DateFormatError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:?} does not match date pattern {}", self.literal, self.pattern)
	}
}

impl std::error::Error for DateFormatError {}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericParseError {
	pub literal: String,
}

impl fmt::Display for NumericParseError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:?} is not a number", self.literal)
	}
}

impl std::error::Error for NumericParseError {}


#[derive(Debug)]
pub enum Error {
	Fetch(FetchError),
	DateFormat{column: SmartString, row: usize, err: DateFormatError},
	NumericParse{column: SmartString, row: usize, err: NumericParseError},
	MissingValue{column: SmartString, row: usize},
	EmptyGroup{column: SmartString, key: String},
	UnknownColumn(SmartString),
	ColumnType{column: SmartString, expected: &'static str, found: &'static str},
	UnknownCode{table: &'static str, code: String},
	EmptyTable(&'static str),
	RaggedRow{row: usize, expected: usize, found: usize},
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Fetch(e) => write!(f, "fetch failed: {}", e),
			Self::DateFormat{column, row, err} => write!(f, "row {}, column {}: {}", row, column, err),
			Self::NumericParse{column, row, err} => write!(f, "row {}, column {}: {}", row, column, err),
			Self::MissingValue{column, row} => write!(f, "row {}, column {}: value missing", row, column),
			Self::EmptyGroup{column, key} => write!(f, "no rows in group {} for column {}", key, column),
			Self::UnknownColumn(name) => write!(f, "unknown column {:?}", name),
			Self::ColumnType{column, expected, found} => write!(f, "column {} holds {}, expected {}", column, found, expected),
			Self::UnknownCode{table, code} => write!(f, "code {:?} not found in lookup table {}", code, table),
			Self::EmptyTable(name) => write!(f, "dataset {} has no rows", name),
			Self::RaggedRow{row, expected, found} => write!(f, "row {} has {} cells, expected {}", row, found, expected),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Fetch(e) => Some(e),
			Self::DateFormat{err, ..} => Some(err),
			Self::NumericParse{err, ..} => Some(err),
			_ => None,
		}
	}
}

impl From<FetchError> for Error {
	fn from(other: FetchError) -> Self {
		Self::Fetch(other)
	}
}
