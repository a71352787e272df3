use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;

use bytes::Bytes;

use smartstring::alias::{String as SmartString};

use super::error::FetchError;


/// A cell as delivered by the source, before any typing.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
	Null,
	Text(String),
	Number(serde_json::Number),
	Nested(serde_json::Value),
}

impl RawValue {
	fn from_json(v: &serde_json::Value) -> Self {
		match v {
			serde_json::Value::Null => Self::Null,
			serde_json::Value::Bool(b) => Self::Text(b.to_string()),
			serde_json::Value::Number(n) => Self::Number(n.clone()),
			serde_json::Value::String(s) => Self::Text(s.clone()),
			serde_json::Value::Array(_) | serde_json::Value::Object(_) => Self::Nested(v.clone()),
		}
	}
}


#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
	pub columns: Vec<SmartString>,
	pub rows: Vec<Vec<RawValue>>,
}

impl RawTable {
	/// Builds a table from a list of JSON objects.
	///
	/// Columns appear in the order in which their keys are first seen. A key
	/// missing from an object yields a null cell.
	pub fn from_json_records(items: &[serde_json::Value]) -> Result<Self, FetchError> {
		let mut columns: Vec<SmartString> = Vec::new();
		let mut known: HashMap<SmartString, usize> = HashMap::new();
		for (i, item) in items.iter().enumerate() {
			let obj = match item.as_object() {
				Some(obj) => obj,
				None => return Err(FetchError::Payload(format!("record {} is not an object", i))),
			};
			for key in obj.keys() {
				if !known.contains_key(key.as_str()) {
					known.insert(key.as_str().into(), columns.len());
					columns.push(key.as_str().into());
				}
			}
		}

		let mut rows = Vec::with_capacity(items.len());
		for item in items.iter() {
			let mut row = vec![RawValue::Null; columns.len()];
			if let Some(obj) = item.as_object() {
				for (key, v) in obj.iter() {
					if let Some(index) = known.get(key.as_str()) {
						row[*index] = RawValue::from_json(v);
					}
				}
			}
			rows.push(row);
		}
		Ok(Self{columns, rows})
	}
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
	Utf8,
	/// ISO-8859-1 as web payloads label it: WHATWG maps that label to
	/// windows-1252, so 0x80 to 0x9F decode as printable characters.
	Latin1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
	Csv{delimiter: u8, encoding: Encoding},
	/// Array of objects, either at the top level or under the given key.
	Json{records: Option<&'static str>},
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
	Url(String),
	File(PathBuf),
}

impl Source {
	/// Interprets `http://` and `https://` as URLs and anything else as a path.
	pub fn parse(s: &str) -> Self {
		if s.starts_with("http://") || s.starts_with("https://") {
			Self::Url(s.into())
		} else {
			Self::File(s.into())
		}
	}
}

impl fmt::Display for Source {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Url(url) => f.write_str(url),
			Self::File(path) => write!(f, "{}", path.display()),
		}
	}
}


pub trait Fetch {
	fn fetch(&self, source: &Source) -> Result<Bytes, FetchError>;
}


/// Fetches over blocking HTTP, or from disk for file sources.
pub struct BlockingFetcher {
	client: reqwest::blocking::Client,
}

impl BlockingFetcher {
	pub fn new() -> Self {
		Self::with_client(reqwest::blocking::Client::new())
	}

	pub fn with_client(client: reqwest::blocking::Client) -> Self {
		Self{client}
	}
}

impl Default for BlockingFetcher {
	fn default() -> Self {
		Self::new()
	}
}

impl Fetch for BlockingFetcher {
	fn fetch(&self, source: &Source) -> Result<Bytes, FetchError> {
		match source {
			Source::Url(url) => {
				debug!("GET {}", url);
				let resp = self.client.get(url.as_str()).send()?;
				let status = resp.status();
				if !status.is_success() {
					return Err(FetchError::Status{url: url.clone(), status})
				}
				let body = resp.bytes()?;
				debug!("received {} bytes from {}", body.len(), url);
				Ok(body)
			},
			Source::File(path) => read_file(path),
		}
	}
}


/// Opens a file, decompressing it on the fly if it ends in `.gz`.
pub fn open_file<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn Read>> {
	let path = path.as_ref();
	let f = fs::File::open(path)?;
	match path.extension() {
		Some(x) if x == "gz" => Ok(Box::new(flate2::read::GzDecoder::new(f))),
		_ => Ok(Box::new(f)),
	}
}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Bytes, FetchError> {
	let path = path.as_ref();
	debug!("reading {}", path.display());
	let mut r = open_file(path)?;
	let mut buf = Vec::new();
	r.read_to_end(&mut buf)?;
	Ok(Bytes::from(buf))
}


pub fn decode(body: &[u8], format: &Format) -> Result<RawTable, FetchError> {
	match format {
		Format::Csv{delimiter, encoding} => decode_csv(body, *delimiter, *encoding),
		Format::Json{records} => decode_json(body, *records),
	}
}

fn decode_csv(body: &[u8], delimiter: u8, encoding: Encoding) -> Result<RawTable, FetchError> {
	// both decoders strip a leading BOM
	let text = match encoding {
		Encoding::Utf8 => {
			let (text, had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(body);
			if had_errors {
				return Err(FetchError::Payload("invalid UTF-8 in csv".into()))
			}
			text
		},
		Encoding::Latin1 => encoding_rs::WINDOWS_1252.decode_with_bom_removal(body).0,
	};

	let mut r = csv::ReaderBuilder::new()
		.delimiter(delimiter)
		.from_reader(text.as_bytes());
	let columns: Vec<SmartString> = r.headers()?.iter().map(|h| h.trim().into()).collect();
	if columns.is_empty() || (columns.len() == 1 && columns[0].is_empty()) {
		return Err(FetchError::Payload("csv has no header".into()))
	}
	let mut rows = Vec::new();
	for record in r.records() {
		let record = record?;
		rows.push(record.iter().map(|field| RawValue::Text(field.into())).collect());
	}
	Ok(RawTable{columns, rows})
}

fn decode_json(body: &[u8], records: Option<&str>) -> Result<RawTable, FetchError> {
	let root: serde_json::Value = serde_json::from_slice(body)?;
	let items = match records {
		Some(key) => match root.get(key) {
			Some(v) => v,
			None => return Err(FetchError::Payload(format!("json has no {:?} member", key))),
		},
		None => &root,
	};
	match items.as_array() {
		Some(items) => RawTable::from_json_records(&items[..]),
		None => Err(FetchError::Payload("expected an array of records".into())),
	}
}
