use std::fmt;

use log::debug;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use enum_map::Enum;

use serde::{Deserialize, Serialize};

use smartstring::alias::{String as SmartString};

use super::error::{DateFormatError, Error, NumericParseError};
use super::fetch::{RawTable, RawValue};
use super::schema::{ColumnKind, ColumnSpec, Derived, DerivedKind, NumericPolicy, Schema};
use super::table::{Table, Value};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Enum, Serialize, Deserialize)]
pub enum Weekday {
	Monday,
	Tuesday,
	Wednesday,
	Thursday,
	Friday,
	Saturday,
	Sunday,
}

impl Weekday {
	pub const ALL: [Weekday; 7] = [
		Weekday::Monday,
		Weekday::Tuesday,
		Weekday::Wednesday,
		Weekday::Thursday,
		Weekday::Friday,
		Weekday::Saturday,
		Weekday::Sunday,
	];

	pub fn of(date: NaiveDate) -> Self {
		date.weekday().into()
	}

	/// Monday = 0 .. Sunday = 6
	pub fn index(&self) -> u32 {
		*self as u32
	}

	pub fn from_index(i: u32) -> Option<Self> {
		Self::ALL.get(i as usize).copied()
	}

	pub fn name(&self) -> &'static str {
		match self {
			Self::Monday => "Monday",
			Self::Tuesday => "Tuesday",
			Self::Wednesday => "Wednesday",
			Self::Thursday => "Thursday",
			Self::Friday => "Friday",
			Self::Saturday => "Saturday",
			Self::Sunday => "Sunday",
		}
	}
}

impl From<chrono::Weekday> for Weekday {
	fn from(other: chrono::Weekday) -> Self {
		match other {
			chrono::Weekday::Mon => Self::Monday,
			chrono::Weekday::Tue => Self::Tuesday,
			chrono::Weekday::Wed => Self::Wednesday,
			chrono::Weekday::Thu => Self::Thursday,
			chrono::Weekday::Fri => Self::Friday,
			chrono::Weekday::Sat => Self::Saturday,
			chrono::Weekday::Sun => Self::Sunday,
		}
	}
}

impl fmt::Display for Weekday {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}


/// ISO 8601 (year, week) of a date. Around new year the ISO year may differ
/// from the calendar year.
pub fn iso_week(date: NaiveDate) -> (i32, u32) {
	let w = date.iso_week();
	(w.year(), w.week())
}


/// The fixed literal formats used by the data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateFormat {
	/// `DD.MM.YYYY`
	DayMonthYear,
	/// `DD.MM.YYYY HH:MM:SS`
	DayMonthYearTime,
	/// `DD/MM/YYYY`
	DayMonthYearSlash,
	/// `YYYY-MM-DDTHH:MM:SSZ`
	IsoUtc,
	/// `YYYY-Www`, resolved to the Monday of that ISO week
	IsoWeek,
}

impl DateFormat {
	pub fn pattern(&self) -> &'static str {
		match self {
			Self::DayMonthYear => "%d.%m.%Y",
			Self::DayMonthYearTime => "%d.%m.%Y %H:%M:%S",
			Self::DayMonthYearSlash => "%d/%m/%Y",
			Self::IsoUtc => "%Y-%m-%dT%H:%M:%SZ",
			Self::IsoWeek => "%G-W%V",
		}
	}

	pub fn has_time(&self) -> bool {
		matches!(self, Self::DayMonthYearTime | Self::IsoUtc)
	}

	fn error(&self, s: &str) -> DateFormatError {
		DateFormatError{literal: s.into(), pattern: self.pattern()}
	}

	/// Parses a literal which must match the pattern exactly.
	///
	/// chrono accepts unpadded fields and surrounding slack, so the parsed
	/// value is formatted again and compared with the input.
	pub fn parse(&self, s: &str) -> Result<NaiveDateTime, DateFormatError> {
		let parsed = match self {
			Self::IsoWeek => parse_iso_week(s).and_then(|d| d.and_hms_opt(0, 0, 0)),
			_ if self.has_time() => NaiveDateTime::parse_from_str(s, self.pattern()).ok(),
			_ => NaiveDate::parse_from_str(s, self.pattern()).ok().and_then(|d| d.and_hms_opt(0, 0, 0)),
		};
		match parsed {
			Some(dt) if self.format(dt) == s => Ok(dt),
			_ => Err(self.error(s)),
		}
	}

	pub fn parse_date(&self, s: &str) -> Result<NaiveDate, DateFormatError> {
		Ok(self.parse(s)?.date())
	}

	pub fn format(&self, dt: NaiveDateTime) -> String {
		match self {
			Self::IsoWeek => {
				let (year, week) = iso_week(dt.date());
				format!("{:04}-W{:02}", year, week)
			},
			_ => dt.format(self.pattern()).to_string(),
		}
	}
}

fn parse_iso_week(s: &str) -> Option<NaiveDate> {
	if s.len() != 8 || !s.is_ascii() || &s[4..6] != "-W" {
		return None
	}
	let year = s[..4].parse::<i32>().ok()?;
	let week = s[6..].parse::<u32>().ok()?;
	NaiveDate::from_isoywd_opt(year, week, chrono::Weekday::Mon)
}


/// Parses a number which may use a decimal comma (`"12,5"` is 12.5).
pub fn coerce_decimal(s: &str) -> Result<f64, NumericParseError> {
	let replaced = s.trim().replace(',', ".");
	match replaced.parse::<f64>() {
		Ok(v) if v.is_finite() => Ok(v),
		_ => Err(NumericParseError{literal: s.into()}),
	}
}

pub fn coerce_integer(s: &str) -> Result<i64, NumericParseError> {
	s.trim().parse::<i64>().map_err(|_| NumericParseError{literal: s.into()})
}


fn derive(kind: DerivedKind, date: NaiveDate) -> Value {
	match kind {
		DerivedKind::WeekdayIndex => Value::Integer(Weekday::of(date).index() as i64),
		DerivedKind::WeekdayName => Value::Text(Weekday::of(date).name().into()),
		DerivedKind::IsoWeek => Value::Integer(iso_week(date).1 as i64),
		DerivedKind::IsoYear => Value::Integer(iso_week(date).0 as i64),
		DerivedKind::Month => Value::Integer(date.month() as i64),
		DerivedKind::Year => Value::Integer(date.year() as i64),
	}
}

fn push_derived(row: &mut Vec<Value>, derived: &[Derived], sources: &[usize]) {
	for (d, index) in derived.iter().zip(sources.iter()) {
		let v = match row[*index].as_date() {
			Some(date) => derive(d.kind, date),
			None => Value::Null,
		};
		row.push(v);
	}
}

fn is_blank(cell: &RawValue) -> bool {
	match cell {
		RawValue::Null => true,
		RawValue::Text(s) => s.trim().is_empty(),
		_ => false,
	}
}

fn literal(cell: &RawValue) -> String {
	match cell {
		RawValue::Null => String::new(),
		RawValue::Text(s) => s.clone(),
		RawValue::Number(n) => n.to_string(),
		RawValue::Nested(v) => v.to_string(),
	}
}

fn untyped(cell: &RawValue) -> Value {
	match cell {
		RawValue::Null => Value::Null,
		RawValue::Text(s) => Value::Text(s.as_str().into()),
		RawValue::Number(n) => match n.as_i64() {
			Some(i) => Value::Integer(i),
			None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
		},
		RawValue::Nested(v) => Value::Nested(v.clone()),
	}
}

fn parse_number(cell: &RawValue, integer: bool) -> Result<Value, NumericParseError> {
	match cell {
		RawValue::Number(n) => {
			if let Some(i) = n.as_i64() {
				return Ok(if integer { Value::Integer(i) } else { Value::Float(i as f64) })
			}
			match n.as_f64() {
				Some(v) if !integer => Ok(Value::Float(v)),
				Some(v) if v.fract() == 0. && v.abs() < i64::MAX as f64 => Ok(Value::Integer(v as i64)),
				_ => Err(NumericParseError{literal: n.to_string()}),
			}
		},
		RawValue::Text(s) if integer => coerce_integer(s).map(Value::Integer),
		RawValue::Text(s) => coerce_decimal(s).map(Value::Float),
		other => Err(NumericParseError{literal: literal(other)}),
	}
}

struct ColumnConverter<'s> {
	spec: &'s ColumnSpec,
	zeroed: usize,
}

impl<'s> ColumnConverter<'s> {
	fn convert(&mut self, cell: &RawValue, row: usize) -> Result<Value, Error> {
		let spec = self.spec;
		let policy = match spec.kind {
			ColumnKind::Integer(p) | ColumnKind::Float(p) => Some(p),
			_ => None,
		};
		let zero = || match spec.kind {
			ColumnKind::Integer(_) => Value::Integer(0),
			_ => Value::Float(0.),
		};

		if is_blank(cell) {
			if policy == Some(NumericPolicy::ZeroOnError) {
				self.zeroed += 1;
				return Ok(zero())
			}
			if spec.optional {
				return Ok(Value::Null)
			}
			return Err(Error::MissingValue{column: spec.name.into(), row})
		}

		let column = || -> SmartString { spec.name.into() };
		match spec.kind {
			ColumnKind::Date(format) => match cell {
				RawValue::Text(s) => format.parse_date(s).map(Value::Date),
				other => Err(format.error(&literal(other))),
			}.map_err(|err| Error::DateFormat{column: column(), row, err}),
			ColumnKind::DateTime(format) => match cell {
				RawValue::Text(s) => format.parse(s).map(Value::DateTime),
				other => Err(format.error(&literal(other))),
			}.map_err(|err| Error::DateFormat{column: column(), row, err}),
			ColumnKind::Integer(policy) | ColumnKind::Float(policy) => {
				let integer = matches!(spec.kind, ColumnKind::Integer(_));
				match parse_number(cell, integer) {
					Ok(v) => Ok(v),
					Err(_) if policy == NumericPolicy::ZeroOnError => {
						self.zeroed += 1;
						Ok(zero())
					},
					Err(err) => Err(Error::NumericParse{column: column(), row, err}),
				}
			},
			ColumnKind::Text => Ok(Value::Text(literal(cell).as_str().into())),
			ColumnKind::Nested => Ok(match cell {
				RawValue::Nested(v) => Value::Nested(v.clone()),
				other => Value::Nested(serde_json::Value::String(literal(other))),
			}),
		}
	}
}


/// Types the raw cells according to `schema` and appends derived columns.
///
/// Every declared column must exist in the raw table. Undeclared columns are
/// kept as received (text stays text, JSON numbers stay numbers).
pub fn normalize(raw: &RawTable, schema: &Schema) -> Result<Table, Error> {
	let mut converters: Vec<Option<ColumnConverter>> = raw.columns.iter().map(|_| None).collect();
	for spec in schema.columns.iter() {
		let index = match raw.columns.iter().position(|c| c.as_str() == spec.name) {
			Some(i) => i,
			None => return Err(Error::UnknownColumn(spec.name.into())),
		};
		converters[index] = Some(ColumnConverter{spec, zeroed: 0});
	}

	let mut derived_from = Vec::with_capacity(schema.derived.len());
	for derived in schema.derived.iter() {
		let index = match raw.columns.iter().position(|c| c.as_str() == derived.from) {
			Some(i) => i,
			None => return Err(Error::UnknownColumn(derived.from.into())),
		};
		match converters[index].as_ref().map(|c| c.spec.kind) {
			Some(ColumnKind::Date(_)) | Some(ColumnKind::DateTime(_)) => (),
			_ => return Err(Error::ColumnType{
				column: derived.from.into(),
				expected: "date",
				found: "undeclared or non-date column",
			}),
		}
		derived_from.push(index);
	}

	let mut columns = raw.columns.clone();
	columns.extend(schema.derived.iter().map(|d| SmartString::from(d.name)));

	let mut rows = Vec::with_capacity(raw.rows.len());
	for (i, raw_row) in raw.rows.iter().enumerate() {
		let mut row = Vec::with_capacity(columns.len());
		for (cell, converter) in raw_row.iter().zip(converters.iter_mut()) {
			row.push(match converter {
				Some(c) => c.convert(cell, i)?,
				None => untyped(cell),
			});
		}
		push_derived(&mut row, schema.derived, &derived_from[..]);
		rows.push(row);
	}

	for c in converters.iter().flatten() {
		if c.zeroed > 0 {
			debug!("coerced {} malformed values to zero in column {}", c.zeroed, c.spec.name);
		}
	}

	Table::new(columns, rows)
}


/// Appends `derived` columns to an already typed table, for tables that were
/// reshaped after normalization. Rows without a date in the source column get
/// null.
pub fn append_derived(table: &Table, derived: &[Derived]) -> Result<Table, Error> {
	let sources = derived.iter().map(|d| table.column_index(d.from)).collect::<Result<Vec<_>, _>>()?;
	let mut columns = table.columns().to_vec();
	columns.extend(derived.iter().map(|d| SmartString::from(d.name)));
	let rows = table.rows().iter().map(|row| {
		let mut row = row.clone();
		push_derived(&mut row, derived, &sources[..]);
		row
	}).collect();
	Table::new(columns, rows)
}
