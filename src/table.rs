use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::io;

use chrono::{NaiveDate, NaiveDateTime};

use smartstring::alias::{String as SmartString};

use super::error::Error;


#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Date(NaiveDate),
	DateTime(NaiveDateTime),
	Integer(i64),
	Float(f64),
	Text(SmartString),
	Nested(serde_json::Value),
}

impl Value {
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::Null => "null",
			Self::Date(_) => "date",
			Self::DateTime(_) => "date-time",
			Self::Integer(_) => "integer",
			Self::Float(_) => "float",
			Self::Text(_) => "text",
			Self::Nested(_) => "nested json",
		}
	}

	#[inline(always)]
	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Integer(v) => Some(*v as f64),
			Self::Float(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Self::Integer(v) => Some(*v),
			_ => None,
		}
	}

	/// Calendar date of a date or date-time value.
	pub fn as_date(&self) -> Option<NaiveDate> {
		match self {
			Self::Date(d) => Some(*d),
			Self::DateTime(dt) => Some(dt.date()),
			_ => None,
		}
	}

	pub fn as_datetime(&self) -> Option<NaiveDateTime> {
		match self {
			Self::Date(d) => d.and_hms_opt(0, 0, 0),
			Self::DateTime(dt) => Some(*dt),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_nested(&self) -> Option<&serde_json::Value> {
		match self {
			Self::Nested(v) => Some(v),
			_ => None,
		}
	}
}

impl fmt::Display for Value {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Null => Ok(()),
			Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
			Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
			Self::Integer(v) => write!(f, "{}", v),
			Self::Float(v) => write!(f, "{}", v),
			Self::Text(s) => f.write_str(s),
			Self::Nested(v) => write!(f, "{}", v),
		}
	}
}

impl From<&str> for Value {
	fn from(other: &str) -> Self {
		Self::Text(other.into())
	}
}

impl From<i64> for Value {
	fn from(other: i64) -> Self {
		Self::Integer(other)
	}
}

impl From<f64> for Value {
	fn from(other: f64) -> Self {
		Self::Float(other)
	}
}

impl From<NaiveDate> for Value {
	fn from(other: NaiveDate) -> Self {
		Self::Date(other)
	}
}


/// Orders two values of compatible kinds.
///
/// Numbers compare numerically (integers and floats mix), dates and
/// date-times compare on the time axis, text compares lexicographically. Null
/// sorts before everything. Anything else is incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
	match (a, b) {
		(Value::Null, Value::Null) => Some(Ordering::Equal),
		(Value::Null, _) => Some(Ordering::Less),
		(_, Value::Null) => Some(Ordering::Greater),
		(Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
		(Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
		_ => {
			if let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) {
				return a.partial_cmp(&b)
			}
			if let (Some(a), Some(b)) = (a.as_datetime(), b.as_datetime()) {
				return Some(a.cmp(&b))
			}
			None
		},
	}
}


/// Row-major table with named columns.
///
/// Tables are never modified in place; every operation hands out a new table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
	columns: Vec<SmartString>,
	rows: Vec<Vec<Value>>,
}

impl Table {
	/// Every row must hold exactly one cell per column.
	pub fn new(columns: Vec<SmartString>, rows: Vec<Vec<Value>>) -> Result<Self, Error> {
		if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != columns.len()) {
			return Err(Error::RaggedRow{row: i, expected: columns.len(), found: row.len()})
		}
		Ok(Self{columns, rows})
	}

	#[inline(always)]
	pub fn columns(&self) -> &[SmartString] {
		&self.columns[..]
	}

	#[inline(always)]
	pub fn rows(&self) -> &[Vec<Value>] {
		&self.rows[..]
	}

	#[inline(always)]
	pub fn len(&self) -> usize {
		self.rows.len()
	}

	#[inline(always)]
	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	pub fn column_index(&self, name: &str) -> Result<usize, Error> {
		self.columns.iter().position(|c| c.as_str() == name).ok_or_else(|| Error::UnknownColumn(name.into()))
	}

	pub fn column(&self, name: &str) -> Result<Vec<&Value>, Error> {
		let index = self.column_index(name)?;
		Ok(self.rows.iter().map(|row| &row[index]).collect())
	}

	pub fn value(&self, row: usize, name: &str) -> Result<Option<&Value>, Error> {
		let index = self.column_index(name)?;
		Ok(self.rows.get(row).map(|r| &r[index]))
	}

	pub fn filter<F: Fn(&[Value]) -> bool>(&self, f: F) -> Table {
		Self{
			columns: self.columns.clone(),
			rows: self.rows.iter().filter(|row| f(&row[..])).cloned().collect(),
		}
	}

	/// Rows whose `column` equals `value`.
	pub fn filter_eq(&self, column: &str, value: &Value) -> Result<Table, Error> {
		let index = self.column_index(column)?;
		Ok(self.filter(|row| row[index] == *value))
	}

	/// Stable sort by one column.
	pub fn sorted_by(&self, column: &str, descending: bool) -> Result<Table, Error> {
		let index = self.column_index(column)?;
		let mut rows = self.rows.clone();
		rows.sort_by(|a, b| {
			let ord = compare_values(&a[index], &b[index]).unwrap_or(Ordering::Equal);
			if descending {
				ord.reverse()
			} else {
				ord
			}
		});
		Ok(Self{
			columns: self.columns.clone(),
			rows,
		})
	}

	/// Sums `columns` per distinct value of `key`.
	///
	/// The result holds the key followed by the summed columns and is ordered
	/// by key ascending. Null cells are skipped and integer columns stay
	/// integer. A summed column holding anything but numbers is an error.
	pub fn sum_by(&self, key: &str, columns: &[&str]) -> Result<Table, Error> {
		let key_index = self.column_index(key)?;
		let indices = columns.iter().map(|c| self.column_index(c)).collect::<Result<Vec<_>, _>>()?;
		for (name, index) in columns.iter().zip(indices.iter()) {
			let bad = self.rows.iter().map(|row| &row[*index]).find(|v| {
				!matches!(v, Value::Null | Value::Integer(_) | Value::Float(_))
			});
			if let Some(v) = bad {
				return Err(Error::ColumnType{
					column: (*name).into(),
					expected: "numbers",
					found: v.type_name(),
				})
			}
		}

		// floats and nested JSON are not hashable, group on the rendered key
		let mut slots: HashMap<(&'static str, String), usize> = HashMap::new();
		let mut groups: Vec<(&Value, Vec<Value>)> = Vec::new();
		for row in self.rows.iter() {
			let key = &row[key_index];
			let slot = *slots.entry((key.type_name(), key.to_string())).or_insert_with(|| {
				groups.push((key, vec![Value::Integer(0); indices.len()]));
				groups.len() - 1
			});
			for (acc, index) in groups[slot].1.iter_mut().zip(indices.iter()) {
				*acc = match (&*acc, &row[*index]) {
					(acc, Value::Null) => acc.clone(),
					(Value::Integer(a), Value::Integer(b)) => Value::Integer(a + b),
					(acc, v) => Value::Float(acc.as_f64().unwrap_or(0.) + v.as_f64().unwrap_or(0.)),
				};
			}
		}

		groups.sort_by(|a, b| compare_values(a.0, b.0).unwrap_or(Ordering::Equal));

		let mut names = Vec::with_capacity(indices.len() + 1);
		names.push(self.columns[key_index].clone());
		names.extend(indices.iter().map(|i| self.columns[*i].clone()));
		let rows = groups.into_iter().map(|(key, sums)| {
			let mut row = Vec::with_capacity(names.len());
			row.push(key.clone());
			row.extend(sums);
			row
		}).collect();
		Ok(Self{columns: names, rows})
	}

	pub fn write_csv<W: io::Write>(&self, w: W) -> Result<(), csv::Error> {
		let mut w = csv::Writer::from_writer(w);
		w.write_record(self.columns.iter().map(|c| c.as_bytes()))?;
		for row in self.rows.iter() {
			w.write_record(row.iter().map(|v| v.to_string()))?;
		}
		w.flush()?;
		Ok(())
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	fn date(y: i32, m: u32, d: u32) -> Value {
		Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
	}

	fn timeline() -> Table {
		Table::new(
			vec!["Time".into(), "Bezirk".into(), "AnzahlFaelle".into(), "Inzidenz".into()],
			vec![
				vec![date(2021, 3, 2), "Wien".into(), Value::Integer(10), 1.5.into()],
				vec![date(2021, 3, 1), "Graz".into(), Value::Integer(3), 0.5.into()],
				vec![date(2021, 3, 1), "Wien".into(), Value::Integer(7), 1.0.into()],
				vec![date(2021, 3, 2), "Graz".into(), Value::Null, 0.25.into()],
			],
		).unwrap()
	}

	#[test]
	fn test_unknown_column() {
		match timeline().column("Nope") {
			Err(Error::UnknownColumn(name)) => assert_eq!(name.as_str(), "Nope"),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn test_filter_eq() {
		let wien = timeline().filter_eq("Bezirk", &"Wien".into()).unwrap();
		assert_eq!(wien.len(), 2);
		assert!(wien.rows().iter().all(|r| r[1] == Value::from("Wien")));
	}

	#[test]
	fn test_sorted_by_is_stable() {
		let sorted = timeline().sorted_by("Time", false).unwrap();
		let districts: Vec<_> = sorted.column("Bezirk").unwrap().into_iter().map(|v| v.to_string()).collect();
		assert_eq!(districts, vec!["Graz", "Wien", "Wien", "Graz"]);
	}

	#[test]
	fn test_new_rejects_ragged_rows() {
		let result = Table::new(
			vec!["Time".into(), "AnzahlFaelle".into()],
			vec![
				vec![date(2021, 3, 1), Value::Integer(3)],
				vec![date(2021, 3, 2)],
			],
		);
		match result {
			Err(Error::RaggedRow{row, expected, found}) => assert_eq!((row, expected, found), (1, 2, 1)),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn test_sum_by_keeps_integers() {
		let summed = timeline().sum_by("Time", &["AnzahlFaelle", "Inzidenz"]).unwrap();
		let columns: Vec<&str> = summed.columns().iter().map(|c| c.as_str()).collect();
		assert_eq!(columns, vec!["Time", "AnzahlFaelle", "Inzidenz"]);
		assert_eq!(summed.rows()[0], vec![date(2021, 3, 1), Value::Integer(10), Value::Float(1.5)]);
		assert_eq!(summed.rows()[1], vec![date(2021, 3, 2), Value::Integer(10), Value::Float(1.75)]);
	}

	#[test]
	fn test_sum_by_only_sums_named_columns() {
		let summed = timeline().sum_by("Time", &["AnzahlFaelle"]).unwrap();
		assert_eq!(summed.columns().len(), 2);
		match timeline().sum_by("Time", &["Bezirk"]) {
			Err(Error::ColumnType{column, found, ..}) => {
				assert_eq!(column.as_str(), "Bezirk");
				assert_eq!(found, "text");
			},
			other => panic!("unexpected result: {:?}", other),
		}
		assert!(matches!(timeline().sum_by("Time", &["Nope"]), Err(Error::UnknownColumn(_))));
	}

	#[test]
	fn test_sum_by_many_groups() {
		// 400 days of 94 districts, newest day first
		let first = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
		let mut rows = Vec::new();
		for day in (0..400).rev() {
			let d = Value::Date(first + chrono::Duration::days(day));
			for district in 0..94 {
				rows.push(vec![d.clone(), Value::Integer(district)]);
			}
		}
		let table = Table::new(vec!["Time".into(), "AnzahlFaelle".into()], rows).unwrap();
		let summed = table.sum_by("Time", &["AnzahlFaelle"]).unwrap();
		assert_eq!(summed.len(), 400);
		assert_eq!(summed.rows()[0], vec![Value::Date(first), Value::Integer(93 * 94 / 2)]);
		assert!(summed.rows().windows(2).all(|w| {
			compare_values(&w[0][0], &w[1][0]) == Some(Ordering::Less)
		}));
	}

	#[test]
	fn test_compare_values_mixed_numbers() {
		assert_eq!(compare_values(&Value::Integer(2), &Value::Float(2.5)), Some(Ordering::Less));
		assert_eq!(compare_values(&Value::Null, &Value::Integer(0)), Some(Ordering::Less));
		assert_eq!(compare_values(&"a".into(), &Value::Integer(0)), None);
	}

	#[test]
	fn test_write_csv() {
		let mut buf = Vec::new();
		timeline().filter_eq("Bezirk", &"Graz".into()).unwrap().write_csv(&mut buf).unwrap();
		let text = String::from_utf8(buf).unwrap();
		assert_eq!(text, "Time,Bezirk,AnzahlFaelle,Inzidenz\n2021-03-01,Graz,3,0.5\n2021-03-02,Graz,,0.25\n");
	}
}
