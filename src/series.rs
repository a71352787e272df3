use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use smartstring::alias::{String as SmartString};

use super::error::Error;
use super::normalize::{iso_week, Weekday};
use super::table::{compare_values, Table, Value};


fn windowed_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
	let mut result = Vec::with_capacity(values.len());
	for i in 0..values.len() {
		if window == 0 || i + 1 < window {
			result.push(None);
			continue
		}
		let slice = &values[i + 1 - window..i + 1];
		let mut sum = 0.;
		let mut complete = true;
		for v in slice.iter() {
			match v {
				Some(v) => sum += v,
				None => {
					complete = false;
					break
				},
			}
		}
		result.push(if complete { Some(sum / window as f64) } else { None });
	}
	result
}

/// Mean over a trailing window. Positions before the first full window are
/// `None`.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
	let values: Vec<Option<f64>> = values.iter().map(|v| Some(*v)).collect();
	windowed_mean(&values[..], window)
}

pub fn diff(values: &[f64]) -> Vec<Option<f64>> {
	let mut result = Vec::with_capacity(values.len());
	let mut prev: Option<f64> = None;
	for v in values.iter() {
		result.push(prev.map(|p| v - p));
		prev = Some(*v);
	}
	result
}

pub fn cumsum(values: &[f64]) -> Vec<f64> {
	let mut accum = 0.;
	values.iter().map(|v| {
		accum += v;
		accum
	}).collect()
}


/// Dated numeric cells of two columns, sorted by date. Rows without a date are
/// skipped; null values are kept as `None`.
fn dated_values(table: &Table, date_column: &str, value_column: &str) -> Result<Vec<(NaiveDate, Option<f64>)>, Error> {
	let date_index = table.column_index(date_column)?;
	let value_index = table.column_index(value_column)?;
	let mut rows: Vec<&Vec<Value>> = table.rows().iter().filter(|r| r[date_index].as_date().is_some()).collect();
	rows.sort_by(|a, b| compare_values(&a[date_index], &b[date_index]).unwrap_or(Ordering::Equal));

	let mut result = Vec::with_capacity(rows.len());
	for row in rows {
		let date = match row[date_index].as_date() {
			Some(d) => d,
			None => continue,
		};
		let value = match &row[value_index] {
			Value::Null => None,
			v => match v.as_f64() {
				Some(f) => Some(f),
				None => return Err(Error::ColumnType{
					column: value_column.into(),
					expected: "numbers",
					found: v.type_name(),
				}),
			},
		};
		result.push((date, value));
	}
	Ok(result)
}


#[derive(Debug, Clone, PartialEq)]
pub struct YearSeries {
	pub year: i32,
	/// (`MM-DD`, rolling mean) in date order.
	pub points: Vec<(SmartString, Option<f64>)>,
}

/// Splits a dated series by calendar year so that years can be laid over each
/// other. Newest year first.
pub fn yearly(table: &Table, date_column: &str, value_column: &str, roll: usize) -> Result<Vec<YearSeries>, Error> {
	let mut years: BTreeMap<i32, Vec<(NaiveDate, Option<f64>)>> = BTreeMap::new();
	for (date, value) in dated_values(table, date_column, value_column)? {
		years.entry(date.year()).or_insert_with(Vec::new).push((date, value));
	}

	Ok(years.into_iter().rev().map(|(year, points)| {
		let values: Vec<Option<f64>> = points.iter().map(|(_, v)| *v).collect();
		let means = windowed_mean(&values[..], roll);
		YearSeries{
			year,
			points: points.iter().zip(means.into_iter()).map(|((date, _), mean)| {
				(SmartString::from(date.format("%m-%d").to_string()), mean)
			}).collect(),
		}
	}).collect())
}


#[derive(Debug, Clone, PartialEq)]
pub struct WeekProfile {
	pub year: i32,
	pub week: u32,
	pub points: Vec<(Weekday, f64)>,
}

/// Per-weekday values of the most recent `num_weeks` ISO weeks, newest week
/// first. Null values are left out.
pub fn weekday_profile(table: &Table, date_column: &str, value_column: &str, num_weeks: usize) -> Result<Vec<WeekProfile>, Error> {
	let mut weeks: BTreeMap<(i32, u32), Vec<(Weekday, f64)>> = BTreeMap::new();
	for (date, value) in dated_values(table, date_column, value_column)? {
		let points = weeks.entry(iso_week(date)).or_insert_with(Vec::new);
		if let Some(v) = value {
			points.push((Weekday::of(date), v));
		}
	}

	Ok(weeks.into_iter().rev().take(num_weeks).map(|((year, week), points)| {
		WeekProfile{year, week, points}
	}).collect())
}
