use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use log::{debug, warn};

use chrono::{Datelike, NaiveDate};

use enum_map::EnumMap;

use serde::{Deserialize, Serialize};

use smartstring::alias::{String as SmartString};

use super::error::Error;
use super::normalize::{iso_week, Weekday};
use super::table::{compare_values, Table, Value};


static TAIL_DAYS: usize = 7;
static LAST_DAYS_LISTED: usize = 5;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Statistic {
	#[serde(rename = "sum")]
	Sum,
	#[serde(rename = "max")]
	Max,
	#[serde(rename = "min")]
	Min,
	#[serde(rename = "mean")]
	Mean,
	#[serde(rename = "median")]
	Median,
	#[serde(rename = "latest")]
	Latest,
	#[serde(rename = "rolling_avg")]
	RollingAvg,
	#[serde(rename = "last_7_days_sum")]
	Last7DaysSum,
	#[serde(rename = "last_5_days")]
	Last5Days,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatisticError {
	Empty,
	NotNumeric(&'static str),
	Incomparable,
}

impl fmt::Display for StatisticError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Empty => f.write_str("no values"),
			Self::NotNumeric(found) => write!(f, "expected numbers, found {}", found),
			Self::Incomparable => f.write_str("values cannot be ordered"),
		}
	}
}

impl std::error::Error for StatisticError {}

fn numbers(values: &[&Value]) -> Result<Vec<f64>, StatisticError> {
	let mut result = Vec::with_capacity(values.len());
	for v in values.iter() {
		match v {
			Value::Null => continue,
			other => match other.as_f64() {
				Some(f) => result.push(f),
				None => return Err(StatisticError::NotNumeric(other.type_name())),
			},
		}
	}
	Ok(result)
}

fn sum(values: &[&Value]) -> Result<Value, StatisticError> {
	let nums = numbers(values)?;
	if values.iter().all(|v| matches!(v, Value::Integer(_) | Value::Null)) {
		Ok(Value::Integer(values.iter().filter_map(|v| v.as_i64()).sum()))
	} else {
		Ok(Value::Float(nums.iter().sum()))
	}
}

fn mean(values: &[&Value]) -> Result<Value, StatisticError> {
	let nums = numbers(values)?;
	if nums.is_empty() {
		return Ok(Value::Null)
	}
	Ok(Value::Float(nums.iter().sum::<f64>() / nums.len() as f64))
}

fn median(values: &[&Value]) -> Result<Value, StatisticError> {
	let mut nums = numbers(values)?;
	if nums.is_empty() {
		return Ok(Value::Null)
	}
	nums.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
	let mid = nums.len() / 2;
	if nums.len() % 2 == 0 {
		Ok(Value::Float((nums[mid - 1] + nums[mid]) / 2.))
	} else {
		Ok(Value::Float(nums[mid]))
	}
}

fn extreme(values: &[&Value], want: Ordering) -> Result<Value, StatisticError> {
	let mut best: Option<&Value> = None;
	for v in values.iter().copied().filter(|v| !v.is_null()) {
		best = match best {
			None => Some(v),
			Some(b) => match compare_values(v, b) {
				Some(ord) if ord == want => Some(v),
				Some(_) => Some(b),
				None => return Err(StatisticError::Incomparable),
			},
		};
	}
	Ok(best.cloned().unwrap_or(Value::Null))
}

fn tail<'a, 'v>(values: &'a [&'v Value], n: usize) -> &'a [&'v Value] {
	&values[values.len().saturating_sub(n)..]
}

impl Statistic {
	pub const ALL: [Statistic; 9] = [
		Statistic::Sum,
		Statistic::Max,
		Statistic::Min,
		Statistic::Mean,
		Statistic::Median,
		Statistic::Latest,
		Statistic::RollingAvg,
		Statistic::Last7DaysSum,
		Statistic::Last5Days,
	];

	pub fn name(&self) -> &'static str {
		match self {
			Self::Sum => "sum",
			Self::Max => "max",
			Self::Min => "min",
			Self::Mean => "mean",
			Self::Median => "median",
			Self::Latest => "latest",
			Self::RollingAvg => "rolling_avg",
			Self::Last7DaysSum => "last_7_days_sum",
			Self::Last5Days => "last_5_days",
		}
	}

	/// Computes the statistic over the values of one group, oldest first.
	///
	/// Null cells are skipped by the numeric statistics but still count as
	/// rows for the tail windows.
	pub fn compute(&self, values: &[&Value]) -> Result<Value, StatisticError> {
		if values.is_empty() {
			return Err(StatisticError::Empty)
		}
		match self {
			Self::Sum => sum(values),
			Self::Max => extreme(values, Ordering::Greater),
			Self::Min => extreme(values, Ordering::Less),
			Self::Mean => mean(values),
			Self::Median => median(values),
			Self::Latest => Ok(values[values.len() - 1].clone()),
			Self::RollingAvg => mean(tail(values, TAIL_DAYS)),
			Self::Last7DaysSum => sum(tail(values, TAIL_DAYS)),
			Self::Last5Days => {
				let parts: Vec<String> = tail(values, LAST_DAYS_LISTED).iter().map(|v| v.to_string()).collect();
				Ok(Value::Text(parts.join(", ").into()))
			},
		}
	}
}

impl fmt::Display for Statistic {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Statistic {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match Self::ALL.iter().find(|st| st.name() == s) {
			Some(st) => Ok(*st),
			None => Err(format!("unknown statistic {:?}", s)),
		}
	}
}


/// How rows are partitioned before statistics are computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
	/// Distinct values of a column, e.g. a country code.
	Column(SmartString),
	/// Weekday of a date column.
	Weekday(SmartString),
	/// (ISO year, ISO week) of a date column.
	IsoWeek(SmartString),
	/// ISO week number of a date column, ignoring the year.
	///
	/// Weeks with the same number in different years end up in the same
	/// group. Only use this when that is what you want.
	RawWeek(SmartString),
	/// Calendar month of a date column, ignoring the year.
	Month(SmartString),
	/// (year, month) of a date column.
	YearMonth(SmartString),
}

impl Grouping {
	fn column(&self) -> &str {
		match self {
			Self::Column(c) | Self::Weekday(c) | Self::IsoWeek(c) | Self::RawWeek(c) | Self::Month(c) | Self::YearMonth(c) => c,
		}
	}

	fn key(&self, v: &Value) -> Option<GroupKey> {
		if let Self::Column(_) = self {
			return Some(match v {
				Value::Integer(i) => GroupKey::Integer(*i),
				Value::Date(d) => GroupKey::Date(*d),
				other => GroupKey::Text(other.to_string().into()),
			})
		}
		let date = v.as_date()?;
		Some(match self {
			Self::Column(_) => return None,
			Self::Weekday(_) => GroupKey::Weekday(Weekday::of(date)),
			Self::IsoWeek(_) => {
				let (year, week) = iso_week(date);
				GroupKey::IsoWeek{year, week}
			},
			Self::RawWeek(_) => GroupKey::Week(iso_week(date).1),
			Self::Month(_) => GroupKey::Month(date.month()),
			Self::YearMonth(_) => GroupKey::YearMonth{year: date.year(), month: date.month()},
		})
	}
}


#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
	Text(SmartString),
	Integer(i64),
	Date(NaiveDate),
	Weekday(Weekday),
	IsoWeek{year: i32, week: u32},
	Week(u32),
	Month(u32),
	YearMonth{year: i32, month: u32},
}

impl fmt::Display for GroupKey {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Text(s) => f.write_str(s),
			Self::Integer(i) => write!(f, "{}", i),
			Self::Date(d) => write!(f, "{}", d),
			Self::Weekday(w) => fmt::Display::fmt(w, f),
			Self::IsoWeek{year, week} => write!(f, "{:04}-W{:02}", year, week),
			Self::Week(w) => write!(f, "W{:02}", w),
			Self::Month(m) => write!(f, "{:02}", m),
			Self::YearMonth{year, month} => write!(f, "{:04}-{:02}", year, month),
		}
	}
}


#[derive(Debug, Clone, PartialEq)]
pub enum Order {
	/// By the most recent date of each group, oldest group first.
	LatestDate,
	/// By the group key.
	Key,
	/// By a computed statistic. Nulls sort last either way.
	Statistic{column: SmartString, statistic: Statistic, descending: bool},
}


#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
	pub key: GroupKey,
	pub rows: usize,
	/// Date of the group's last row in sort order.
	pub latest_date: Value,
	pub values: BTreeMap<(SmartString, Statistic), Value>,
}

impl AggregateRecord {
	pub fn get(&self, column: &str, statistic: Statistic) -> Option<&Value> {
		self.values.get(&(SmartString::from(column), statistic))
	}
}


/// A group-by over a table sorted by one date column.
#[derive(Debug, Clone)]
pub struct Aggregation {
	date_column: SmartString,
	grouping: Grouping,
	stats: Vec<(SmartString, Vec<Statistic>)>,
	order: Order,
}

impl Aggregation {
	pub fn new<S: Into<SmartString>>(date_column: S, grouping: Grouping) -> Self {
		Self{
			date_column: date_column.into(),
			grouping,
			stats: Vec::new(),
			order: Order::LatestDate,
		}
	}

	pub fn stat<S: Into<SmartString>>(mut self, column: S, stats: &[Statistic]) -> Self {
		self.stats.push((column.into(), stats.to_vec()));
		self
	}

	pub fn order(mut self, order: Order) -> Self {
		self.order = order;
		self
	}

	/// Row indices sorted ascending by the date column; stable for equal dates.
	fn sorted_rows(&self, table: &Table) -> Result<Vec<usize>, Error> {
		let date_index = table.column_index(&self.date_column)?;
		let rows = table.rows();
		let mut order: Vec<usize> = (0..rows.len()).collect();
		order.sort_by(|a, b| {
			compare_values(&rows[*a][date_index], &rows[*b][date_index]).unwrap_or(Ordering::Equal)
		});
		Ok(order)
	}

	fn resolve_stats(&self, table: &Table) -> Result<Vec<(usize, &SmartString, &[Statistic])>, Error> {
		let mut result = Vec::with_capacity(self.stats.len());
		for (column, stats) in self.stats.iter() {
			result.push((table.column_index(column)?, column, &stats[..]));
		}
		Ok(result)
	}

	fn groups(&self, table: &Table) -> Result<Vec<(GroupKey, Vec<usize>)>, Error> {
		let key_index = table.column_index(self.grouping.column())?;
		let sorted = self.sorted_rows(table)?;

		let mut groups: Vec<(GroupKey, Vec<usize>)> = Vec::new();
		let mut index: HashMap<GroupKey, usize> = HashMap::new();
		let mut years: BTreeSet<i32> = BTreeSet::new();
		let mut skipped = 0;
		for row in sorted {
			let v = &table.rows()[row][key_index];
			let key = match self.grouping.key(v) {
				Some(k) => k,
				None => {
					skipped += 1;
					continue
				},
			};
			if let (Grouping::RawWeek(_), Some(date)) = (&self.grouping, v.as_date()) {
				years.insert(iso_week(date).0);
			}
			match index.get(&key) {
				Some(i) => groups[*i].1.push(row),
				None => {
					index.insert(key.clone(), groups.len());
					groups.push((key, vec![row]));
				},
			}
		}

		if skipped > 0 {
			debug!("{} rows without a usable {} value were not grouped", skipped, self.grouping.column());
		}
		if years.len() > 1 {
			warn!("grouping by week number merges {} ISO years ({:?}); use the (year, week) grouping to keep them apart", years.len(), years);
		}
		Ok(groups)
	}

	fn record(&self, table: &Table, key: GroupKey, rows: &[usize], stats: &[(usize, &SmartString, &[Statistic])]) -> Result<AggregateRecord, Error> {
		let date_index = table.column_index(&self.date_column)?;
		let latest_date = match rows.last() {
			Some(r) => table.rows()[*r][date_index].clone(),
			None => Value::Null,
		};
		let mut values = BTreeMap::new();
		for (column_index, column, statistics) in stats.iter() {
			let cells: Vec<&Value> = rows.iter().map(|r| &table.rows()[*r][*column_index]).collect();
			for statistic in statistics.iter() {
				let v = statistic.compute(&cells[..]).map_err(|e| match e {
					StatisticError::Empty => Error::EmptyGroup{column: (*column).clone(), key: key.to_string()},
					StatisticError::NotNumeric(found) => Error::ColumnType{column: (*column).clone(), expected: "numbers", found},
					StatisticError::Incomparable => Error::ColumnType{column: (*column).clone(), expected: "comparable values", found: "mixed kinds"},
				})?;
				values.insert(((*column).clone(), *statistic), v);
			}
		}
		Ok(AggregateRecord{
			key,
			rows: rows.len(),
			latest_date,
			values,
		})
	}

	pub fn run(&self, table: &Table) -> Result<Vec<AggregateRecord>, Error> {
		let stats = self.resolve_stats(table)?;
		let groups = self.groups(table)?;
		let mut records = Vec::with_capacity(groups.len());
		for (key, rows) in groups {
			records.push(self.record(table, key, &rows[..], &stats[..])?);
		}

		match &self.order {
			Order::LatestDate => records.sort_by(|a, b| {
				compare_values(&a.latest_date, &b.latest_date).unwrap_or(Ordering::Equal)
			}),
			Order::Key => records.sort_by(|a, b| a.key.cmp(&b.key)),
			Order::Statistic{column, statistic, descending} => {
				let k = (column.clone(), *statistic);
				records.sort_by(|a, b| {
					match (a.values.get(&k), b.values.get(&k)) {
						(Some(va), Some(vb)) if !va.is_null() && !vb.is_null() => {
							let ord = compare_values(va, vb).unwrap_or(Ordering::Equal);
							if *descending { ord.reverse() } else { ord }
						},
						(Some(va), _) if !va.is_null() => Ordering::Less,
						(_, Some(vb)) if !vb.is_null() => Ordering::Greater,
						_ => Ordering::Equal,
					}
				});
			},
		}
		Ok(records)
	}

	/// Aggregates the single group `key`. Fails with `EmptyGroup` if no row
	/// falls into it.
	pub fn run_group(&self, table: &Table, key: &GroupKey) -> Result<AggregateRecord, Error> {
		let stats = self.resolve_stats(table)?;
		let rows = self.groups(table)?
			.into_iter()
			.find(|(k, _)| k == key)
			.map(|(_, rows)| rows)
			.unwrap_or_default();
		if rows.is_empty() {
			return Err(Error::EmptyGroup{
				column: self.grouping.column().into(),
				key: key.to_string(),
			})
		}
		self.record(table, key.clone(), &rows[..], &stats[..])
	}
}


/// Sum of `value_column` per weekday of `date_column`.
pub fn weekday_totals(table: &Table, date_column: &str, value_column: &str) -> Result<EnumMap<Weekday, f64>, Error> {
	let date_index = table.column_index(date_column)?;
	let value_index = table.column_index(value_column)?;
	let mut totals: EnumMap<Weekday, f64> = EnumMap::default();
	for row in table.rows() {
		let date = match row[date_index].as_date() {
			Some(d) => d,
			None => continue,
		};
		match &row[value_index] {
			Value::Null => (),
			v => match v.as_f64() {
				Some(f) => totals[Weekday::of(date)] += f,
				None => return Err(Error::ColumnType{
					column: value_column.into(),
					expected: "numbers",
					found: v.type_name(),
				}),
			},
		}
	}
	Ok(totals)
}
