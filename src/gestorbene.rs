use std::collections::HashMap;

use log::debug;

use once_cell::sync::OnceCell;

use smartstring::alias::{String as SmartString};

use super::aggregate::{AggregateRecord, Aggregation, Grouping, Order, Statistic};
use super::dataset::{DatasetSpec, Loader};
use super::error::{DateFormatError, Error};
use super::fetch::{Encoding, Format};
use super::normalize::DateFormat;
use super::schema::{ColumnSpec, Schema};
use super::table::{Table, Value};


const STAT_CSV: Format = Format::Csv{delimiter: b';', encoding: Encoding::Utf8};

pub const KALWOCHE: &str = "C-KALWOCHE-0";
pub const BUNDESLAND: &str = "C-B00-0";
pub const ALTERSGRUPPE: &str = "C-ALTERGR65-0";
pub const GESCHLECHT: &str = "C-C11-0";
pub const ANZAHL: &str = "F-ANZ-1";

pub const UNDER_65: &str = "ALTERSGR65-1";
pub const OVER_65: &str = "ALTERSGR65-2";

pub static DEATHS: DatasetSpec = DatasetSpec{
	name: "gestorbene",
	url: "http://data.statistik.gv.at/data/OGD_gest_kalwo_GEST_KALWOCHE_100.csv",
	format: STAT_CSV,
	schema: Schema{
		columns: &[
			ColumnSpec::text(KALWOCHE),
			ColumnSpec::text(BUNDESLAND),
			ColumnSpec::text(ALTERSGRUPPE),
			ColumnSpec::text(GESCHLECHT),
			ColumnSpec::integer(ANZAHL),
		],
		derived: &[],
	},
};

const LOOKUP: Schema = Schema{
	columns: &[
		ColumnSpec::text("code"),
		ColumnSpec::text("name"),
	],
	derived: &[],
};

const LOOKUP_EN: Schema = Schema{
	columns: &[
		ColumnSpec::text("code"),
		ColumnSpec::text("name"),
		ColumnSpec::text("en_name").optional(),
	],
	derived: &[],
};

pub static HEADERS: DatasetSpec = DatasetSpec{
	name: "gestorbene_headers",
	url: "http://data.statistik.gv.at/data/OGD_gest_kalwo_GEST_KALWOCHE_100_HEADER.csv",
	format: STAT_CSV,
	schema: LOOKUP_EN,
};

pub static GESCHLECHT_CODES: DatasetSpec = DatasetSpec{
	name: "gestorbene_geschlecht",
	url: "http://data.statistik.gv.at/data/OGD_gest_kalwo_GEST_KALWOCHE_100_C-C11-0.csv",
	format: STAT_CSV,
	schema: LOOKUP_EN,
};

pub static ALTERSGRUPPE_CODES: DatasetSpec = DatasetSpec{
	name: "gestorbene_altersgruppe",
	url: "http://data.statistik.gv.at/data/OGD_gest_kalwo_GEST_KALWOCHE_100_C-ALTERGR65-0.csv",
	format: STAT_CSV,
	schema: LOOKUP_EN,
};

pub static BUNDESLAND_CODES: DatasetSpec = DatasetSpec{
	name: "gestorbene_bundesland",
	url: "http://data.statistik.gv.at/data/OGD_gest_kalwo_GEST_KALWOCHE_100_C-B00-0.csv",
	format: STAT_CSV,
	schema: LOOKUP,
};

pub static KALWOCHE_CODES: DatasetSpec = DatasetSpec{
	name: "gestorbene_kal_woche",
	url: "http://data.statistik.gv.at/data/OGD_gest_kalwo_GEST_KALWOCHE_100_C-KALWOCHE-0.csv",
	format: STAT_CSV,
	schema: LOOKUP,
};


/// First and last day of a calendar week label such as
/// `KW01 2020 (30.12.2019 bis 05.01.2020)`.
fn week_bounds(label: &str) -> Result<(Value, Value), DateFormatError> {
	let cleaned = label.replace('(', "").replace(')', "");
	let words: Vec<&str> = cleaned.split_whitespace().collect();
	if words.len() < 3 {
		return Err(DateFormatError{literal: label.into(), pattern: DateFormat::DayMonthYear.pattern()})
	}
	let begin = DateFormat::DayMonthYear.parse_date(words[words.len() - 3])?;
	let end = DateFormat::DayMonthYear.parse_date(words[words.len() - 1])?;
	Ok((Value::Date(begin), Value::Date(end)))
}

/// State names carry their NUTS code, as in `Kärnten <AT21>`.
fn strip_nuts(name: &str) -> &str {
	match name.find('<') {
		Some(i) => name[..i].trim(),
		None => name.trim(),
	}
}

fn codes<'t>(table: &'t Table, label: &str) -> Result<HashMap<&'t str, &'t Value>, Error> {
	let code = table.column_index("code")?;
	let label = table.column_index(label)?;
	let mut result = HashMap::with_capacity(table.len());
	for row in table.rows() {
		if let Some(c) = row[code].as_str() {
			result.insert(c, &row[label]);
		}
	}
	Ok(result)
}

fn resolve<'m, 't>(map: &'m HashMap<&'t str, &'t Value>, table: &'static str, code: &Value) -> Result<&'t Value, Error> {
	let key = code.as_str().unwrap_or("");
	match map.get(key) {
		Some(v) => Ok(*v),
		None => Err(Error::UnknownCode{table, code: code.to_string()}),
	}
}


/// Weekly deaths from Statistik Austria.
#[derive(Debug, Default)]
pub struct Gestorbene {
	loader: Loader,
	df: OnceCell<Table>,
	headers: OnceCell<Table>,
	geschlecht: OnceCell<Table>,
	altersgruppe: OnceCell<Table>,
	bundesland: OnceCell<Table>,
	kal_woche: OnceCell<Table>,
}

impl Gestorbene {
	pub fn new(loader: Loader) -> Self {
		Self{
			loader,
			df: OnceCell::new(),
			headers: OnceCell::new(),
			geschlecht: OnceCell::new(),
			altersgruppe: OnceCell::new(),
			bundesland: OnceCell::new(),
			kal_woche: OnceCell::new(),
		}
	}

	/// Column descriptions of the deaths table.
	pub fn headers(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.headers, &HEADERS)
	}

	pub fn geschlecht(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.geschlecht, &GESCHLECHT_CODES)
	}

	pub fn altersgruppe(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.altersgruppe, &ALTERSGRUPPE_CODES)
	}

	pub fn bundesland(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.bundesland, &BUNDESLAND_CODES)
	}

	pub fn kal_woche(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.kal_woche, &KALWOCHE_CODES)
	}

	/// Deaths per week, state, age group and sex, with the week, sex and state
	/// codes resolved into `week_begin`, `week_end`, `sex` and `bundesland`.
	pub fn df(&self) -> Result<&Table, Error> {
		self.df.get_or_try_init(|| {
			let raw = self.loader.load(&DEATHS)?;
			let weeks = codes(self.kal_woche()?, "name")?;
			let sexes = codes(self.geschlecht()?, "en_name")?;
			let states = codes(self.bundesland()?, "name")?;

			let week_index = raw.column_index(KALWOCHE)?;
			let sex_index = raw.column_index(GESCHLECHT)?;
			let state_index = raw.column_index(BUNDESLAND)?;

			// week codes repeat for every state, age group and sex
			let mut bounds: HashMap<&str, (Value, Value)> = HashMap::new();

			let mut columns = raw.columns().to_vec();
			columns.extend(["week_begin", "week_end", "sex", "bundesland"].iter().map(|c| SmartString::from(*c)));
			let mut rows = Vec::with_capacity(raw.len());
			for (i, raw_row) in raw.rows().iter().enumerate() {
				let week_code = raw_row[week_index].as_str().unwrap_or("");
				let (begin, end) = match bounds.get(week_code) {
					Some(b) => b.clone(),
					None => {
						let label = resolve(&weeks, "kal_woche", &raw_row[week_index])?.to_string();
						let b = week_bounds(&label).map_err(|err| Error::DateFormat{
							column: "week_begin".into(),
							row: i,
							err,
						})?;
						bounds.insert(week_code, b.clone());
						b
					},
				};
				let sex = resolve(&sexes, "geschlecht", &raw_row[sex_index])?;
				let state = resolve(&states, "bundesland", &raw_row[state_index])?.to_string();

				let mut row = raw_row.clone();
				row.push(begin);
				row.push(end);
				row.push(sex.clone());
				row.push(Value::Text(strip_nuts(&state).into()));
				rows.push(row);
			}
			debug!("resolved codes of {} death records over {} weeks", rows.len(), bounds.len());
			Table::new(columns, rows)
		})
	}

	/// Rows of the 0 to 64 age group. Filtered anew on every call.
	pub fn under_65(&self) -> Result<Table, Error> {
		self.df()?.filter_eq(ALTERSGRUPPE, &Value::from(UNDER_65))
	}

	/// Rows of the 65 and older age group. Filtered anew on every call.
	pub fn over_65(&self) -> Result<Table, Error> {
		self.df()?.filter_eq(ALTERSGRUPPE, &Value::from(OVER_65))
	}

	/// Total deaths per (ISO year, ISO week), oldest week first.
	pub fn weekly_deaths(&self) -> Result<Vec<AggregateRecord>, Error> {
		weekly_deaths(self.df()?)
	}
}

pub fn weekly_deaths(df: &Table) -> Result<Vec<AggregateRecord>, Error> {
	Aggregation::new("week_begin", Grouping::IsoWeek("week_begin".into()))
		.stat(ANZAHL, &[Statistic::Sum])
		.order(Order::Key)
		.run(df)
}


#[cfg(test)]
mod tests {
	use super::*;

	use chrono::NaiveDate;

	#[test]
	fn test_week_bounds() {
		let (begin, end) = week_bounds("KW01 2020 (30.12.2019 bis 05.01.2020)").unwrap();
		assert_eq!(begin, Value::Date(NaiveDate::from_ymd_opt(2019, 12, 30).unwrap()));
		assert_eq!(end, Value::Date(NaiveDate::from_ymd_opt(2020, 1, 5).unwrap()));
		assert!(week_bounds("KW01").is_err());
		assert!(week_bounds("KW01 (1.1.2020 bis 5.1.2020)").is_err());
	}

	#[test]
	fn test_strip_nuts() {
		assert_eq!(strip_nuts("Kärnten <AT21>"), "Kärnten");
		assert_eq!(strip_nuts("Wien"), "Wien");
	}
}
