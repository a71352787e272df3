use once_cell::sync::OnceCell;

use super::aggregate::{AggregateRecord, Aggregation, Grouping, Order, Statistic};
use super::dataset::{DatasetSpec, Loader};
use super::error::Error;
use super::fetch::Format;
use super::normalize::DateFormat;
use super::schema::{ColumnKind, ColumnSpec, Derived, DerivedKind, NumericPolicy, Schema};
use super::table::{Table, Value};


const ECDC_RECORDS: Format = Format::Json{records: Some("records")};

pub const NOTIFICATION_RATE: &str = "notification_rate_per_100000_population_14-days";

pub static CASES: DatasetSpec = DatasetSpec{
	name: "ecdc_cases",
	url: "https://opendata.ecdc.europa.eu/covid19/casedistribution/json",
	format: ECDC_RECORDS,
	schema: Schema{
		columns: &[
			ColumnSpec::date("dateRep", DateFormat::DayMonthYearSlash),
			ColumnSpec::integer("day"),
			ColumnSpec::integer("month"),
			ColumnSpec::integer("year"),
			ColumnSpec::integer("cases"),
			ColumnSpec::integer("deaths"),
			ColumnSpec::text("countriesAndTerritories"),
			ColumnSpec::text("geoId"),
			ColumnSpec::text("continentExp"),
		],
		derived: &[
			Derived::new("weekday", "dateRep", DerivedKind::WeekdayIndex),
			Derived::new("iso_week", "dateRep", DerivedKind::IsoWeek),
			Derived::new("iso_year", "dateRep", DerivedKind::IsoYear),
		],
	},
};

pub static TESTING: DatasetSpec = DatasetSpec{
	name: "ecdc_testing",
	url: "https://opendata.ecdc.europa.eu/covid19/testing/json/",
	format: ECDC_RECORDS,
	schema: Schema{
		columns: &[
			ColumnSpec::date("dateRep", DateFormat::DayMonthYearSlash),
			ColumnSpec::new(NOTIFICATION_RATE, ColumnKind::Float(NumericPolicy::ZeroOnError)),
		],
		derived: &[],
	},
};

pub static VACCINES: DatasetSpec = DatasetSpec{
	name: "ecdc_vaccines",
	url: "https://opendata.ecdc.europa.eu/covid19/vaccine_tracker/json/",
	format: ECDC_RECORDS,
	schema: Schema{
		columns: &[
			ColumnSpec::date("YearWeekISO", DateFormat::IsoWeek),
			ColumnSpec::text("ReportingCountry"),
			ColumnSpec::text("Region"),
			ColumnSpec::text("TargetGroup"),
			ColumnSpec::integer("FirstDose").optional(),
			ColumnSpec::integer("SecondDose").optional(),
		],
		derived: &[],
	},
};


/// Datasets of the European Centre for Disease Prevention and Control.
#[derive(Debug, Default)]
pub struct Ecdc {
	loader: Loader,
	cases: OnceCell<Table>,
	testing: OnceCell<Table>,
	vaccines: OnceCell<Table>,
}

impl Ecdc {
	pub fn new(loader: Loader) -> Self {
		Self{
			loader,
			cases: OnceCell::new(),
			testing: OnceCell::new(),
			vaccines: OnceCell::new(),
		}
	}

	/// Daily cases and deaths per country.
	pub fn cases(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.cases, &CASES)
	}

	pub fn testing(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.testing, &TESTING)
	}

	/// Weekly doses per country; `YearWeekISO` holds the Monday of the week.
	pub fn vaccines(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.vaccines, &VACCINES)
	}

	/// Case rows of one country, by `geoId`.
	pub fn country(&self, geo_id: &str) -> Result<Table, Error> {
		self.cases()?.filter_eq("geoId", &Value::from(geo_id))
	}

	/// Per-country summary of cases and deaths, countries with the most cases
	/// in the last seven days first.
	pub fn overview(&self) -> Result<Vec<AggregateRecord>, Error> {
		overview(self.cases()?)
	}
}

pub fn overview(cases: &Table) -> Result<Vec<AggregateRecord>, Error> {
	let counts = [
		Statistic::Sum,
		Statistic::Last7DaysSum,
		Statistic::RollingAvg,
		Statistic::Latest,
		Statistic::Max,
	];
	Aggregation::new("dateRep", Grouping::Column("countriesAndTerritories".into()))
		.stat("cases", &counts)
		.stat("deaths", &counts)
		.stat("dateRep", &[Statistic::Min, Statistic::Max])
		.order(Order::Statistic{
			column: "cases".into(),
			statistic: Statistic::Last7DaysSum,
			descending: true,
		})
		.run(cases)
}
