use once_cell::sync::OnceCell;

use super::dataset::{DatasetSpec, Loader};
use super::error::Error;
use super::fetch::{Encoding, Format, RawTable};
use super::normalize::{append_derived, normalize, DateFormat};
use super::schema::{ColumnKind, ColumnSpec, Derived, DerivedKind, Schema};
use super::table::{Table, Value};


const AGES_CSV: Format = Format::Csv{delimiter: b';', encoding: Encoding::Utf8};

/// Label used by the AGES state tables for the national total.
pub static ALL_STATES: &str = "Alle";

pub static EPICURVE: DatasetSpec = DatasetSpec{
	name: "epicurve",
	url: "https://info.gesundheitsministerium.at/data/Epikurve.csv",
	format: AGES_CSV,
	schema: Schema{
		columns: &[
			ColumnSpec::date("time", DateFormat::DayMonthYear),
			ColumnSpec::integer("tägliche Erkrankungen"),
			ColumnSpec::integer("Bestätigte Fälle"),
		],
		derived: &[
			Derived::new("weekday", "time", DerivedKind::WeekdayIndex),
		],
	},
};

pub static FALL_ZAEHLEN: DatasetSpec = DatasetSpec{
	name: "fall_zaehlen",
	url: "https://covid19-dashboard.ages.at/data/CovidFallzahlen.csv",
	format: AGES_CSV,
	schema: Schema{
		columns: &[
			ColumnSpec::integer("TestGesamt"),
			ColumnSpec::datetime("MeldeDatum", DateFormat::DayMonthYearTime),
			ColumnSpec::integer("FZHosp"),
			ColumnSpec::integer("FZICU"),
			ColumnSpec::integer("FZHospFree"),
			ColumnSpec::integer("FZICUFree"),
			ColumnSpec::integer("BundeslandID"),
			ColumnSpec::text("Bundesland"),
		],
		derived: &[],
	},
};

pub static FAELLE_TIMELINE_GKZ: DatasetSpec = DatasetSpec{
	name: "faelle_timeline_gkz",
	url: "https://covid19-dashboard.ages.at/data/CovidFaelle_Timeline_GKZ.csv",
	format: AGES_CSV,
	schema: Schema{
		columns: &[
			ColumnSpec::datetime("Time", DateFormat::DayMonthYearTime),
			ColumnSpec::text("Bezirk"),
			ColumnSpec::integer("GKZ"),
			ColumnSpec::integer("AnzEinwohner"),
			ColumnSpec::integer("AnzahlFaelle"),
			ColumnSpec::integer("AnzahlFaelleSum"),
			ColumnSpec::integer("AnzahlFaelle7Tage"),
			ColumnSpec::float("SiebenTageInzidenzFaelle"),
			ColumnSpec::integer("AnzahlTotTaeglich"),
			ColumnSpec::integer("AnzahlTotSum"),
			ColumnSpec::integer("AnzahlGeheiltTaeglich"),
			ColumnSpec::integer("AnzahlGeheiltSum"),
		],
		derived: &[
			Derived::new("weekday", "Time", DerivedKind::WeekdayIndex),
			Derived::new("iso_week", "Time", DerivedKind::IsoWeek),
			Derived::new("iso_year", "Time", DerivedKind::IsoYear),
		],
	},
};

pub static AMPEL: DatasetSpec = DatasetSpec{
	name: "ampel",
	url: "https://corona-ampel.gv.at/sites/corona-ampel.gv.at/files/assets/Warnstufen_Corona_Ampel_aktuell.json",
	format: Format::Json{records: None},
	schema: Schema{
		columns: &[
			ColumnSpec::datetime("Stand", DateFormat::IsoUtc),
			ColumnSpec::new("Warnstufen", ColumnKind::Nested),
		],
		derived: &[],
	},
};

/// Timeline counts that add up across districts.
const TIMELINE_COUNTS: &[&str] = &[
	"AnzEinwohner",
	"AnzahlFaelle",
	"AnzahlFaelleSum",
	"AnzahlFaelle7Tage",
	"AnzahlTotTaeglich",
	"AnzahlTotSum",
	"AnzahlGeheiltTaeglich",
	"AnzahlGeheiltSum",
];

static AMPEL_AKTUELL: Schema = Schema{
	columns: &[
		ColumnSpec::text("Region"),
		ColumnSpec::text("GKZ").optional(),
		ColumnSpec::text("Name").optional(),
		ColumnSpec::integer("Warnstufe"),
	],
	derived: &[],
};

pub static ALTERSGRUPPE: DatasetSpec = DatasetSpec{
	name: "altersgruppe",
	url: "https://covid19-dashboard.ages.at/data/CovidFaelle_Altersgruppe.csv",
	format: AGES_CSV,
	schema: Schema{
		columns: &[
			ColumnSpec::integer("AltersgruppeID"),
			ColumnSpec::text("Altersgruppe"),
			ColumnSpec::text("Bundesland"),
			ColumnSpec::integer("BundeslandID"),
			ColumnSpec::integer("AnzEinwohner"),
			ColumnSpec::text("Geschlecht"),
			ColumnSpec::integer("Anzahl"),
			ColumnSpec::integer("AnzahlGeheilt"),
			ColumnSpec::integer("AnzahlTot"),
		],
		derived: &[],
	},
};


/// Datasets of the Austrian health ministry (AGES) and the traffic light
/// commission.
#[derive(Debug, Default)]
pub struct Austria {
	loader: Loader,
	epicurve: OnceCell<Table>,
	fall_zaehlen: OnceCell<Table>,
	faelle_timeline_gkz: OnceCell<Table>,
	ampel: OnceCell<Table>,
	ampel_aktuell: OnceCell<Table>,
	altersgruppe: OnceCell<Table>,
}

impl Austria {
	pub fn new(loader: Loader) -> Self {
		Self{
			loader,
			epicurve: OnceCell::new(),
			fall_zaehlen: OnceCell::new(),
			faelle_timeline_gkz: OnceCell::new(),
			ampel: OnceCell::new(),
			ampel_aktuell: OnceCell::new(),
			altersgruppe: OnceCell::new(),
		}
	}

	pub fn epicurve(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.epicurve, &EPICURVE)
	}

	/// Tests, hospital and ICU occupancy per state and day.
	pub fn fall_zaehlen(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.fall_zaehlen, &FALL_ZAEHLEN)
	}

	/// Daily cases per district.
	pub fn faelle_timeline_gkz(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.faelle_timeline_gkz, &FAELLE_TIMELINE_GKZ)
	}

	pub fn ampel(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.ampel, &AMPEL)
	}

	/// Warning levels of the most recent traffic light publication, one row
	/// per region.
	pub fn ampel_aktuell(&self) -> Result<&Table, Error> {
		self.ampel_aktuell.get_or_try_init(|| {
			let latest = self.ampel()?.sorted_by("Stand", true)?;
			let items = match latest.value(0, "Warnstufen")? {
				Some(Value::Nested(serde_json::Value::Array(items))) => items,
				Some(other) => return Err(Error::ColumnType{
					column: "Warnstufen".into(),
					expected: "array",
					found: other.type_name(),
				}),
				None => return Err(Error::EmptyTable(AMPEL.name)),
			};
			let raw = RawTable::from_json_records(&items[..])?;
			normalize(&raw, &AMPEL_AKTUELL)
		})
	}

	pub fn altersgruppe(&self) -> Result<&Table, Error> {
		self.loader.cached(&self.altersgruppe, &ALTERSGRUPPE)
	}

	/// The timeline of one district, or with `None` of all of Austria.
	///
	/// The national timeline sums the counts per day and derives weekday and
	/// ISO week from the day again. Columns that do not add up, like the
	/// incidence, are left out.
	pub fn district_timeline(&self, bezirk: Option<&str>) -> Result<Table, Error> {
		let timeline = self.faelle_timeline_gkz()?;
		match bezirk {
			Some(bezirk) => timeline.filter_eq("Bezirk", &Value::from(bezirk)),
			None => {
				let summed = timeline.sum_by("Time", TIMELINE_COUNTS)?;
				append_derived(&summed, FAELLE_TIMELINE_GKZ.schema.derived)
			},
		}
	}

	/// Fallzahlen rows of one state; [`ALL_STATES`] selects the national
	/// total.
	pub fn state_counts(&self, bundesland: &str) -> Result<Table, Error> {
		self.fall_zaehlen()?.filter_eq("Bundesland", &Value::from(bundesland))
	}
}
