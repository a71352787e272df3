use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use chrono::NaiveDate;

use covid_explore::{
	austria,
	ecdc,
	gestorbene,
	Aggregation,
	Austria,
	BlockingFetcher,
	Config,
	Ecdc,
	Error,
	Fetch,
	FetchError,
	Gestorbene,
	GroupKey,
	Grouping,
	Loader,
	Order,
	Source,
	Statistic,
	Value,
	Weekday,
};


/// Serves fixed bodies by URL and counts every fetch.
struct StubFetcher {
	bodies: HashMap<String, &'static str>,
	calls: Arc<AtomicUsize>,
}

impl StubFetcher {
	fn new(bodies: &[(&str, &'static str)]) -> (Self, Arc<AtomicUsize>) {
		let calls = Arc::new(AtomicUsize::new(0));
		let stub = Self{
			bodies: bodies.iter().map(|(url, body)| (url.to_string(), *body)).collect(),
			calls: calls.clone(),
		};
		(stub, calls)
	}
}

impl Fetch for StubFetcher {
	fn fetch(&self, source: &Source) -> Result<Bytes, FetchError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		match self.bodies.get(&source.to_string()) {
			Some(body) => Ok(Bytes::from_static(body.as_bytes())),
			None => Err(FetchError::Payload(format!("no fixture for {}", source))),
		}
	}
}

fn loader(bodies: &[(&str, &'static str)]) -> (Loader, Arc<AtomicUsize>) {
	let (stub, calls) = StubFetcher::new(bodies);
	(Loader::new(stub, Config::new()), calls)
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
	NaiveDate::from_ymd_opt(y, m, d).unwrap()
}


static TIMELINE: &str = "\
Time;Bezirk;GKZ;AnzEinwohner;AnzahlFaelle;AnzahlFaelleSum;AnzahlFaelle7Tage;SiebenTageInzidenzFaelle;AnzahlTotTaeglich;AnzahlTotSum;AnzahlGeheiltTaeglich;AnzahlGeheiltSum
01.03.2021 00:00:00;Wien;900;1911191;10;100;70;3,66;1;5;8;90
01.03.2021 00:00:00;Graz(Stadt);601;291072;3;30;21;7,21;0;1;2;25
02.03.2021 00:00:00;Wien;900;1911191;12;112;75;3,92;0;5;9;99
02.03.2021 00:00:00;Graz(Stadt);601;291072;4;34;22;7,56;0;1;3;28
";

static FALLZAHLEN: &str = "\
Meldedat;TestGesamt;MeldeDatum;FZHosp;FZICU;FZHospFree;FZICUFree;BundeslandID;Bundesland
01.03.2021;3000000;01.03.2021 00:00:00;1300;280;5000;500;10;Alle
01.03.2021;400000;01.03.2021 00:00:00;300;60;900;90;9;Wien
";

static AMPEL: &str = r#"[
	{"Stand": "2021-03-04T12:00:00Z", "Warnstufen": [
		{"Region": "Bundesland", "GKZ": "9", "Name": "Wien", "Warnstufe": "4"}
	]},
	{"Stand": "2021-03-11T12:00:00Z", "Warnstufen": [
		{"Region": "Bundesland", "GKZ": "9", "Name": "Wien", "Warnstufe": "3"},
		{"Region": "Bezirk", "GKZ": "601", "Name": "Graz(Stadt)", "Warnstufe": "2"}
	]}
]"#;

static DEATHS: &str = "\
C-KALWOCHE-0;C-B00-0;C-ALTERGR65-0;C-C11-0;F-ANZ-1
KALWOCHE-202001;B00-9;ALTERSGR65-1;C11-1;20
KALWOCHE-202001;B00-9;ALTERSGR65-2;C11-2;150
KALWOCHE-202101;B00-2;ALTERSGR65-2;C11-1;60
";

static DEATHS_UNKNOWN_STATE: &str = "\
C-KALWOCHE-0;C-B00-0;C-ALTERGR65-0;C-C11-0;F-ANZ-1
KALWOCHE-202001;B00-7;ALTERSGR65-1;C11-1;20
";

static KALWOCHE: &str = "\
code;name
KALWOCHE-202001;KW01 2020 (30.12.2019 bis 05.01.2020)
KALWOCHE-202101;KW01 2021 (04.01.2021 bis 10.01.2021)
";

static GESCHLECHT: &str = "\
code;name;en_name
C11-1;männlich;male
C11-2;weiblich;female
";

static BUNDESLAND: &str = "\
code;name
B00-2;Kärnten <AT21>
B00-9;Wien <AT13>
";

static ECDC_CASES: &str = r#"{"records": [
	{"dateRep": "03/12/2020", "day": "3", "month": "12", "year": "2020", "cases": 30, "deaths": 2, "countriesAndTerritories": "Austria", "geoId": "AT", "continentExp": "Europe"},
	{"dateRep": "03/12/2020", "day": "3", "month": "12", "year": "2020", "cases": 300, "deaths": 9, "countriesAndTerritories": "Germany", "geoId": "DE", "continentExp": "Europe"},
	{"dateRep": "02/12/2020", "day": "2", "month": "12", "year": "2020", "cases": 20, "deaths": 1, "countriesAndTerritories": "Austria", "geoId": "AT", "continentExp": "Europe"},
	{"dateRep": "02/12/2020", "day": "2", "month": "12", "year": "2020", "cases": 200, "deaths": 4, "countriesAndTerritories": "Germany", "geoId": "DE", "continentExp": "Europe"}
]}"#;


#[test]
fn test_dataset_is_fetched_once() {
	let (loader, calls) = loader(&[(austria::FAELLE_TIMELINE_GKZ.url, TIMELINE)]);
	let at = Austria::new(loader);
	assert_eq!(at.faelle_timeline_gkz().unwrap().len(), 4);
	assert_eq!(at.faelle_timeline_gkz().unwrap().len(), 4);
	at.district_timeline(Some("Wien")).unwrap();
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_load_is_not_cached() {
	let (loader, calls) = loader(&[]);
	let at = Austria::new(loader);
	match at.epicurve() {
		Err(Error::Fetch(FetchError::Payload(_))) => (),
		other => panic!("unexpected result: {:?}", other),
	}
	assert!(at.epicurve().is_err());
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_district_timeline() {
	let (loader, _) = loader(&[(austria::FAELLE_TIMELINE_GKZ.url, TIMELINE)]);
	let at = Austria::new(loader);

	let wien = at.district_timeline(Some("Wien")).unwrap();
	assert_eq!(wien.len(), 2);
	assert_eq!(wien.value(1, "SiebenTageInzidenzFaelle").unwrap(), Some(&Value::Float(3.92)));

	let total = at.district_timeline(None).unwrap();
	assert_eq!(total.len(), 2);
	assert!(total.column_index("Bezirk").is_err());
	assert_eq!(total.value(0, "AnzahlFaelle").unwrap(), Some(&Value::Integer(13)));
	assert_eq!(total.value(1, "AnzahlFaelle").unwrap(), Some(&Value::Integer(16)));
	assert_eq!(total.value(1, "AnzEinwohner").unwrap(), Some(&Value::Integer(2202263)));
	assert!(total.column_index("SiebenTageInzidenzFaelle").is_err());
	// 01.03.2021 was the Monday of ISO week 9
	assert_eq!(total.value(0, "weekday").unwrap(), Some(&Value::Integer(0)));
	assert_eq!(total.value(1, "weekday").unwrap(), Some(&Value::Integer(1)));
	assert_eq!(total.value(0, "iso_week").unwrap(), Some(&Value::Integer(9)));
	assert_eq!(total.value(1, "iso_week").unwrap(), Some(&Value::Integer(9)));
	assert_eq!(total.value(0, "iso_year").unwrap(), Some(&Value::Integer(2021)));
	assert_eq!(total.value(1, "iso_year").unwrap(), Some(&Value::Integer(2021)));
}

#[test]
fn test_state_counts() {
	let (loader, _) = loader(&[(austria::FALL_ZAEHLEN.url, FALLZAHLEN)]);
	let at = Austria::new(loader);
	let all = at.state_counts(austria::ALL_STATES).unwrap();
	assert_eq!(all.len(), 1);
	assert_eq!(all.value(0, "TestGesamt").unwrap(), Some(&Value::Integer(3000000)));
	// Meldedat is not declared and stays text
	assert_eq!(all.value(0, "Meldedat").unwrap(), Some(&Value::from("01.03.2021")));
	assert!(at.state_counts("Tirol").unwrap().is_empty());
}

#[test]
fn test_ampel_aktuell_flattens_latest_publication() {
	let (loader, calls) = loader(&[(austria::AMPEL.url, AMPEL)]);
	let at = Austria::new(loader);

	let aktuell = at.ampel_aktuell().unwrap();
	let columns: Vec<&str> = aktuell.columns().iter().map(|c| c.as_str()).collect();
	assert_eq!(columns, vec!["Region", "GKZ", "Name", "Warnstufe"]);
	assert_eq!(aktuell.len(), 2);
	assert_eq!(aktuell.value(0, "Warnstufe").unwrap(), Some(&Value::Integer(3)));
	assert_eq!(aktuell.value(1, "Name").unwrap(), Some(&Value::from("Graz(Stadt)")));

	at.ampel_aktuell().unwrap();
	assert_eq!(at.ampel().unwrap().len(), 2);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

fn gestorbene_fixtures(deaths: &'static str) -> (Gestorbene, Arc<AtomicUsize>) {
	let (loader, calls) = loader(&[
		(gestorbene::DEATHS.url, deaths),
		(gestorbene::KALWOCHE_CODES.url, KALWOCHE),
		(gestorbene::GESCHLECHT_CODES.url, GESCHLECHT),
		(gestorbene::BUNDESLAND_CODES.url, BUNDESLAND),
	]);
	(Gestorbene::new(loader), calls)
}

#[test]
fn test_gestorbene_resolves_codes() {
	let (g, calls) = gestorbene_fixtures(DEATHS);
	let df = g.df().unwrap();
	assert_eq!(df.len(), 3);
	assert_eq!(df.value(0, "week_begin").unwrap(), Some(&Value::Date(ymd(2019, 12, 30))));
	assert_eq!(df.value(0, "week_end").unwrap(), Some(&Value::Date(ymd(2020, 1, 5))));
	assert_eq!(df.value(1, "sex").unwrap(), Some(&Value::from("female")));
	assert_eq!(df.value(2, "bundesland").unwrap(), Some(&Value::from("Kärnten")));
	assert_eq!(df.value(0, "bundesland").unwrap(), Some(&Value::from("Wien")));

	assert_eq!(g.under_65().unwrap().len(), 1);
	assert_eq!(g.over_65().unwrap().len(), 2);
	g.df().unwrap();
	assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_gestorbene_weekly_deaths() {
	let (g, _) = gestorbene_fixtures(DEATHS);
	let weeks = g.weekly_deaths().unwrap();
	assert_eq!(weeks.len(), 2);
	assert_eq!(weeks[0].key, GroupKey::IsoWeek{year: 2020, week: 1});
	assert_eq!(weeks[0].get(gestorbene::ANZAHL, Statistic::Sum), Some(&Value::Integer(170)));
	assert_eq!(weeks[1].key, GroupKey::IsoWeek{year: 2021, week: 1});
	assert_eq!(weeks[1].get(gestorbene::ANZAHL, Statistic::Sum), Some(&Value::Integer(60)));
}

#[test]
fn test_gestorbene_unknown_code() {
	let (g, _) = gestorbene_fixtures(DEATHS_UNKNOWN_STATE);
	match g.df() {
		Err(Error::UnknownCode{table, code}) => {
			assert_eq!(table, "bundesland");
			assert_eq!(code, "B00-7");
		},
		other => panic!("unexpected result: {:?}", other),
	}
}

#[test]
fn test_ecdc_overview() {
	let (loader, _) = loader(&[(ecdc::CASES.url, ECDC_CASES)]);
	let eu = Ecdc::new(loader);
	let overview = eu.overview().unwrap();
	assert_eq!(overview.len(), 2);
	assert_eq!(overview[0].key, GroupKey::Text("Germany".into()));
	assert_eq!(overview[0].get("cases", Statistic::Latest), Some(&Value::Integer(300)));
	assert_eq!(overview[1].get("deaths", Statistic::Sum), Some(&Value::Integer(3)));
	assert_eq!(overview[1].get("dateRep", Statistic::Max), Some(&Value::Date(ymd(2020, 12, 3))));
	assert_eq!(eu.country("AT").unwrap().len(), 2);
}

#[test]
fn test_source_override_from_env_vars() {
	let mirror = "https://mirror.example/ecdc/cases.json";
	let (stub, calls) = StubFetcher::new(&[(mirror, ECDC_CASES)]);
	let config = Config::from_vars(vec![("COVID_SOURCE_ECDC_CASES".to_string(), mirror.to_string())]);
	let eu = Ecdc::new(Loader::new(stub, config));
	assert_eq!(eu.cases().unwrap().len(), 4);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_source_override_gzip_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("Epikurve.csv.gz");
	{
		let f = std::fs::File::create(&path).unwrap();
		let mut w = flate2::write::GzEncoder::new(f, flate2::Compression::default());
		w.write_all(concat!(
			"time;tägliche Erkrankungen;Bestätigte Fälle\n",
			"01.03.2021;5;100\n",
			"02.03.2021;7;107\n",
			"08.03.2021;2;109\n",
		).as_bytes()).unwrap();
		w.finish().unwrap();
	}
	let config = Config::new().with_source("epicurve", Source::File(path));
	let at = Austria::new(Loader::new(BlockingFetcher::new(), config));
	let epicurve = at.epicurve().unwrap();
	assert_eq!(epicurve.len(), 3);
	assert_eq!(epicurve.value(0, "time").unwrap(), Some(&Value::Date(ymd(2021, 3, 1))));
	assert_eq!(epicurve.value(0, "weekday").unwrap(), Some(&Value::Integer(0)));
	assert_eq!(epicurve.value(1, "tägliche Erkrankungen").unwrap(), Some(&Value::Integer(7)));
	assert_eq!(epicurve.value(2, "Bestätigte Fälle").unwrap(), Some(&Value::Integer(109)));

	let per_weekday = Aggregation::new("time", Grouping::Weekday("time".into()))
		.stat("tägliche Erkrankungen", &[Statistic::Sum])
		.order(Order::Key)
		.run(epicurve)
		.unwrap();
	assert_eq!(per_weekday.len(), 2);
	assert_eq!(per_weekday[0].key, GroupKey::Weekday(Weekday::Monday));
	assert_eq!(per_weekday[0].get("tägliche Erkrankungen", Statistic::Sum), Some(&Value::Integer(7)));
	assert_eq!(per_weekday[1].key, GroupKey::Weekday(Weekday::Tuesday));
	assert_eq!(per_weekday[1].get("tägliche Erkrankungen", Statistic::Sum), Some(&Value::Integer(7)));
}
