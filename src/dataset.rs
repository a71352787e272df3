use std::fmt;

use log::info;

use once_cell::sync::OnceCell;

use super::config::Config;
use super::error::Error;
use super::fetch::{decode, BlockingFetcher, Fetch, Format, RawTable, Source};
use super::normalize::normalize;
use super::schema::Schema;
use super::table::Table;


/// Where a dataset lives, how it is encoded and how its columns are typed.
#[derive(Debug, Clone, Copy)]
pub struct DatasetSpec {
	/// Unique key, also used for source overrides.
	pub name: &'static str,
	pub url: &'static str,
	pub format: Format,
	pub schema: Schema,
}


/// Fetches, decodes and normalizes datasets.
pub struct Loader {
	fetcher: Box<dyn Fetch + Send + Sync>,
	config: Config,
}

impl Loader {
	pub fn new<F: Fetch + Send + Sync + 'static>(fetcher: F, config: Config) -> Self {
		Self{
			fetcher: Box::new(fetcher),
			config,
		}
	}

	#[inline(always)]
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// The configured override for the dataset, or its default URL.
	pub fn source(&self, spec: &DatasetSpec) -> Source {
		match self.config.source_for(spec.name) {
			Some(source) => source.clone(),
			None => Source::Url(spec.url.into()),
		}
	}

	pub fn load_raw(&self, spec: &DatasetSpec) -> Result<RawTable, Error> {
		let source = self.source(spec);
		let body = self.fetcher.fetch(&source)?;
		Ok(decode(&body[..], &spec.format)?)
	}

	pub fn load(&self, spec: &DatasetSpec) -> Result<Table, Error> {
		let raw = self.load_raw(spec)?;
		let table = normalize(&raw, &spec.schema)?;
		info!("loaded {}: {} rows, {} columns", spec.name, table.len(), table.columns().len());
		Ok(table)
	}

	/// Loads the dataset into `cell` unless it is already there.
	///
	/// A failed load leaves the cell empty.
	pub fn cached<'c>(&self, cell: &'c OnceCell<Table>, spec: &DatasetSpec) -> Result<&'c Table, Error> {
		cell.get_or_try_init(|| self.load(spec))
	}
}

impl Default for Loader {
	fn default() -> Self {
		Self::new(BlockingFetcher::new(), Config::from_env())
	}
}

impl fmt::Debug for Loader {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Loader").field("config", &self.config).finish()
	}
}
