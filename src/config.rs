use std::collections::HashMap;
use std::env;

use log::debug;

use smartstring::alias::{String as SmartString};

use super::fetch::Source;


static SOURCE_PREFIX: &str = "COVID_SOURCE_";


/// Per-dataset source overrides.
///
/// A dataset named `faelle_timeline_gkz` is overridden by
/// `COVID_SOURCE_FAELLE_TIMELINE_GKZ`. Values starting with `http://` or
/// `https://` are fetched, anything else is read from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
	sources: HashMap<SmartString, Source>,
}

impl Config {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_env() -> Self {
		Self::from_vars(env::vars())
	}

	pub fn from_vars<I: IntoIterator<Item = (String, String)>>(vars: I) -> Self {
		let mut result = Self::new();
		for (k, v) in vars {
			let dataset = match k.strip_prefix(SOURCE_PREFIX) {
				Some(name) if !name.is_empty() => name.to_ascii_lowercase(),
				_ => continue,
			};
			if v.is_empty() {
				continue
			}
			debug!("source of {} overridden by {}: {}", dataset, k, v);
			result.sources.insert(dataset.into(), Source::parse(&v));
		}
		result
	}

	pub fn with_source<S: Into<SmartString>>(mut self, dataset: S, source: Source) -> Self {
		self.sources.insert(dataset.into(), source);
		self
	}

	/// The configured source of `dataset`, if any.
	#[inline(always)]
	pub fn source_for(&self, dataset: &str) -> Option<&Source> {
		self.sources.get(dataset)
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn test_from_vars() {
		let config = Config::from_vars(vars(&[
			("COVID_SOURCE_FAELLE_TIMELINE_GKZ", "/data/timeline.csv.gz"),
			("COVID_SOURCE_ECDC_CASES", "https://mirror.example/cases.json"),
			("COVID_SOURCE_AMPEL", ""),
			("COVID_SOURCE_", "/nowhere"),
			("PATH", "/usr/bin"),
		]));
		assert_eq!(config.source_for("faelle_timeline_gkz"), Some(&Source::File("/data/timeline.csv.gz".into())));
		assert_eq!(config.source_for("ecdc_cases"), Some(&Source::Url("https://mirror.example/cases.json".into())));
		assert_eq!(config.source_for("ampel"), None);
		assert_eq!(config.source_for(""), None);
	}

	#[test]
	fn test_with_source_overrides() {
		let config = Config::from_vars(vars(&[("COVID_SOURCE_EPICURVE", "/a.csv")]))
			.with_source("epicurve", Source::File("/b.csv".into()));
		assert_eq!(config.source_for("epicurve"), Some(&Source::File("/b.csv".into())));
	}
}
