use super::normalize::DateFormat;


/// What to do with a numeric cell that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericPolicy {
	/// Fail the load with a `NumericParse` error.
	Strict,
	/// Replace malformed, null or empty cells with zero.
	ZeroOnError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
	Date(DateFormat),
	DateTime(DateFormat),
	Integer(NumericPolicy),
	Float(NumericPolicy),
	Text,
	Nested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
	pub name: &'static str,
	pub kind: ColumnKind,
	pub optional: bool,
}

impl ColumnSpec {
	pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
		Self{name, kind, optional: false}
	}

	pub const fn date(name: &'static str, format: DateFormat) -> Self {
		Self::new(name, ColumnKind::Date(format))
	}

	pub const fn datetime(name: &'static str, format: DateFormat) -> Self {
		Self::new(name, ColumnKind::DateTime(format))
	}

	pub const fn integer(name: &'static str) -> Self {
		Self::new(name, ColumnKind::Integer(NumericPolicy::Strict))
	}

	pub const fn float(name: &'static str) -> Self {
		Self::new(name, ColumnKind::Float(NumericPolicy::Strict))
	}

	pub const fn text(name: &'static str) -> Self {
		Self::new(name, ColumnKind::Text)
	}

	/// Null or empty cells become `Value::Null` instead of failing the load.
	pub const fn optional(self) -> Self {
		Self{name: self.name, kind: self.kind, optional: true}
	}
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedKind {
	/// Monday = 0 .. Sunday = 6
	WeekdayIndex,
	WeekdayName,
	IsoWeek,
	IsoYear,
	Month,
	Year,
}

/// A column computed from a date column and appended after the source columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
	pub name: &'static str,
	pub from: &'static str,
	pub kind: DerivedKind,
}

impl Derived {
	pub const fn new(name: &'static str, from: &'static str, kind: DerivedKind) -> Self {
		Self{name, from, kind}
	}
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
	pub columns: &'static [ColumnSpec],
	pub derived: &'static [Derived],
}
