mod aggregate;
mod config;
mod dataset;
mod error;
mod fetch;
mod normalize;
mod schema;
mod series;
mod table;

pub mod austria;
pub mod ecdc;
pub mod gestorbene;

pub use aggregate::*;
pub use config::*;
pub use dataset::*;
pub use error::*;
pub use fetch::*;
pub use normalize::*;
pub use schema::*;
pub use series::*;
pub use table::*;

pub use austria::Austria;
pub use ecdc::Ecdc;
pub use gestorbene::Gestorbene;
