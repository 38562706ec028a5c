pub mod config;
pub mod db;
pub mod exporters;
pub mod filler;
pub mod gaps;
pub mod importers;
pub mod series;
pub mod services;
pub mod units;
pub mod validation;
