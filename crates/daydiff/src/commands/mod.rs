pub mod analyze;
pub mod prefilter;
pub mod reports;
