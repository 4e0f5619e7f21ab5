//! Dataset sources: load campaign audiences from CSV files or published
//! spreadsheets and normalize them into a [`campaign_core::Dataset`].

pub mod csv_source;
pub mod source;
pub mod spreadsheet;

pub use csv_source::CsvSource;
pub use source::DatasetSource;
pub use spreadsheet::SpreadsheetSource;
