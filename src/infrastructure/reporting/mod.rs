pub mod csv_export;

pub use csv_export::{report_headers, write_report, write_report_to};
