pub mod batch_scanner;

pub use batch_scanner::{BatchScanner, ScanFilter, ScanReport, ScanRow, SkippedSymbol};
