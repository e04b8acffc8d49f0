mod error;
mod histogram;
mod spreadsheet;

pub use error::{HistogramError, Result};
pub use histogram::{Histogram, format_number};
pub use spreadsheet::write_workbook;
