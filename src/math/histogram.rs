use std::fs;
use std::path::Path;

use crate::model::{Element, NumericArray};

use super::{HistogramError, Result, write_workbook};

const HEADER: &str =
    "Bin range min (inclusive)\tBin range max (exclusive)\tPixel number\t\r\n";

/// Fixed-range histogram with uniform bins.
///
/// Integer histograms use an integral bin width of at least one so that every
/// representable value of the range falls into exactly one bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    bins: Vec<u64>,
    min_value: f64,
    max_value: f64,
    integer: bool,
    data_to_bin: f64,
    bin_width: f64,
}

impl Histogram {
    pub fn new(min_value: f64, max_value: f64, nb_bin: usize, integer: bool) -> Result<Self> {
        if nb_bin == 0 {
            return Err(HistogramError::InvalidParameters(
                "bin count must be positive".to_string(),
            ));
        }
        if !min_value.is_finite() || !max_value.is_finite() || max_value < min_value {
            return Err(HistogramError::InvalidParameters(format!(
                "invalid value range [{min_value}, {max_value}]"
            )));
        }

        let range = max_value - min_value;
        let (bin_width, bin_count) = if integer {
            let width = if nb_bin as f64 > range {
                1.0
            } else {
                ((range + 1.0) / nb_bin as f64).floor().max(1.0)
            };
            (width, ((range + 1.0) / width).ceil() as usize)
        } else {
            (range / nb_bin as f64, nb_bin)
        };
        let data_to_bin = if range > 0.0 {
            (bin_count - 1) as f64 / range
        } else {
            0.0
        };

        Ok(Self {
            bins: vec![0; bin_count],
            min_value,
            max_value,
            integer,
            data_to_bin,
            bin_width,
        })
    }

    pub fn reset(&mut self) {
        self.bins.fill(0);
    }

    fn bin_index(&self, value: f64) -> Option<usize> {
        let index = ((value - self.min_value) * self.data_to_bin).floor();
        if index.is_nan() || index < 0.0 || index >= self.bins.len() as f64 {
            None
        } else {
            Some(index as usize)
        }
    }

    /// Counts `value`; values outside the histogram range are dropped.
    pub fn add_value(&mut self, value: f64) {
        if let Some(index) = self.bin_index(value) {
            self.bins[index] += 1;
        }
    }

    /// Counts every sample. With `unsigned`, signed integer samples are read
    /// as their unsigned counterpart (`-1_i8` counts as 255).
    pub fn add_values<T: Element>(&mut self, values: &[T], unsigned: bool) {
        for value in values {
            let value = if unsigned {
                value.to_unsigned_f64()
            } else {
                value.to_f64()
            };
            self.add_value(value);
        }
    }

    pub fn add_array(&mut self, values: &NumericArray, unsigned: bool) {
        for value in values.to_f64_vec(unsigned) {
            self.add_value(value);
        }
    }

    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn is_integer_type(&self) -> bool {
        self.integer
    }

    pub fn bin_number(&self) -> usize {
        self.bins.len()
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn bin_size(&self, index: usize) -> u64 {
        self.bins.get(index).copied().unwrap_or(0)
    }

    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Tab separated table: one row per bin with its range and count.
    pub fn csv_formatted_data(&self) -> String {
        let mut out = String::from(HEADER);
        let mut start = self.min_value;
        for count in &self.bins {
            let end = start + self.bin_width;
            out.push_str(&format_number(start));
            out.push('\t');
            out.push_str(&format_number(end));
            out.push('\t');
            out.push_str(&count.to_string());
            out.push_str("\r\n");
            start = end;
        }
        out
    }

    /// Writes the table to `path`: a workbook when the extension starts with
    /// `xls`, tab separated text otherwise.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let table = self.csv_formatted_data();

        let result = if extension.starts_with("xls") {
            write_workbook(path, "Histogram", &table)
        } else {
            fs::write(path, format!("{table}\n")).map_err(HistogramError::from)
        };
        if let Err(error) = &result {
            log::error!(
                "error while exporting histogram to {}: {error}",
                path.display()
            );
        }
        result
    }
}

/// Decimal text of `value`, without a fractional part when it is integral.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
