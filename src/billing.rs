//! Billing-tag statistics: date range validation and CSV export naming.

use chrono::NaiveDate;

use crate::errors::ConsoleError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive day range accepted by the statistics endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Validate two `YYYY-MM-DD` strings before any request goes out.
    pub fn parse(start: &str, end: &str) -> Result<Self, ConsoleError> {
        let start = parse_day(start)?;
        let end = parse_day(end)?;
        if start > end {
            return Err(ConsoleError::InvalidRange {
                start: start.format(DATE_FORMAT).to_string(),
                end: end.format(DATE_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn query(&self) -> [(&'static str, String); 2] {
        [
            ("start_time", self.start.format(DATE_FORMAT).to_string()),
            ("end_time", self.end.format(DATE_FORMAT).to_string()),
        ]
    }

    /// File name the server suggests for the CSV download.
    pub fn export_file_name(&self) -> String {
        format!(
            "billing_tag_stats_{}_{}.csv",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

fn parse_day(raw: &str) -> Result<NaiveDate, ConsoleError> {
    let trimmed = raw.trim();
    // chrono accepts unpadded fields; the server does not.
    if trimmed.len() != 10 {
        return Err(ConsoleError::InvalidDate {
            value: raw.to_string(),
        });
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| ConsoleError::InvalidDate {
        value: raw.to_string(),
    })
}

/// Strip the UTF-8 byte order mark the export endpoint prepends.
pub fn strip_bom(csv: &[u8]) -> &[u8] {
    csv.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(csv)
}
