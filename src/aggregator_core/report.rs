//! CSV rendering of per-location bucket means
//!
//! Layout:
//!
//! ```text
//! Date,<location-1>,<location-2>,...
//! <bucket label>,<mean or empty>,<mean or empty>,...
//! ```
//!
//! Every row has exactly `1 + locations.len()` fields and no trailing
//! delimiter. A cell without data is empty, never `0`. Location ids containing
//! a delimiter, quote or line break are quoted RFC 4180 style so columns never
//! shift.

use crate::pipeline::allowlist::Location;
use rust_decimal::Decimal;

pub const DATE_COLUMN: &str = "Date";
const DELIMITER: char = ',';

/// Render the report
///
/// `bucket_labels` must already be the union of labels across all locations,
/// sorted ascending. `lookup` returns `None` for (location, label) pairs
/// without readings.
pub fn render<F>(locations: &[Location], bucket_labels: &[String], lookup: F) -> String
where
    F: Fn(&str, &str) -> Option<Decimal>,
{
    let mut out = String::new();

    out.push_str(DATE_COLUMN);
    for location in locations {
        out.push(DELIMITER);
        push_field(&mut out, &location.id);
    }
    out.push('\n');

    for label in bucket_labels {
        push_field(&mut out, label);
        for location in locations {
            out.push(DELIMITER);
            if let Some(mean) = lookup(&location.id, label) {
                out.push_str(&mean.to_string());
            }
        }
        out.push('\n');
    }

    out
}

fn push_field(out: &mut String, field: &str) {
    if !field.contains([DELIMITER, '"', '\n', '\r']) {
        out.push_str(field);
        return;
    }
    out.push('"');
    out.push_str(&field.replace('"', "\"\""));
    out.push('"');
}
