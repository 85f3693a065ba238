//! History CSV export.

use crate::history::History;

/// CSV header row.
pub const HISTORY_CSV_HEADER: &str = "Date,Hospital,Patient Name,MRN,Codes";

/// Export history as CSV, one row per patient per report, newest first.
///
/// Patient name and codes are always quoted; other fields only when needed.
pub fn history_to_csv(history: &History) -> String {
    let mut csv = String::new();

    // Header
    csv.push_str(HISTORY_CSV_HEADER);

    for row in history.export_rows() {
        csv.push('\n');
        csv.push_str(&format!(
            "{},{},{},{},{}",
            escape_csv(&row.date),
            escape_csv(&row.location_name),
            quote_csv(&row.patient_name),
            escape_csv(&row.mrn),
            quote_csv(&row.codes),
        ));
    }

    csv
}

/// File name for a history export made on `date`.
pub fn history_csv_filename(date: chrono::NaiveDate) -> String {
    format!("charge-capture-history-{date}.csv")
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        quote_csv(s)
    } else {
        s.to_string()
    }
}

/// Always quote, doubling inner quotes.
fn quote_csv(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
