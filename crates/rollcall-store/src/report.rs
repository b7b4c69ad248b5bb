//! Plain-text attendance report.
//!
//! Records group by local calendar date in first-seen order; within a
//! group they stay in append order (the log is append-only, so append
//! order tracks time without an explicit sort).

use chrono::{DateTime, Local};
use rollcall_core::AttendanceRecord;

const REPORT_HEADER: &str = "=== ATTENDANCE RECORDS ===";
const EMPTY_SENTINEL: &str = "No attendance records found.";
const SEPARATOR_WIDTH: usize = 50;

/// Render the full log as a human-readable report.
pub fn render_report(records: &[AttendanceRecord]) -> String {
    let mut text = format!("{REPORT_HEADER}\n\n");

    if records.is_empty() {
        text.push_str(EMPTY_SENTINEL);
        text.push('\n');
        return text;
    }

    let mut groups: Vec<(String, Vec<&AttendanceRecord>)> = Vec::new();
    for record in records {
        let date = local_date(&record.timestamp);
        match groups.iter_mut().find(|(d, _)| *d == date) {
            Some((_, members)) => members.push(record),
            None => groups.push((date, vec![record])),
        }
    }

    for (date, members) in &groups {
        text.push_str(&format!("Date: {date}\n"));
        text.push_str(&"-".repeat(SEPARATOR_WIDTH));
        text.push('\n');
        for record in members {
            text.push_str(&format!("{} - {}\n", local_time(&record.timestamp), record.name));
        }
        text.push('\n');
    }

    text
}

/// Local calendar date of a stored timestamp; an unparseable timestamp
/// falls back to the raw string so the record still appears.
fn local_date(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Local).format("%-m/%-d/%Y").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

fn local_time(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Local).format("%-I:%M:%S %p").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(name: &str, timestamp: String) -> AttendanceRecord {
        AttendanceRecord {
            id: name.to_string(),
            name: name.to_string(),
            timestamp,
        }
    }

    /// A local-timezone timestamp, so its rendered date is stable
    /// regardless of where the test runs.
    fn local_ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> String {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
            .to_rfc3339()
    }

    #[test]
    fn test_empty_report_exact() {
        assert_eq!(
            render_report(&[]),
            "=== ATTENDANCE RECORDS ===\n\nNo attendance records found.\n"
        );
    }

    #[test]
    fn test_same_date_single_block_in_append_order() {
        let records = vec![
            record("ada", local_ts(2024, 3, 1, 9, 0, 0)),
            record("grace", local_ts(2024, 3, 1, 10, 30, 0)),
        ];
        let text = render_report(&records);

        assert!(text.starts_with("=== ATTENDANCE RECORDS ===\n\n"));
        assert_eq!(text.matches("Date: ").count(), 1);
        assert_eq!(text.matches(&"-".repeat(50)).count(), 1);

        let ada = text.find("- ada").unwrap();
        let grace = text.find("- grace").unwrap();
        assert!(ada < grace, "records must keep append order");
    }

    #[test]
    fn test_two_dates_two_blocks_first_seen_order() {
        let records = vec![
            record("ada", local_ts(2024, 3, 2, 9, 0, 0)),
            record("grace", local_ts(2024, 3, 1, 9, 0, 0)),
            record("edsger", local_ts(2024, 3, 2, 11, 0, 0)),
        ];
        let text = render_report(&records);

        assert_eq!(text.matches("Date: ").count(), 2);
        // March 2 was seen first, so its block comes first even though
        // March 1 is earlier.
        let day2 = text.find("Date: 3/2/2024").unwrap();
        let day1 = text.find("Date: 3/1/2024").unwrap();
        assert!(day2 < day1);

        // edsger groups with ada under March 2.
        let ada = text.find("- ada").unwrap();
        let edsger = text.find("- edsger").unwrap();
        let grace = text.find("- grace").unwrap();
        assert!(ada < edsger && edsger < grace);
    }

    #[test]
    fn test_block_layout() {
        let text = render_report(&[record("ada", local_ts(2024, 3, 1, 14, 5, 9))]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=== ATTENDANCE RECORDS ===");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "Date: 3/1/2024");
        assert_eq!(lines[3], "-".repeat(50));
        assert_eq!(lines[4], "2:05:09 PM - ada");
        assert!(text.ends_with("\n\n"), "blank line closes each date block");
    }

    #[test]
    fn test_unparseable_timestamp_falls_back_to_raw() {
        let text = render_report(&[record("ada", "not-a-timestamp".into())]);
        assert!(text.contains("Date: not-a-timestamp"));
        assert!(text.contains("not-a-timestamp - ada"));
    }
}
