use anyhow::anyhow;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

// Deadlines are entered as local wall-clock time, the same shape a
// datetime-local input produces. A bare date means local midnight.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

pub fn parse_deadline(input: &str) -> anyhow::Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("deadline cannot be empty"));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return local_to_utc(naive);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("failed to construct midnight for {trimmed}"))?;
        return local_to_utc(naive);
    }

    Err(anyhow!(
        "unrecognized deadline: {trimmed} (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM)"
    ))
}

fn local_to_utc(naive: NaiveDateTime) -> anyhow::Result<DateTime<Utc>> {
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow!("local time {naive} does not exist in this timezone"))?;
    Ok(local.with_timezone(&Utc))
}

pub fn format_deadline(deadline: DateTime<Utc>) -> String {
    deadline
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
