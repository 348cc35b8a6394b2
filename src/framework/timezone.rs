//! Local wall-clock time to UTC conversion backed by the IANA database.

use std::collections::BTreeSet;

use chrono::DateTime;
use chrono::LocalResult;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::TimeZone;
use chrono::Utc;
use chrono_tz::Tz;

use crate::error::Error;

/// Converts `local` in `zone_id` to UTC.
///
/// An empty zone means the time is already UTC. Ambiguous times (clocks
/// turned back) resolve to the earlier instant; times skipped by a DST
/// transition are rejected.
pub fn to_utc(zone_id: &str, local: NaiveDateTime) -> Result<DateTime<Utc>, Error> {
    if zone_id.is_empty() {
        return Ok(Utc.from_utc_datetime(&local));
    }

    let tz: Tz = zone_id.parse().map_err(|_| Error::UnknownZone {
        zone: zone_id.to_string(),
    })?;

    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(Error::InvalidInput(format!(
            "{} does not exist in {}",
            local, zone_id
        ))),
    }
}

pub fn is_known_zone(zone_id: &str) -> bool {
    zone_id.parse::<Tz>().is_ok()
}

pub fn list_zone_ids() -> BTreeSet<&'static str> {
    chrono_tz::TZ_VARIANTS.iter().map(|tz| tz.name()).collect()
}

/// Parses a `yyyy-MM-dd` date and an `HH:mm` time.
pub fn parse_local(date: &str, time: &str) -> Result<NaiveDateTime, Error> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("Invalid date '{}', use yyyy-MM-dd", date)))?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|_| Error::InvalidInput(format!("Invalid time '{}', use HH:mm", time)))?;

    Ok(date.and_time(time))
}
