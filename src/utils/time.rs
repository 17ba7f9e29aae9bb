use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, SecondsFormat, Utc,
};
use std::fmt;

/// Offset of the agenda's home timezone (Taiwan, UTC+8)
pub const LOCAL_OFFSET_HOURS: i32 = 8;

/// Fixed UTC+8 offset used for both query windows and displayed times
pub fn local_offset() -> FixedOffset {
    FixedOffset::east_opt(LOCAL_OFFSET_HOURS * 3600).unwrap_or_else(|| Utc.fix())
}

/// Which day the digest is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestMode {
    Today,
    NextMonday,
    /// No flag given: tomorrow
    #[default]
    Tomorrow,
}

impl DigestMode {
    /// Resolve the mode from the invocation flags; `--today` wins over `--monday`
    pub fn from_flags(today: bool, monday: bool) -> Self {
        if today {
            DigestMode::Today
        } else if monday {
            DigestMode::NextMonday
        } else {
            DigestMode::Tomorrow
        }
    }
}

/// Display label of the digest, also used in the "no events" line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgendaLabel {
    Today,
    Tomorrow,
    NextMonday,
}

impl AgendaLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgendaLabel::Today => "今日行程",
            AgendaLabel::Tomorrow => "明日行程",
            AgendaLabel::NextMonday => "下週一行程",
        }
    }
}

impl fmt::Display for AgendaLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The calendar day a digest covers and how it is announced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDate {
    pub date: NaiveDate,
    pub label: AgendaLabel,
}

/// Local (UTC+8) calendar date of an instant
pub fn local_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&local_offset()).date_naive()
}

/// Pick the digest's target date from the current instant
pub fn select_target(now: DateTime<Utc>, mode: DigestMode) -> TargetDate {
    let today = local_date(now);

    match mode {
        DigestMode::Today => TargetDate {
            date: today,
            label: AgendaLabel::Today,
        },
        DigestMode::NextMonday => {
            // Monday = 0 ... Sunday = 6; a Monday jumps a full week ahead
            let weekday = today.weekday().num_days_from_monday() as i64;
            let mut days_until_monday = (7 - weekday) % 7;
            if days_until_monday == 0 {
                days_until_monday = 7;
            }
            TargetDate {
                date: today + Duration::days(days_until_monday),
                label: AgendaLabel::NextMonday,
            }
        }
        DigestMode::Tomorrow => TargetDate {
            date: today + Duration::days(1),
            label: AgendaLabel::Tomorrow,
        },
    }
}

/// Half-open UTC interval covering one local day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// `[local midnight, local midnight + 24h)` expressed in UTC
    pub fn for_date(date: NaiveDate) -> Self {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let start = DateTime::<Utc>::from_naive_utc_and_offset(
            local_midnight - Duration::hours(LOCAL_OFFSET_HOURS as i64),
            Utc,
        );
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// Window start in the calendar API's RFC 3339 format
    pub fn time_min(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Window end in the calendar API's RFC 3339 format
    pub fn time_max(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Weekday glyph, Monday..Sunday
pub fn weekday_glyph(date: NaiveDate) -> &'static str {
    const GLYPHS: [&str; 7] = ["一", "二", "三", "四", "五", "六", "日"];
    GLYPHS[date.weekday().num_days_from_monday() as usize]
}

/// Convert a provider timestamp to a local (UTC+8) time of day
pub fn local_time_of_day(timestamp: &str) -> Result<NaiveTime, chrono::ParseError> {
    let parsed = DateTime::parse_from_rfc3339(timestamp)?;
    Ok(parsed.with_timezone(&local_offset()).time())
}
