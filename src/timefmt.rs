use crate::error::AttendifyError;
use chrono::{NaiveTime, Timelike};
use std::fmt;
use std::str::FromStr;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Wall-clock time as minutes since midnight (0..=1439).
///
/// This is the only representation used for comparison and storage; both
/// "HH:MM" and "hh:mm AM/PM" inputs are normalized into it at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if hour >= 24 || minute >= 60 {
            return None;
        }
        Some(Self(hour * 60 + minute))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }
}

impl From<NaiveTime> for ClockTime {
    fn from(t: NaiveTime) -> Self {
        Self((t.hour() * 60 + t.minute()) as u16)
    }
}

/// Displays as 24-hour "HH:MM".
impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = AttendifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_clock(s)
    }
}

/// 24-hour "HH:MM" to "hh:mm AM/PM". Hour 0 is 12 AM, hour 12 is 12 PM.
pub fn to_12_hour(t: ClockTime) -> String {
    let (hour, suffix) = match t.hour() {
        0 => (12, "AM"),
        12 => (12, "PM"),
        h if h > 12 => (h - 12, "PM"),
        h => (h, "AM"),
    };
    format!("{:02}:{:02} {}", hour, t.minute(), suffix)
}

/// Inverse of [`to_12_hour`]. Accepts "hh:mm AM", "h:mm pm" and "hh:mmAM".
pub fn to_24_hour(time12: &str) -> Result<ClockTime, AttendifyError> {
    let mut upper = time12.trim().to_ascii_uppercase();
    if let Some(pos) = upper.find(['A', 'P']) {
        if pos > 0 && !upper[..pos].ends_with(' ') {
            upper.insert(pos, ' ');
        }
    }
    NaiveTime::parse_from_str(&upper, "%I:%M %p")
        .map(ClockTime::from)
        .map_err(|_| AttendifyError::InvalidTime {
            value: time12.to_string(),
        })
}

/// Parses either representation. A trailing AM/PM marker selects 12-hour
/// parsing; anything else must be 24-hour "HH:MM".
pub fn parse_clock(raw: &str) -> Result<ClockTime, AttendifyError> {
    let t = raw.trim();
    let upper = t.to_ascii_uppercase();
    if upper.ends_with("AM") || upper.ends_with("PM") {
        return to_24_hour(t);
    }
    NaiveTime::parse_from_str(t, "%H:%M")
        .map(ClockTime::from)
        .map_err(|_| AttendifyError::InvalidTime {
            value: raw.to_string(),
        })
}

/// How times are rendered back to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayFormat {
    #[default]
    TwelveHour,
    TwentyFourHour,
}

impl DisplayFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "12h" => Some(Self::TwelveHour),
            "24h" => Some(Self::TwentyFourHour),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TwelveHour => "12h",
            Self::TwentyFourHour => "24h",
        }
    }

    pub fn render(self, t: ClockTime) -> String {
        match self {
            Self::TwelveHour => to_12_hour(t),
            Self::TwentyFourHour => t.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u16, m: u16) -> ClockTime {
        ClockTime::from_hm(h, m).expect("valid time")
    }

    #[test]
    fn to_12_hour_boundaries() {
        assert_eq!(to_12_hour(hm(0, 0)), "12:00 AM");
        assert_eq!(to_12_hour(hm(0, 5)), "12:05 AM");
        assert_eq!(to_12_hour(hm(9, 0)), "09:00 AM");
        assert_eq!(to_12_hour(hm(11, 59)), "11:59 AM");
        assert_eq!(to_12_hour(hm(12, 0)), "12:00 PM");
        assert_eq!(to_12_hour(hm(13, 30)), "01:30 PM");
        assert_eq!(to_12_hour(hm(23, 45)), "11:45 PM");
    }

    #[test]
    fn round_trip_every_minute_of_day() {
        for m in 0..MINUTES_PER_DAY {
            let t = ClockTime::from_minutes(m).expect("in range");
            let back = to_24_hour(&to_12_hour(t)).expect("parse back");
            assert_eq!(back, t, "minute {m}");
        }
    }

    #[test]
    fn parse_clock_accepts_both_forms() {
        assert_eq!(parse_clock("09:30").unwrap(), hm(9, 30));
        assert_eq!(parse_clock("9:30").unwrap(), hm(9, 30));
        assert_eq!(parse_clock("09:30 AM").unwrap(), hm(9, 30));
        assert_eq!(parse_clock("01:00 pm").unwrap(), hm(13, 0));
        assert_eq!(parse_clock("12:15AM").unwrap(), hm(0, 15));
        assert_eq!(parse_clock(" 23:59 ").unwrap(), hm(23, 59));
    }

    #[test]
    fn parse_clock_rejects_garbage() {
        for bad in ["", "24:00", "10:60", "13:00 PM", "00:30 AM", "noon", "10"] {
            let e = parse_clock(bad).unwrap_err();
            assert_eq!(e.code(), "invalid_time", "{bad:?}");
        }
    }

    #[test]
    fn display_is_24_hour() {
        assert_eq!(hm(7, 5).to_string(), "07:05");
        assert_eq!("14:10".parse::<ClockTime>().unwrap().to_string(), "14:10");
        assert_eq!(DisplayFormat::TwentyFourHour.render(hm(13, 0)), "13:00");
        assert_eq!(DisplayFormat::default().render(hm(13, 0)), "01:00 PM");
        assert_eq!(DisplayFormat::parse("24h"), Some(DisplayFormat::TwentyFourHour));
        assert_eq!(DisplayFormat::parse("military"), None);
    }
}
