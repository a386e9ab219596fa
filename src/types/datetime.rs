use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::core::{DateTimeShape, TypeShape, XmlDateTime, XmlType};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d.%m.%Y", "%Y%m%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

fn valid_format(format: &str) -> bool {
    !format.is_empty() && StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

/// Formats through `Display` into a buffer, so a format the value cannot honor is an error.
fn write_formatted(display: impl std::fmt::Display) -> Option<String> {
    let mut text = String::new();
    write!(text, "{}", display).ok()?;
    Some(text)
}

impl XmlDateTime for NaiveDate {
    const GENERAL_FORMAT: &'static str = "%Y-%m-%d";

    fn is_valid_format(format: &str) -> bool {
        valid_format(format)
    }

    fn format_with(&self, format: &str) -> Option<String> {
        write_formatted(self.format(format))
    }

    fn parse_exact(text: &str, format: &str) -> Option<Self> {
        NaiveDate::parse_from_str(text, format).ok()
    }

    fn parse_lenient(text: &str) -> Option<Self> {
        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
            .or_else(|| NaiveDateTime::parse_lenient(text).map(|value| value.date()))
    }
}

impl XmlDateTime for NaiveTime {
    const GENERAL_FORMAT: &'static str = "%H:%M:%S%.f";

    fn is_valid_format(format: &str) -> bool {
        valid_format(format)
    }

    fn format_with(&self, format: &str) -> Option<String> {
        write_formatted(self.format(format))
    }

    fn parse_exact(text: &str, format: &str) -> Option<Self> {
        NaiveTime::parse_from_str(text, format).ok()
    }

    fn parse_lenient(text: &str) -> Option<Self> {
        TIME_FORMATS
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
    }
}

impl XmlDateTime for NaiveDateTime {
    const GENERAL_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S%.f";

    fn is_valid_format(format: &str) -> bool {
        valid_format(format)
    }

    fn format_with(&self, format: &str) -> Option<String> {
        write_formatted(self.format(format))
    }

    fn parse_exact(text: &str, format: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(text, format).ok()
    }

    fn parse_lenient(text: &str) -> Option<Self> {
        DATE_TIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|value| value.naive_local()))
            .or_else(|| {
                DATE_FORMATS
                    .iter()
                    .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
    }
}

impl XmlDateTime for DateTime<FixedOffset> {
    const GENERAL_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S%.f%:z";

    fn is_valid_format(format: &str) -> bool {
        valid_format(format)
    }

    fn format_with(&self, format: &str) -> Option<String> {
        write_formatted(self.format(format))
    }

    fn parse_exact(text: &str, format: &str) -> Option<Self> {
        DateTime::parse_from_str(text, format).ok()
    }

    fn parse_lenient(text: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(text)
            .or_else(|_| DateTime::parse_from_rfc2822(text))
            .ok()
    }
}

impl XmlDateTime for DateTime<Utc> {
    const GENERAL_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S%.fZ";

    fn is_valid_format(format: &str) -> bool {
        valid_format(format)
    }

    fn format_with(&self, format: &str) -> Option<String> {
        write_formatted(self.format(format))
    }

    fn parse_exact(text: &str, format: &str) -> Option<Self> {
        DateTime::parse_from_str(text, format)
            .map(|value| value.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(text, format).map(|value| value.and_utc())
            })
            .ok()
    }

    fn parse_lenient(text: &str) -> Option<Self> {
        <DateTime<FixedOffset>>::parse_lenient(text)
            .map(|value| value.with_timezone(&Utc))
            .or_else(|| NaiveDateTime::parse_lenient(text).map(|value| value.and_utc()))
    }
}

macro_rules! date_time_type {
    ($($ty:ty),* $(,)?) => {
        $(
            impl XmlType for $ty {
                fn shape() -> TypeShape {
                    TypeShape::DateTime(DateTimeShape::of::<$ty>())
                }
            }
        )*
    };
}

date_time_type!(NaiveDate, NaiveTime, NaiveDateTime, DateTime<Utc>, DateTime<FixedOffset>);
