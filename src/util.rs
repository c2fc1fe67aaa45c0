// src/util.rs

use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};

/// Colombian pesos, no decimals, dot-grouped thousands: `$ 1.234.567`.
pub fn format_cop(value: f64) -> String {
    let negative = value < 0.0;
    let mut n = value.abs().round() as i64;
    let mut groups: Vec<String> = Vec::new();
    loop {
        let rem = n % 1000;
        n /= 1000;
        if n == 0 {
            groups.push(rem.to_string());
            break;
        }
        groups.push(format!("{rem:03}"));
    }
    groups.reverse();
    let digits = groups.join(".");
    if negative {
        format!("-$ {digits}")
    } else {
        format!("$ {digits}")
    }
}

pub fn full_name(first: &str, last: &str) -> String {
    let joined = format!("{} {}", first.trim(), last.trim());
    let joined = joined.trim().to_string();
    if joined.is_empty() { "—".to_string() } else { joined }
}

/// Spanish short month names (es-CO), 1-based month index.
pub fn month_abbrev(month: u32) -> &'static str {
    const MESES: [&str; 12] = [
        "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
    ];
    MESES[(month as usize - 1) % 12]
}

/// Walk `n` calendar months back from `(year, month)`.
pub fn months_back(year: i32, month: u32, n: u32) -> (i32, u32) {
    let total = year * 12 + (month as i32 - 1) - n as i32;
    (total.div_euclid(12), (total.rem_euclid(12) + 1) as u32)
}

/*
Appointment times are edited as local wall-clock values with whole-minute
precision and only become absolute instants at the submission boundary.
The round trip `to_edit_value` → `from_edit_value` is lossless as long as
seconds were zero, which the truncation below guarantees.
*/

pub fn to_edit_value<Tz: TimeZone>(ts: DateTime<Utc>, tz: &Tz) -> NaiveDateTime {
    truncate_to_minute(ts.with_timezone(tz).naive_local())
}

pub fn from_edit_value<Tz: TimeZone>(value: NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&truncate_to_minute(value))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn truncate_to_minute(value: NaiveDateTime) -> NaiveDateTime {
    value
        .with_second(0)
        .and_then(|v| v.with_nanosecond(0))
        .unwrap_or(value)
}
