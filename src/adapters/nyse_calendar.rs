//! NYSE trading calendar from holiday rules.
//!
//! Full-day closures only; early closes are regular sessions here.

use crate::domain::error::RebalanceError;
use crate::ports::calendar_port::CalendarPort;
use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Unscheduled closures (weather, national mourning, 9/11).
const SPECIAL_CLOSURES: &[(i32, u32, u32)] = &[
    (1985, 9, 27),
    (1994, 4, 27),
    (2001, 9, 11),
    (2001, 9, 12),
    (2001, 9, 13),
    (2001, 9, 14),
    (2004, 6, 11),
    (2007, 1, 2),
    (2012, 10, 29),
    (2012, 10, 30),
    (2018, 12, 5),
    (2025, 1, 9),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct NyseCalendar;

impl NyseCalendar {
    pub fn new() -> Self {
        NyseCalendar
    }

    pub fn is_session(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_holiday(date)
    }
}

impl CalendarPort for NyseCalendar {
    fn schedule(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, RebalanceError> {
        Ok(start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_session(*d))
            .collect())
    }
}

/// Easter Sunday, anonymous Gregorian algorithm.
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_next.pred_opt()?;
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Some(last - Duration::days(back as i64))
}

/// Saturday holidays move to Friday, Sunday holidays to Monday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn fixed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Full-day holidays of `year` by rule.
pub fn holidays(year: i32) -> Vec<NaiveDate> {
    let mut days: Vec<Option<NaiveDate>> = Vec::with_capacity(12);

    // New Year's Day: a Saturday holiday is not observed on the prior Friday.
    days.push(fixed(year, 1, 1).and_then(|d| match d.weekday() {
        Weekday::Sat => None,
        _ => Some(observed(d)),
    }));
    if year >= 1998 {
        days.push(nth_weekday(year, 1, Weekday::Mon, 3));
    }
    days.push(nth_weekday(year, 2, Weekday::Mon, 3));
    days.push(easter_sunday(year).map(|e| e - Duration::days(2)));
    days.push(last_weekday(year, 5, Weekday::Mon));
    if year >= 2022 {
        days.push(fixed(year, 6, 19).map(observed));
    }
    days.push(fixed(year, 7, 4).map(observed));
    days.push(nth_weekday(year, 9, Weekday::Mon, 1));
    days.push(nth_weekday(year, 11, Weekday::Thu, 4));
    days.push(fixed(year, 12, 25).map(observed));

    let mut out: Vec<NaiveDate> = days.into_iter().flatten().collect();
    out.extend(
        SPECIAL_CLOSURES
            .iter()
            .filter(|(y, _, _)| *y == year)
            .filter_map(|&(y, m, d)| fixed(y, m, d)),
    );
    out.sort();
    out
}

fn is_holiday(date: NaiveDate) -> bool {
    holidays(date.year()).contains(&date)
}
