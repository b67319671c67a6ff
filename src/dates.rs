//! Calendar bucketing helpers. Everything here works on the local calendar
//! date the user sees; nothing is derived from UTC timestamps.

use chrono::{Datelike, Duration as ChronoDuration, Local, Months, NaiveDate, Weekday};

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDay {
    pub date: NaiveDate,
    pub in_current_month: bool,
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_KEY_FORMAT)
}

/// `YYYY-MM`, the prefix every date key in that month shares.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    shift_month(first_of_month(date), 1)
        .pred_opt()
        .unwrap_or(date)
}

/// Strict month days, 1st through last.
pub fn days_in_month(anchor: NaiveDate) -> Vec<NaiveDate> {
    let first = first_of_month(anchor);
    first
        .iter_days()
        .take(last_of_month(anchor).day() as usize)
        .collect()
}

/// Complete Sunday-first weeks covering the anchor's month, spilling into the
/// neighbouring months at either end.
pub fn month_grid(anchor: NaiveDate) -> Vec<Vec<GridDay>> {
    let first = first_of_month(anchor);
    let last = last_of_month(anchor);
    let start = shift_day(first, -i64::from(first.weekday().num_days_from_sunday()));
    let end = shift_day(last, 6 - i64::from(last.weekday().num_days_from_sunday()));
    let cells: Vec<GridDay> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| GridDay {
            date,
            in_current_month: is_same_month(date, anchor),
        })
        .collect();
    cells.chunks(7).map(|week| week.to_vec()).collect()
}

/// Strict month days split into rows that close on each Sunday, the layout of
/// the habit grid. The first and last rows may be short.
pub fn month_weeks(anchor: NaiveDate) -> Vec<Vec<NaiveDate>> {
    let mut weeks = Vec::new();
    let mut current = Vec::new();
    for day in days_in_month(anchor) {
        current.push(day);
        if day.weekday() == Weekday::Sun {
            weeks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        weeks.push(current);
    }
    weeks
}

/// The Sunday-first week containing `date`.
pub fn week_of(date: NaiveDate) -> Vec<NaiveDate> {
    let start = shift_day(date, -i64::from(date.weekday().num_days_from_sunday()));
    start.iter_days().take(7).collect()
}

pub fn is_today(date: NaiveDate) -> bool {
    date == today()
}

pub fn is_same_day(a: NaiveDate, b: NaiveDate) -> bool {
    date_key(a) == date_key(b)
}

pub fn is_same_month(date: NaiveDate, anchor: NaiveDate) -> bool {
    date.year() == anchor.year() && date.month() == anchor.month()
}

/// Moves by whole months, clamping the day to the target month's length.
pub fn shift_month(anchor: NaiveDate, delta: i32) -> NaiveDate {
    let months = Months::new(delta.unsigned_abs());
    let shifted = if delta >= 0 {
        anchor.checked_add_months(months)
    } else {
        anchor.checked_sub_months(months)
    };
    shifted.unwrap_or(anchor)
}

pub fn shift_day(anchor: NaiveDate, delta: i64) -> NaiveDate {
    anchor
        .checked_add_signed(ChronoDuration::days(delta))
        .unwrap_or(anchor)
}
