//! Month grid for calendar navigation

use std::collections::BTreeSet;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CalendarDay {
    pub day: u32,
    pub date: NaiveDate,
    pub has_entry: bool,
    pub selected: bool,
}

/// Sunday-first weeks of the selected month; `None` pads the edges
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthGrid {
    pub title: String,
    pub previous_month: NaiveDate,
    pub next_month: NaiveDate,
    pub weeks: Vec<Vec<Option<CalendarDay>>>,
}

impl MonthGrid {
    pub fn new(selected: NaiveDate, marked: &BTreeSet<NaiveDate>) -> Self {
        let first = selected.with_day(1).unwrap_or(selected);
        let leading = first.weekday().num_days_from_sunday() as usize;

        let mut cells: Vec<Option<CalendarDay>> = vec![None; leading];
        cells.extend(
            first
                .iter_days()
                .take_while(|date| date.month() == first.month())
                .map(|date| {
                    Some(CalendarDay {
                        day: date.day(),
                        date,
                        has_entry: marked.contains(&date),
                        selected: date == selected,
                    })
                }),
        );
        while cells.len() % 7 != 0 {
            cells.push(None);
        }

        Self {
            title: first.format("%B %Y").to_string(),
            previous_month: first.checked_sub_months(Months::new(1)).unwrap_or(first),
            next_month: first.checked_add_months(Months::new(1)).unwrap_or(first),
            weeks: cells.chunks(7).map(<[_]>::to_vec).collect(),
        }
    }
}
