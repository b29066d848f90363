use ansi_term::Style;
use chrono::NaiveDate;

use crate::{
    store::TimeTrackerStore,
    utils::time::{format_duration, local_clock},
};

/// The totals table only goes back this many days; older entries stay in
/// the state file and the report export.
const MAX_PRINTED_DAYS: usize = 100;

/// Prints the per-day totals table followed by the numbered session
/// listing. The session numbers are what the delete command refers to.
pub fn print_status(store: &TimeTrackerStore, person: &str, day: Option<NaiveDate>) {
    println!("{}", Style::new().bold().paint(format!("Tracking for: {person}")));

    let totals = store.totals_for(person);
    let sessions = store.sessions_for(person);
    if totals.is_none() && sessions.is_none() {
        println!("No data available.");
        return;
    }

    if let Some(totals) = totals {
        let rows: Vec<_> = totals
            .iter()
            .filter(|(date, _)| day.map_or(true, |day| **date == day))
            .collect();

        println!();
        println!(
            "{}",
            Style::new()
                .underline()
                .paint(format!("{:<12} {:>10}", "Date", "Total"))
        );
        for (date, ms) in rows
            .iter()
            .skip(rows.len().saturating_sub(MAX_PRINTED_DAYS))
        {
            println!("{:<12} {:>10}", date.to_string(), format_duration(**ms));
        }
    }

    let Some(sessions) = sessions else {
        return;
    };
    for (date, list) in sessions
        .iter()
        .filter(|(date, _)| day.map_or(true, |day| **date == day))
    {
        println!();
        println!("Date: {date}");
        for (index, session) in list.iter().enumerate() {
            println!(
                "  Session {}: {} - {}",
                index + 1,
                local_clock(session.start),
                local_clock(session.end)
            );
        }
    }
}
