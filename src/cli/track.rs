use std::{io::Write, time::Duration};

use ansi_term::Colour::{Green, Red};
use anyhow::Result;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    store::state_file::StateStorage,
    tracker::Tracker,
    utils::{
        clock::Clock,
        time::{format_duration, local_clock},
    },
};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Watches for Ctrl-C and cancels the token, which the timer loop treats
/// as the stop button.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let detected = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            detected.cancel();
        }
    });
    token
}

/// Runs the live timer until the token cancels, then stops the tracker and
/// records the session. Every tick re-renders the elapsed display and lets
/// the tracker split the session if midnight went by.
pub async fn run_timer_loop(
    tracker: &mut Tracker<impl StateStorage>,
    clock: &dyn Clock,
    shutdown: CancellationToken,
) -> Result<()> {
    tracker.start(clock.time());
    println!(
        "{} Tracking for: {}",
        Green.bold().paint("●"),
        tracker.person()
    );
    println!("Last start time at: {}", local_clock(clock.time()));
    println!("Press Ctrl-C to stop.");

    let mut tick_point = clock.instant();
    loop {
        tick_point += TICK_INTERVAL;

        if let Some(elapsed) = tracker.elapsed(clock.time()) {
            print!("\rTimer: {}  ", format_duration(elapsed.num_milliseconds()));
            let _ = std::io::stdout().flush();
        }
        if tracker.check_midnight_crossing(clock.time()).await? {
            debug!("Timer display rolled into a new day");
        }

        select! {
            _ = shutdown.cancelled() => break,
            _ = clock.sleep_until(tick_point) => (),
        }
    }

    println!();
    match tracker.stop(clock.time()).await? {
        Some(session) => println!(
            "{} Recorded session {} - {} ({})",
            Red.paint("■"),
            local_clock(session.start),
            local_clock(session.end),
            format_duration(session.duration_ms())
        ),
        None => println!("{} Nothing elapsed, no session recorded.", Red.paint("■")),
    }
    Ok(())
}
