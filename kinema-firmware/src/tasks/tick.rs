//! Motion tick task
//!
//! Advances every trajectory, group and cycle once per tick period and
//! forwards the resulting events.

use defmt::*;
use embassy_time::{Duration, Ticker};

use kinema_core::config::{MAX_EVENTS_PER_TICK, TICK_PERIOD_MS};

use crate::channels::publish;
use crate::Motion;

#[embassy_executor::task]
pub async fn tick_task(motion: &'static Motion) {
    info!("Tick task started ({} ms)", TICK_PERIOD_MS);

    let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS as u64));

    loop {
        ticker.next().await;

        let events = motion.tick::<MAX_EVENTS_PER_TICK>();
        if events.dropped() > 0 {
            warn!("{} motion events dropped this tick", events.dropped());
        }
        for event in events.iter() {
            publish(*event);
        }
    }
}
