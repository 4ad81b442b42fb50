//! Motion event reporting
//!
//! Logs every motion event and wakes tasks waiting on group or cycle
//! progress.

use defmt::*;

use kinema_core::state::MotionEvent;

use crate::channels::{CYCLE_UPDATE, EVENT_CHANNEL, GROUP_DONE};
use crate::config::servo_name;

#[embassy_executor::task]
pub async fn status_task() {
    info!("Status task started");

    loop {
        match EVENT_CHANNEL.receive().await {
            MotionEvent::ServoComplete { servo } => {
                debug!("{} reached target", servo_name(servo));
            }
            MotionEvent::GroupComplete { group } => {
                debug!("Group {} complete", group.raw());
                GROUP_DONE.signal(group);
            }
            MotionEvent::CycleStatus(update) => {
                if update.finished {
                    info!("Cycle {} finished after {} loops", update.cycle, update.loop_count);
                } else {
                    trace!(
                        "Cycle {} loop {} pose {}",
                        update.cycle,
                        update.loop_count,
                        update.pose_index
                    );
                }
                CYCLE_UPDATE.signal(update);
            }
        }
    }
}
