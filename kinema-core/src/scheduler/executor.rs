//! Cycle execution
//!
//! Each allocated cycle plays its current pose as one synchronization group.
//! When that group completes the controller hands it to
//! [`CycleScheduler::on_group_complete`], which advances the pose index,
//! counts loops, reports status and plays the next pose.
//!
//! Status ordering: the report for a pose boundary is emitted before the
//! next pose's group exists. `start` and `restart` additionally report once
//! pose 0 is under way.

use crate::config::MAX_CYCLES;
use crate::error::MotionError;
use crate::motion::ServoBank;
use crate::slots::SlotTable;
use crate::state::{
    CycleCommand, CyclePhase, CycleStatusUpdate, MotionEvent, MotionObserver, Notify,
};
use crate::sync::{GroupId, GroupOwner, SyncManager};

use super::cycle::{CycleConfig, CycleStatus, PoseValues};

/// Allocated cycle slot
#[derive(Debug, Clone)]
struct Cycle {
    config: CycleConfig,
    phase: CyclePhase,
    pose_index: u8,
    loop_count: u32,
    active_group: Option<GroupId>,
    notify: Notify,
    user_data: Option<u32>,
}

impl Cycle {
    fn apply(&mut self, command: CycleCommand) -> Result<(), MotionError> {
        self.phase = self
            .phase
            .transition(command)
            .ok_or(MotionError::InvalidState)?;
        Ok(())
    }

    fn status(&self) -> CycleStatus {
        CycleStatus {
            active: self.phase.is_active(),
            running: self.phase.is_running(),
            pose_index: self.pose_index,
            pose_count: self.config.pose_count(),
            loop_count: self.loop_count,
            max_loops: self.config.max_loops,
            active_group: self.active_group,
            user_data: self.user_data,
        }
    }

    fn report<O: MotionObserver>(&self, index: u8, finished: bool, observer: &mut O) {
        if self.notify.is_emit() {
            observer.on_event(MotionEvent::CycleStatus(CycleStatusUpdate {
                cycle: index,
                loop_count: self.loop_count,
                max_loops: self.config.max_loops,
                pose_index: self.pose_index,
                finished,
            }));
        }
    }

    fn loops_exhausted(&self) -> bool {
        self.config.max_loops != 0 && self.loop_count >= self.config.max_loops
    }

    /// Play the current pose as a new group owned by this cycle
    ///
    /// On failure the cycle stops and reports itself finished.
    fn play_pose<O: MotionObserver>(
        &mut self,
        index: u8,
        bank: &mut ServoBank,
        sync: &mut SyncManager,
        observer: &mut O,
    ) -> Result<GroupId, MotionError> {
        let owner = GroupOwner::Cycle(index);
        let result = match self.config.poses.get(self.pose_index as usize) {
            Some(pose) => match &pose.values {
                PoseValues::Pulse(values) => {
                    sync.move_pulse(bank, &self.config.servo_ids, values, pose.duration, owner)
                }
                PoseValues::Angle(values) => {
                    sync.move_angle(bank, &self.config.servo_ids, values, pose.duration, owner)
                }
            },
            None => Err(MotionError::InvalidConfig),
        };

        match result {
            Ok(group) => {
                self.active_group = Some(group);
                trace!("cycle {} pose {} -> group {}", index, self.pose_index, group.raw());
                Ok(group)
            }
            Err(e) => {
                warn!("cycle {} pose {} failed: {}", index, self.pose_index, e);
                self.active_group = None;
                let _ = self.apply(CycleCommand::Abort);
                self.report(index, true, observer);
                Err(e)
            }
        }
    }

    /// Reset progress and play pose 0
    fn begin<O: MotionObserver>(
        &mut self,
        index: u8,
        bank: &mut ServoBank,
        sync: &mut SyncManager,
        observer: &mut O,
    ) -> Result<(), MotionError> {
        self.pose_index = 0;
        self.loop_count = 0;
        self.active_group = None;
        self.report(index, false, observer);

        self.play_pose(index, bank, sync, observer)?;
        self.report(index, false, observer);
        Ok(())
    }

    fn drop_group<O: MotionObserver>(&mut self, bank: &mut ServoBank, sync: &mut SyncManager, observer: &mut O) {
        if let Some(group) = self.active_group.take() {
            let _ = sync.release_group(bank, group, observer);
        }
    }

    /// Drop the pose group and stop; a running cycle reports itself finished
    fn abort<O: MotionObserver>(
        &mut self,
        index: u8,
        bank: &mut ServoBank,
        sync: &mut SyncManager,
        observer: &mut O,
    ) {
        self.drop_group(bank, sync, observer);
        if self.phase.is_running() {
            let _ = self.apply(CycleCommand::Abort);
            self.report(index, true, observer);
        }
    }
}

/// Cycle arena
#[derive(Debug, Clone, Default)]
pub struct CycleScheduler {
    cycles: SlotTable<Cycle, MAX_CYCLES>,
}

impl CycleScheduler {
    /// Create a scheduler with every slot free
    pub fn new() -> Self {
        Self {
            cycles: SlotTable::new(),
        }
    }

    fn cycle_mut(&mut self, index: u8) -> Result<&mut Cycle, MotionError> {
        self.cycles
            .get_mut(index as usize)
            .ok_or(MotionError::InvalidCycle)
    }

    /// Validate `config` and allocate an idle cycle
    ///
    /// Returns the slot index.
    pub fn create(&mut self, config: CycleConfig, notify: Notify) -> Result<u8, MotionError> {
        config.validate()?;

        let mut cycle = Cycle {
            config,
            phase: CyclePhase::Free,
            pose_index: 0,
            loop_count: 0,
            active_group: None,
            notify,
            user_data: None,
        };
        cycle.apply(CycleCommand::Create)?;

        let index = self.cycles.insert(cycle).map_err(|_| {
            warn!("no free cycle slot");
            MotionError::NoFreeSlot
        })?;
        info!("cycle {} created", index);
        Ok(index as u8)
    }

    /// Start an idle cycle from pose 0
    ///
    /// A paused cycle's frozen pose group is released first.
    pub fn start<O: MotionObserver>(
        &mut self,
        index: u8,
        bank: &mut ServoBank,
        sync: &mut SyncManager,
        observer: &mut O,
    ) -> Result<(), MotionError> {
        let cycle = self.cycle_mut(index)?;
        cycle.apply(CycleCommand::Start)?;
        cycle.drop_group(bank, sync, observer);
        info!("cycle {} start", index);
        cycle.begin(index, bank, sync, observer)
    }

    /// Start again from pose 0, dropping any in-flight pose first
    pub fn restart<O: MotionObserver>(
        &mut self,
        index: u8,
        bank: &mut ServoBank,
        sync: &mut SyncManager,
        observer: &mut O,
    ) -> Result<(), MotionError> {
        let cycle = self.cycle_mut(index)?;
        cycle.apply(CycleCommand::Restart)?;
        cycle.drop_group(bank, sync, observer);
        info!("cycle {} restart", index);
        cycle.begin(index, bank, sync, observer)
    }

    /// Freeze a running cycle at its current pose
    ///
    /// The pose's group stays claimed until the cycle is started, restarted
    /// or released.
    pub fn pause<O: MotionObserver>(
        &mut self,
        index: u8,
        bank: &mut ServoBank,
        sync: &mut SyncManager,
        observer: &mut O,
    ) -> Result<(), MotionError> {
        let cycle = self.cycle_mut(index)?;
        cycle.apply(CycleCommand::Pause)?;
        if let Some(group) = cycle.active_group {
            let _ = sync.pause_group(bank, group);
        }
        info!("cycle {} paused", index);
        cycle.report(index, false, observer);
        Ok(())
    }

    /// Free a cycle slot
    ///
    /// The pose's group is released; a running cycle reports itself finished.
    pub fn release<O: MotionObserver>(
        &mut self,
        index: u8,
        bank: &mut ServoBank,
        sync: &mut SyncManager,
        observer: &mut O,
    ) -> Result<(), MotionError> {
        let cycle = self.cycle_mut(index)?;
        let was_running = cycle.phase.is_running();
        cycle.apply(CycleCommand::Release)?;
        cycle.drop_group(bank, sync, observer);
        if was_running {
            cycle.report(index, true, observer);
        }

        self.cycles.remove(index as usize);
        info!("cycle {} released", index);
        Ok(())
    }

    /// Advance the cycle owning `group` after that group finished
    ///
    /// Stale groups (cycle paused, restarted or released since) are ignored.
    pub fn on_group_complete<O: MotionObserver>(
        &mut self,
        index: u8,
        group: GroupId,
        bank: &mut ServoBank,
        sync: &mut SyncManager,
        observer: &mut O,
    ) {
        let Ok(cycle) = self.cycle_mut(index) else {
            return;
        };
        if !cycle.phase.is_running() || cycle.active_group != Some(group) {
            return;
        }
        cycle.active_group = None;

        cycle.pose_index += 1;
        if cycle.pose_index >= cycle.config.pose_count() {
            cycle.pose_index = 0;
            cycle.loop_count = cycle.loop_count.saturating_add(1);
            debug!("cycle {} loop {}", index, cycle.loop_count);
        }
        cycle.report(index, false, observer);

        if cycle.pose_index == 0 && cycle.loops_exhausted() {
            let _ = cycle.apply(CycleCommand::Finish);
            info!("cycle {} finished after {} loops", index, cycle.loop_count);
            cycle.report(index, true, observer);
            return;
        }

        let _ = cycle.play_pose(index, bank, sync, observer);
    }

    /// Stop every running cycle and drop every cycle's group
    ///
    /// Slots stay allocated. Running cycles report themselves finished.
    pub fn stop_all<O: MotionObserver>(&mut self, bank: &mut ServoBank, sync: &mut SyncManager, observer: &mut O) {
        for (index, cycle) in self.cycles.iter_mut() {
            cycle.abort(index as u8, bank, sync, observer);
        }
    }

    /// Stop one cycle where it is, keeping its slot
    ///
    /// Used when the cycle's pose group is cancelled from outside. A running
    /// cycle reports itself finished.
    pub fn abort<O: MotionObserver>(
        &mut self,
        index: u8,
        bank: &mut ServoBank,
        sync: &mut SyncManager,
        observer: &mut O,
    ) -> Result<(), MotionError> {
        let cycle = self.cycle_mut(index)?;
        cycle.abort(index, bank, sync, observer);
        warn!("cycle {} aborted", index);
        Ok(())
    }

    /// Free every slot without touching groups or servos
    pub fn clear(&mut self) {
        self.cycles.clear();
    }

    /// Snapshot of an allocated cycle
    pub fn status(&self, index: u8) -> Result<CycleStatus, MotionError> {
        self.cycles
            .get(index as usize)
            .map(Cycle::status)
            .ok_or(MotionError::InvalidCycle)
    }

    /// Snapshots of every allocated cycle
    pub fn iter_status(&self) -> impl Iterator<Item = (u8, CycleStatus)> + '_ {
        self.cycles.iter().map(|(i, c)| (i as u8, c.status()))
    }

    /// Configuration of an allocated cycle
    pub fn config(&self, index: u8) -> Option<&CycleConfig> {
        self.cycles.get(index as usize).map(|c| &c.config)
    }

    /// Attach the owner's handle to a cycle
    pub fn set_user_data(&mut self, index: u8, value: Option<u32>) -> Result<(), MotionError> {
        self.cycle_mut(index)?.user_data = value;
        Ok(())
    }

    /// Owner's handle (`None` if unset or the slot is free)
    pub fn user_data(&self, index: u8) -> Option<u32> {
        self.cycles.get(index as usize).and_then(|c| c.user_data)
    }

    /// Number of allocated slots
    pub fn active_count(&self) -> usize {
        self.cycles.len()
    }

    /// Cycle slot whose current pose is `group`
    pub fn owner_of(&self, group: GroupId) -> Option<u8> {
        self.cycles
            .position(|c| c.active_group == Some(group))
            .map(|i| i as u8)
    }
}
