//! Synchronization group manager
//!
//! Owns the servo ownership table and the group arena. Servo completions
//! from the interpolator are fed back through
//! [`SyncManager::on_servo_complete`]; the manager answers with the group
//! that just finished, if any, and the caller routes it to its owner.

use crate::config::{MAX_SERVOS, MAX_SYNC_GROUPS};
use crate::error::MotionError;
use crate::motion::{ServoBank, ServoMask};
use crate::slots::SlotTable;
use crate::state::{MotionObserver, Notify};

use super::group::{GroupId, GroupOwner, SyncGroup};

/// A group whose last servo just finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompletedGroup {
    /// Finished group
    pub id: GroupId,
    /// Completion routing recorded at creation
    pub owner: GroupOwner,
}

/// Group arena plus servo ownership
#[derive(Debug, Clone)]
pub struct SyncManager {
    groups: SlotTable<SyncGroup, MAX_SYNC_GROUPS>,
    owners: [Option<GroupId>; MAX_SERVOS],
    next_id: GroupId,
}

impl Default for SyncManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncManager {
    /// Create a manager with no groups and every servo unclaimed
    pub fn new() -> Self {
        Self {
            groups: SlotTable::new(),
            owners: [None; MAX_SERVOS],
            next_id: GroupId::FIRST,
        }
    }

    fn allocate_id(&mut self) -> GroupId {
        // Skip ids still held by a live group after a wrap
        let mut id = self.next_id;
        while self.groups.position(|g| g.id == id).is_some() {
            id = id.next();
        }
        self.next_id = id.next();
        id
    }

    fn find(&self, id: GroupId) -> Option<usize> {
        self.groups.position(|g| g.id == id)
    }

    /// Claim `ids` as a new group
    ///
    /// Every id must be in range and unclaimed; otherwise nothing is claimed.
    pub fn start_group(&mut self, ids: &[u8], owner: GroupOwner) -> Result<GroupId, MotionError> {
        if ids.is_empty() {
            return Err(MotionError::InvalidConfig);
        }
        for &servo in ids {
            match self.owners.get(servo as usize) {
                None => return Err(MotionError::InvalidServo),
                Some(Some(holder)) => {
                    debug!("servo {} already held by group {}", servo, holder.raw());
                    return Err(MotionError::ServoBusy);
                }
                Some(None) => {}
            }
        }
        if self.groups.is_full() {
            warn!("no free sync group slot");
            return Err(MotionError::NoFreeSlot);
        }

        let id = self.allocate_id();
        let claimed = ServoMask::from_ids(ids);
        self.groups
            .insert(SyncGroup::new(id, claimed, owner))
            .map_err(|_| MotionError::NoFreeSlot)?;
        for servo in claimed.iter() {
            self.owners[servo as usize] = Some(id);
        }

        debug!("group {} claimed {} servos", id.raw(), claimed.count());
        Ok(id)
    }

    /// Claim `ids` and move each to its pulse over one shared duration
    ///
    /// Members already at their target hold position for the duration so
    /// the group still completes when its duration elapses.
    pub fn move_pulse(
        &mut self,
        bank: &mut ServoBank,
        ids: &[u8],
        pulses: &[u16],
        duration: u32,
        owner: GroupOwner,
    ) -> Result<GroupId, MotionError> {
        if ids.len() != pulses.len() {
            return Err(MotionError::LengthMismatch);
        }
        let id = self.start_group(ids, owner)?;
        for (&servo, &pulse) in ids.iter().zip(pulses) {
            if !bank.begin_move(servo, pulse, duration, Notify::Silent) {
                bank.hold(servo, duration, Notify::Silent);
            }
        }
        Ok(id)
    }

    /// Claim `ids` and move each to its angle over one shared duration
    pub fn move_angle(
        &mut self,
        bank: &mut ServoBank,
        ids: &[u8],
        angles: &[f32],
        duration: u32,
        owner: GroupOwner,
    ) -> Result<GroupId, MotionError> {
        if ids.len() != angles.len() {
            return Err(MotionError::LengthMismatch);
        }
        let id = self.start_group(ids, owner)?;
        for (&servo, &angle) in ids.iter().zip(angles) {
            let pulse = bank.angle_to_pulse(servo, angle);
            if !bank.begin_move(servo, pulse, duration, Notify::Silent) {
                bank.hold(servo, duration, Notify::Silent);
            }
        }
        Ok(id)
    }

    /// Record that `servo` finished its move
    ///
    /// The servo is released at once and may be claimed again before the
    /// rest of its group finishes. Returns the group if this was its last
    /// pending servo; the group is gone from the arena at that point.
    pub fn on_servo_complete(&mut self, servo: u8) -> Option<CompletedGroup> {
        let id = self.owners.get_mut(servo as usize)?.take()?;
        let slot = self.find(id)?;

        let group = self.groups.get_mut(slot)?;
        group.done.insert(servo);
        if !group.is_complete() {
            return None;
        }

        let group = self.groups.remove(slot)?;
        debug!("group {} complete", id.raw());
        Some(CompletedGroup {
            id: group.id,
            owner: group.owner,
        })
    }

    /// Cancel a group
    ///
    /// Pending members are stopped where they are and unclaimed. The group's
    /// completion is not reported.
    pub fn release_group<O: MotionObserver>(
        &mut self,
        bank: &mut ServoBank,
        id: GroupId,
        observer: &mut O,
    ) -> Result<(), MotionError> {
        let slot = self.find(id).ok_or(MotionError::UnknownGroup)?;
        let group = self.groups.remove(slot).ok_or(MotionError::UnknownGroup)?;

        for servo in group.pending().iter() {
            bank.stop(servo, observer);
            if self.owners[servo as usize] == Some(id) {
                self.owners[servo as usize] = None;
            }
        }

        debug!("group {} released", id.raw());
        Ok(())
    }

    /// Release every group, returning how many were dropped
    pub fn release_all<O: MotionObserver>(&mut self, bank: &mut ServoBank, observer: &mut O) -> usize {
        let mut ids: heapless::Vec<GroupId, MAX_SYNC_GROUPS> = heapless::Vec::new();
        for (_, group) in self.groups.iter() {
            let _ = ids.push(group.id);
        }
        for &id in &ids {
            let _ = self.release_group(bank, id, observer);
        }
        ids.len()
    }

    /// Freeze every pending member of a group
    pub fn pause_group(&mut self, bank: &mut ServoBank, id: GroupId) -> Result<(), MotionError> {
        let group = self.group(id).ok_or(MotionError::UnknownGroup)?;
        for servo in group.pending().iter() {
            bank.pause(servo);
        }
        Ok(())
    }

    /// Resume every paused member of a group
    pub fn restart_group(&mut self, bank: &mut ServoBank, id: GroupId) -> Result<(), MotionError> {
        let group = self.group(id).ok_or(MotionError::UnknownGroup)?;
        for servo in group.pending().iter() {
            bank.resume(servo);
        }
        Ok(())
    }

    /// Drop every group and claim without touching servos
    pub fn reset(&mut self) {
        self.groups.clear();
        self.owners = [None; MAX_SERVOS];
        self.next_id = GroupId::FIRST;
    }

    /// Active group record
    pub fn group(&self, id: GroupId) -> Option<&SyncGroup> {
        self.find(id).and_then(|slot| self.groups.get(slot))
    }

    /// True if the group finished, was released or never existed
    pub fn is_group_complete(&self, id: GroupId) -> bool {
        self.find(id).is_none()
    }

    /// Servos claimed by an active group (empty for unknown ids)
    pub fn group_mask(&self, id: GroupId) -> ServoMask {
        self.group(id).map(|g| g.claimed).unwrap_or_default()
    }

    /// Group currently holding `servo`
    pub fn owner_of(&self, servo: u8) -> Option<GroupId> {
        self.owners.get(servo as usize).copied().flatten()
    }

    /// Check if `servo` is in range and unclaimed
    pub fn is_servo_available(&self, servo: u8) -> bool {
        matches!(self.owners.get(servo as usize), Some(None))
    }

    /// Servos claimed by any group
    pub fn busy_mask(&self) -> ServoMask {
        let mut mask = ServoMask::EMPTY;
        for (servo, owner) in self.owners.iter().enumerate() {
            if owner.is_some() {
                mask.insert(servo as u8);
            }
        }
        mask
    }

    /// Servos not claimed by any group
    pub fn idle_mask(&self) -> ServoMask {
        ServoMask::all().difference(self.busy_mask())
    }

    /// Number of claimed servos
    pub fn busy_count(&self) -> u32 {
        self.busy_mask().count()
    }

    /// Number of active groups
    pub fn active_groups(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::EventLog;
    use kinema_hal::MockPwm;

    const EXT: GroupOwner = GroupOwner::External(Notify::Emit);

    fn tick_all(
        bank: &mut ServoBank,
        sync: &mut SyncManager,
        pwm: &mut MockPwm<MAX_SERVOS>,
        ticks: u32,
    ) -> heapless::Vec<CompletedGroup, 8> {
        let mut done = heapless::Vec::new();
        let mut log: EventLog<8> = EventLog::new();
        for _ in 0..ticks {
            let finished = bank.tick(pwm, &mut log);
            for servo in finished.iter() {
                if let Some(g) = sync.on_servo_complete(servo) {
                    let _ = done.push(g);
                }
            }
        }
        done
    }

    #[test]
    fn test_start_group_claims_all() {
        let mut sync = SyncManager::new();
        let id = sync.start_group(&[0, 2], EXT).unwrap();
        assert_eq!(id, GroupId::FIRST);
        assert_eq!(sync.busy_mask(), ServoMask::from_ids(&[0, 2]));
        assert_eq!(sync.idle_mask(), ServoMask::from_ids(&[1, 3, 4, 5]));
        assert_eq!(sync.busy_count(), 2);
        assert_eq!(sync.owner_of(2), Some(id));
        assert!(!sync.is_servo_available(0));
        assert!(sync.is_servo_available(1));
    }

    #[test]
    fn test_start_group_is_atomic() {
        let mut sync = SyncManager::new();
        sync.start_group(&[1], EXT).unwrap();
        let before = sync.busy_mask();

        assert_eq!(sync.start_group(&[0, 1, 2], EXT), Err(MotionError::ServoBusy));
        assert_eq!(sync.busy_mask(), before);

        assert_eq!(sync.start_group(&[3, 99], EXT), Err(MotionError::InvalidServo));
        assert_eq!(sync.busy_mask(), before);

        assert_eq!(sync.start_group(&[], EXT), Err(MotionError::InvalidConfig));
    }

    #[test]
    fn test_ids_increase() {
        let mut sync = SyncManager::new();
        let a = sync.start_group(&[0], EXT).unwrap();
        let b = sync.start_group(&[1], EXT).unwrap();
        assert_eq!(a.raw(), 1);
        assert_eq!(b.raw(), 2);
    }

    #[test]
    fn test_slot_exhaustion() {
        let mut sync = SyncManager::new();
        let mut bank = ServoBank::new();
        let mut log: EventLog<4> = EventLog::new();
        let mut ids: heapless::Vec<GroupId, MAX_SYNC_GROUPS> = heapless::Vec::new();

        // Bare claims on one servo each, released right away to keep servos free
        for _ in 0..MAX_SYNC_GROUPS {
            let id = sync.start_group(&[0], EXT).unwrap();
            sync.owners[0] = None;
            let _ = ids.push(id);
        }
        assert_eq!(sync.start_group(&[1], EXT), Err(MotionError::NoFreeSlot));
        assert_eq!(sync.busy_mask(), ServoMask::EMPTY);

        sync.release_group(&mut bank, ids[3], &mut log).unwrap();
        assert!(sync.start_group(&[1], EXT).is_ok());
    }

    #[test]
    fn test_group_completes_once_after_all_members() {
        let mut sync = SyncManager::new();
        let mut bank = ServoBank::new();
        let mut pwm = MockPwm::new();

        let id = sync
            .move_pulse(&mut bank, &[0, 1], &[1800, 1200], 100, EXT)
            .unwrap();

        let done = tick_all(&mut bank, &mut sync, &mut pwm, 99);
        assert!(done.is_empty());
        assert!(!sync.is_group_complete(id));

        let done = tick_all(&mut bank, &mut sync, &mut pwm, 1);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, id);
        assert!(sync.is_group_complete(id));
        assert_eq!(sync.busy_mask(), ServoMask::EMPTY);

        let done = tick_all(&mut bank, &mut sync, &mut pwm, 50);
        assert!(done.is_empty());
    }

    #[test]
    fn test_member_freed_before_group_finishes() {
        let mut sync = SyncManager::new();
        let mut bank = ServoBank::new();
        let mut log: EventLog<4> = EventLog::new();

        let id = sync.move_pulse(&mut bank, &[0, 1], &[1800, 1200], 100, EXT).unwrap();

        // Servo 0 stopped early: it is free, the group is not done
        assert!(bank.stop(0, &mut log));
        assert_eq!(sync.on_servo_complete(0), None);
        assert!(sync.is_servo_available(0));
        assert!(!sync.is_group_complete(id));
        assert!(sync.start_group(&[0], EXT).is_ok());
    }

    #[test]
    fn test_members_at_target_hold_for_duration() {
        let mut sync = SyncManager::new();
        let mut bank = ServoBank::new();
        let mut pwm = MockPwm::new();

        // Servo 1 is already at 1500
        let id = sync.move_pulse(&mut bank, &[0, 1], &[2000, 1500], 20, EXT).unwrap();
        assert!(bank.is_moving(1));

        let done = tick_all(&mut bank, &mut sync, &mut pwm, 20);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, id);
    }

    #[test]
    fn test_length_mismatch() {
        let mut sync = SyncManager::new();
        let mut bank = ServoBank::new();
        assert_eq!(
            sync.move_pulse(&mut bank, &[0, 1], &[1000], 10, EXT),
            Err(MotionError::LengthMismatch)
        );
        assert_eq!(
            sync.move_angle(&mut bank, &[0], &[10.0, 20.0], 10, EXT),
            Err(MotionError::LengthMismatch)
        );
        assert_eq!(sync.busy_mask(), ServoMask::EMPTY);
    }

    #[test]
    fn test_failed_claim_starts_no_motion() {
        let mut sync = SyncManager::new();
        let mut bank = ServoBank::new();
        sync.start_group(&[2], EXT).unwrap();

        assert_eq!(
            sync.move_angle(&mut bank, &[0, 2], &[0.0, 270.0], 10, EXT),
            Err(MotionError::ServoBusy)
        );
        assert!(!bank.any_moving());
    }

    #[test]
    fn test_release_mid_motion() {
        let mut sync = SyncManager::new();
        let mut bank = ServoBank::new();
        let mut pwm = MockPwm::new();
        let mut log: EventLog<4> = EventLog::new();

        let id = sync.move_pulse(&mut bank, &[0, 1], &[2500, 500], 100, EXT).unwrap();
        tick_all(&mut bank, &mut sync, &mut pwm, 40);
        let held = bank.current_pulse(0);

        sync.release_group(&mut bank, id, &mut log).unwrap();
        assert!(!bank.is_moving(0));
        assert!(!bank.is_moving(1));
        assert_eq!(bank.current_pulse(0), held);
        assert_eq!(sync.busy_mask(), ServoMask::EMPTY);
        assert!(sync.is_group_complete(id));

        // Free for a new claim right away; the old group never reports
        assert!(sync.start_group(&[0, 1], EXT).is_ok());
        assert!(tick_all(&mut bank, &mut sync, &mut pwm, 200).is_empty());
        assert_eq!(sync.release_group(&mut bank, id, &mut log), Err(MotionError::UnknownGroup));
    }

    #[test]
    fn test_release_leaves_reclaimed_servo_alone() {
        let mut sync = SyncManager::new();
        let mut bank = ServoBank::new();
        let mut pwm = MockPwm::new();
        let mut log: EventLog<4> = EventLog::new();

        let old = sync.move_pulse(&mut bank, &[0, 1], &[1600, 2500], 10, EXT).unwrap();
        // Servo 0 finishes early and is claimed by a new group
        bank.stop(0, &mut log);
        sync.on_servo_complete(0);

        let new = sync.move_pulse(&mut bank, &[0], &[900], 50, EXT).unwrap();
        sync.release_group(&mut bank, old, &mut log).unwrap();

        assert_eq!(sync.owner_of(0), Some(new));
        assert!(bank.is_moving(0));
        assert!(!bank.is_moving(1));
        let done = tick_all(&mut bank, &mut sync, &mut pwm, 50);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, new);
    }

    #[test]
    fn test_pause_and_restart_group() {
        let mut sync = SyncManager::new();
        let mut bank = ServoBank::new();
        let mut pwm = MockPwm::new();

        let id = sync.move_pulse(&mut bank, &[0, 1], &[2000, 1000], 30, EXT).unwrap();
        tick_all(&mut bank, &mut sync, &mut pwm, 10);

        sync.pause_group(&mut bank, id).unwrap();
        assert!(tick_all(&mut bank, &mut sync, &mut pwm, 100).is_empty());
        assert_eq!(bank.remaining_ticks(0), 20);
        assert_eq!(sync.busy_count(), 2);

        sync.restart_group(&mut bank, id).unwrap();
        let done = tick_all(&mut bank, &mut sync, &mut pwm, 20);
        assert_eq!(done.len(), 1);

        let stale = GroupId::new(42).unwrap();
        assert_eq!(sync.pause_group(&mut bank, stale), Err(MotionError::UnknownGroup));
    }

    #[test]
    fn test_unknown_group_reads_complete() {
        let sync = SyncManager::new();
        let id = GroupId::new(1234).unwrap();
        assert!(sync.is_group_complete(id));
        assert_eq!(sync.group_mask(id), ServoMask::EMPTY);
    }

    #[test]
    fn test_release_all_and_reset() {
        let mut sync = SyncManager::new();
        let mut bank = ServoBank::new();
        let mut log: EventLog<4> = EventLog::new();
        sync.move_pulse(&mut bank, &[0], &[2000], 10, EXT).unwrap();
        sync.move_pulse(&mut bank, &[1], &[2000], 10, EXT).unwrap();

        assert_eq!(sync.release_all(&mut bank, &mut log), 2);
        assert_eq!(sync.active_groups(), 0);
        assert!(!bank.any_moving());

        sync.start_group(&[3], EXT).unwrap();
        sync.reset();
        assert_eq!(sync.busy_mask(), ServoMask::EMPTY);
        assert_eq!(sync.start_group(&[3], EXT).map(GroupId::raw), Ok(1));
    }
}
