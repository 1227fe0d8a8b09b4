//! Block-range schedule of ceremony tasks

use crate::error::{Result, TaskError};
use crate::state::{DkgState, Phase};
use crate::task::{TaskKind, TaskWindow};

/// A task kind bound to `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTask {
    pub start: u64,
    pub end: u64,
    pub kind: TaskKind,
}

/// Tasks of one round, keyed by block range
///
/// Ranges either coincide or are disjoint; partial overlaps are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    nonce: u64,
    tasks: Vec<ScheduledTask>,
}

impl Schedule {
    pub fn new(nonce: u64) -> Self {
        Self {
            nonce,
            tasks: Vec::new(),
        }
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Add `kind` for `[start, end)`
    pub fn schedule(&mut self, start: u64, end: u64, kind: TaskKind) -> Result<()> {
        if start >= end {
            return Err(TaskError::InvalidSchedule { start, end });
        }
        let overlapping = self.tasks.iter().any(|task| {
            let same = task.start == start && task.end == end;
            let disjoint = end <= task.start || start >= task.end;
            !same && !disjoint
        });
        if overlapping {
            return Err(TaskError::InvalidSchedule { start, end });
        }
        self.tasks.push(ScheduledTask { start, end, kind });
        Ok(())
    }

    /// Task kinds whose range contains `height`
    pub fn active_at(&self, height: u64) -> Vec<TaskKind> {
        self.tasks
            .iter()
            .filter(|task| height >= task.start && height < task.end)
            .map(|task| task.kind)
            .collect()
    }

    /// Windows of the tasks active at `height`, ready to build
    pub fn windows_at(&self, height: u64) -> Vec<(TaskKind, TaskWindow)> {
        self.tasks
            .iter()
            .filter(|task| height >= task.start && height < task.end)
            .map(|task| (task.kind, TaskWindow::new(self.nonce, task.start, task.end)))
            .collect()
    }

    /// Drop every range that ended at or before `height`
    pub fn purge_before(&mut self, height: u64) {
        self.tasks.retain(|task| task.end > height);
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Standard tasks for the phase the state is in
    ///
    /// Windows are laid out from `phase_start` in units of `phase_length`.
    pub fn for_round(state: &DkgState) -> Result<Self> {
        let s = state.phase_start;
        let l = state.phase_length;
        let mut schedule = Schedule::new(state.nonce);

        match state.phase {
            Phase::RegistrationOpen => {
                schedule.schedule(s, s + l, TaskKind::Register)?;
                schedule.schedule(s + l, s + 2 * l, TaskKind::DisputeMissingRegistration)?;
            }
            Phase::ShareDistribution => {
                schedule.schedule(s, s + l, TaskKind::ShareDistribution)?;
                schedule.schedule(s + l, s + 2 * l, TaskKind::DisputeMissingShareDistribution)?;
            }
            Phase::DisputeShareDistribution => {
                schedule.schedule(s, s + l, TaskKind::DisputeShareDistribution)?;
                schedule.schedule(s + l, s + 2 * l, TaskKind::KeyShareSubmission)?;
                schedule.schedule(s + 2 * l, s + 3 * l, TaskKind::DisputeMissingKeyShares)?;
            }
            // Key share windows still count from the dispute phase start
            Phase::KeyShareSubmission => {
                schedule.schedule(s + l, s + 2 * l, TaskKind::KeyShareSubmission)?;
                schedule.schedule(s + 2 * l, s + 3 * l, TaskKind::DisputeMissingKeyShares)?;
            }
            Phase::MPKSubmission => {
                schedule.schedule(s, s + l, TaskKind::MpkSubmission)?;
            }
            Phase::GPKJSubmission => {
                schedule.schedule(s, s + l, TaskKind::GpkjSubmission)?;
                schedule.schedule(s + l, s + 2 * l, TaskKind::DisputeMissingGpkj)?;
                schedule.schedule(s + l, s + 2 * l, TaskKind::DisputeGpkj)?;
            }
            Phase::DisputeGPKJSubmission => {
                schedule.schedule(s, s + l, TaskKind::DisputeGpkj)?;
                schedule.schedule(s + l, s + 2 * l, TaskKind::Completion)?;
            }
            Phase::Completion => {}
        }
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    #[test]
    fn test_partial_overlap_rejected() {
        let mut schedule = Schedule::new(1);
        schedule.schedule(10, 20, TaskKind::Register).unwrap();
        schedule.schedule(10, 20, TaskKind::DisputeMissingRegistration).unwrap();
        schedule.schedule(20, 30, TaskKind::ShareDistribution).unwrap();

        assert!(matches!(
            schedule.schedule(15, 25, TaskKind::Completion),
            Err(TaskError::InvalidSchedule { start: 15, end: 25 })
        ));
        assert!(schedule.schedule(5, 5, TaskKind::Completion).is_err());
        assert_eq!(schedule.len(), 3);
    }

    #[test]
    fn test_active_at() {
        let mut schedule = Schedule::new(1);
        schedule.schedule(10, 20, TaskKind::GpkjSubmission).unwrap();
        schedule.schedule(20, 30, TaskKind::DisputeMissingGpkj).unwrap();
        schedule.schedule(20, 30, TaskKind::DisputeGpkj).unwrap();

        assert!(schedule.active_at(9).is_empty());
        assert_eq!(schedule.active_at(19), vec![TaskKind::GpkjSubmission]);
        assert_eq!(
            schedule.active_at(20),
            vec![TaskKind::DisputeMissingGpkj, TaskKind::DisputeGpkj]
        );

        schedule.purge_before(20);
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule.windows_at(25)[0].1, TaskWindow::new(1, 20, 30));
    }

    #[test]
    fn test_round_layout() {
        let mut state = DkgState::new(Address::with_last_byte(1));
        state.nonce = 2;
        state.phase = Phase::DisputeShareDistribution;
        state.phase_start = 100;
        state.phase_length = 10;

        let schedule = Schedule::for_round(&state).unwrap();
        assert_eq!(schedule.active_at(105), vec![TaskKind::DisputeShareDistribution]);
        assert_eq!(schedule.active_at(115), vec![TaskKind::KeyShareSubmission]);
        assert_eq!(schedule.active_at(125), vec![TaskKind::DisputeMissingKeyShares]);
        assert!(schedule.active_at(130).is_empty());

        state.phase = Phase::Completion;
        assert!(Schedule::for_round(&state).unwrap().is_empty());
    }

    #[test]
    fn test_share_dispute_scheduled_once() {
        let mut state = DkgState::new(Address::with_last_byte(1));
        state.nonce = 1;
        state.phase_length = 10;

        state.phase = Phase::ShareDistribution;
        state.phase_start = 50;
        let distribution = Schedule::for_round(&state).unwrap();
        assert_eq!(distribution.active_at(55), vec![TaskKind::ShareDistribution]);
        assert_eq!(
            distribution.active_at(65),
            vec![TaskKind::DisputeMissingShareDistribution]
        );

        state.phase = Phase::DisputeShareDistribution;
        state.phase_start = 62;
        let dispute = Schedule::for_round(&state).unwrap();

        let disputes = distribution
            .iter()
            .chain(dispute.iter())
            .filter(|task| task.kind == TaskKind::DisputeShareDistribution)
            .count();
        assert_eq!(disputes, 1);
    }

    #[test]
    fn test_zero_phase_length_is_invalid() {
        let mut state = DkgState::new(Address::with_last_byte(1));
        state.phase = Phase::MPKSubmission;
        assert!(Schedule::for_round(&state).is_err());
    }
}
