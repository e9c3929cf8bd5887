use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{Reclaim, SubInterval};

/// Lifecycle of one worker slot.
///
/// A slot only goes back to `Running` after its previous outcome has been
/// taken out as `Harvested`, so no result is ever overwritten unread.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SlotState {
    Idle,
    Running(SubInterval),
    Finished(SubInterval, f64),
    Failed(SubInterval, String),
    Harvested,
}

impl SlotState {
    fn is_done(&self) -> bool {
        matches!(self, SlotState::Finished(..) | SlotState::Failed(..))
    }
}

/// Outcome taken out of a slot by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Harvest {
    pub slot: usize,
    pub sub_interval: SubInterval,
    pub outcome: Result<f64, String>,
}

/// Fixed-size table of worker slots shared between the orchestrator and
/// the workers. Workers publish under the mutex and signal the condvar.
pub(crate) struct SlotTable {
    states: Mutex<Vec<SlotState>>,
    done: Condvar,
}

impl SlotTable {
    pub fn new(slot_count: usize) -> Self {
        Self {
            states: Mutex::new(vec![SlotState::Idle; slot_count]),
            done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SlotState>> {
        self.states.lock()
    }

    pub fn start(&self, slot: usize, sub_interval: SubInterval) {
        let mut states = self.lock();
        debug_assert!(!states[slot].is_done(), "slot {} reassigned before harvest", slot);
        states[slot] = SlotState::Running(sub_interval);
    }

    /// Called by a worker once its sub-interval is integrated.
    pub fn complete(&self, slot: usize, sub_interval: SubInterval, outcome: Result<f64, String>) {
        {
            let mut states = self.lock();
            states[slot] = match outcome {
                Ok(value) => SlotState::Finished(sub_interval, value),
                Err(message) => SlotState::Failed(sub_interval, message),
            };
        }
        self.done.notify_one();
    }

    /// Waits until some slot is done and harvests the first one in slot
    /// order. Only one slot is harvested per call.
    pub fn reclaim(&self, reclaim: Reclaim) -> Harvest {
        match reclaim {
            Reclaim::Block => {
                let mut states = self.lock();
                loop {
                    if let Some(harvest) = Self::harvest_first(&mut states) {
                        return harvest;
                    }
                    self.done.wait(&mut states);
                }
            }
            Reclaim::Spin => loop {
                if let Some(harvest) = Self::harvest_first(&mut self.lock()) {
                    return harvest;
                }
                std::hint::spin_loop();
            },
        }
    }

    /// Waits for every running slot, then takes out all outcomes that were
    /// never harvested, in slot order.
    pub fn drain(&self, reclaim: Reclaim) -> Vec<Harvest> {
        let mut states = match reclaim {
            Reclaim::Block => {
                let mut states = self.lock();
                self.done.wait_while(&mut states, |states| Self::any_running(states));
                states
            }
            Reclaim::Spin => loop {
                let states = self.lock();
                if !Self::any_running(&states) {
                    break states;
                }
                drop(states);
                std::hint::spin_loop();
            },
        };

        let mut harvests = Vec::new();
        while let Some(harvest) = Self::harvest_first(&mut states) {
            harvests.push(harvest);
        }
        harvests
    }

    fn any_running(states: &[SlotState]) -> bool {
        states.iter().any(|state| matches!(state, SlotState::Running(_)))
    }

    fn harvest_first(states: &mut [SlotState]) -> Option<Harvest> {
        let slot = states.iter().position(SlotState::is_done)?;
        let harvest = match std::mem::replace(&mut states[slot], SlotState::Harvested) {
            SlotState::Finished(sub_interval, value) => Harvest {
                slot,
                sub_interval,
                outcome: Ok(value),
            },
            SlotState::Failed(sub_interval, message) => Harvest {
                slot,
                sub_interval,
                outcome: Err(message),
            },
            _ => unreachable!("position() only matches finished or failed slots"),
        };
        Some(harvest)
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<SlotState> {
        self.lock().clone()
    }
}
