use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::*;

use super::slots::SlotGrid;

/// How the endpoints of the eventual interval are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Both endpoints come from the selection.
    #[default]
    Range,
    /// Only the start is chosen; the selection runs to the end of the day.
    StartOpen,
    /// Only the end is chosen; the selection runs from the start of the day.
    EndOpen,
}

/// In-progress slot selection for one booking form.
///
/// `selected` is always empty or a contiguous run of the grid it was built
/// against. Values are immutable; [`SelectionState::toggle`] returns the
/// next state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    mode: SelectionMode,
    selected: BTreeSet<SlotId>,
    effective_start: Option<Ms>,
    effective_end: Option<Ms>,
}

impl SelectionState {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn selected(&self) -> &BTreeSet<SlotId> {
        &self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn head(&self) -> Option<SlotId> {
        self.selected.first().copied()
    }

    pub fn tail(&self) -> Option<SlotId> {
        self.selected.last().copied()
    }

    /// Start of the interval being built. `None` while empty or end-open.
    pub fn effective_start(&self) -> Option<Ms> {
        self.effective_start
    }

    /// End of the interval being built. `None` while empty or start-open.
    pub fn effective_end(&self) -> Option<Ms> {
        self.effective_end
    }

    /// The selected slots, in grid order.
    pub fn selected_slots(&self, grid: &SlotGrid) -> Vec<TimeSlot> {
        self.selected
            .iter()
            .filter_map(|id| grid.get(*id).copied())
            .collect()
    }

    /// Bounding span of the selected slots, regardless of mode.
    pub fn span(&self, grid: &SlotGrid) -> Option<Span> {
        let head = grid.get(self.head()?)?;
        let tail = grid.get(self.tail()?)?;
        Some(Span::new(head.start, tail.end))
    }

    /// Empty selection in the same mode.
    pub fn cleared(&self) -> Self {
        Self::new(self.mode)
    }

    /// Switching mode discards the selection.
    pub fn with_mode(&self, mode: SelectionMode) -> Self {
        if mode == self.mode {
            self.clone()
        } else {
            Self::new(mode)
        }
    }

    /// Apply a toggle on `slot`. Ids not on the grid leave the state unchanged.
    pub fn toggle(&self, grid: &SlotGrid, slot: SlotId) -> Self {
        if grid.position(slot).is_none() {
            tracing::debug!("toggle ignored: slot {slot} not on grid");
            return self.clone();
        }
        match self.mode {
            SelectionMode::Range => self.toggle_range(grid, slot),
            SelectionMode::StartOpen => {
                if self.head() == Some(slot) {
                    self.cleared()
                } else {
                    self.with_run(grid.from_slot(slot))
                }
            }
            SelectionMode::EndOpen => {
                if self.tail() == Some(slot) {
                    self.cleared()
                } else {
                    self.with_run(grid.through_slot(slot))
                }
            }
        }
    }

    fn toggle_range(&self, grid: &SlotGrid, slot: SlotId) -> Self {
        let (Some(head), Some(tail)) = (self.head(), self.tail()) else {
            return self.with_run(grid.run(slot, slot));
        };

        if head == tail {
            // Exactly one selected.
            return if slot == head {
                self.cleared()
            } else {
                self.with_run(grid.run(head, slot))
            };
        }

        // A run of two or more: only its ends may be toggled off.
        if slot == head {
            let next = self.selected.iter().nth(1).copied().unwrap_or(tail);
            self.with_run(grid.run(next, tail))
        } else if slot == tail {
            let prev = self.selected.iter().rev().nth(1).copied().unwrap_or(head);
            self.with_run(grid.run(head, prev))
        } else {
            self.cleared()
        }
    }

    fn with_run(&self, run: Option<&[TimeSlot]>) -> Self {
        let run = run.unwrap_or_default();
        let (Some(first), Some(last)) = (run.first(), run.last()) else {
            return self.cleared();
        };
        let (effective_start, effective_end) = match self.mode {
            SelectionMode::Range => (Some(first.start), Some(last.end)),
            SelectionMode::StartOpen => (Some(first.start), None),
            SelectionMode::EndOpen => (None, Some(last.end)),
        };
        Self {
            mode: self.mode,
            selected: run.iter().map(Span::id).collect(),
            effective_start,
            effective_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, NaiveTime};

    use super::super::slots::OperatingWindow;
    use super::*;

    /// 08:00–12:00 in 30-minute slots: ids s[0]..s[7].
    fn grid() -> (SlotGrid, Vec<SlotId>) {
        let window = OperatingWindow::new(
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            30 * MINUTE_MS,
        );
        let grid = SlotGrid::generate(
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            &window,
            &FixedOffset::east_opt(0).unwrap(),
        )
        .unwrap();
        let ids = grid.slots().iter().map(Span::id).collect();
        (grid, ids)
    }

    fn ids(state: &SelectionState) -> Vec<SlotId> {
        state.selected().iter().copied().collect()
    }

    #[test]
    fn range_first_toggle_selects_single() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::Range).toggle(&g, s[2]);
        assert_eq!(ids(&st), vec![s[2]]);
        assert_eq!(st.effective_start(), Some(s[2]));
        assert_eq!(st.effective_end(), Some(s[3]));
    }

    #[test]
    fn range_second_toggle_fills_forward() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::Range)
            .toggle(&g, s[1])
            .toggle(&g, s[4]);
        assert_eq!(ids(&st), s[1..=4].to_vec());
        assert_eq!(st.effective_start(), Some(s[1]));
        assert_eq!(st.effective_end(), Some(g.slots()[4].end));
    }

    #[test]
    fn range_second_toggle_fills_backward() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::Range)
            .toggle(&g, s[5])
            .toggle(&g, s[2]);
        assert_eq!(ids(&st), s[2..=5].to_vec());
        assert_eq!(st.span(&g), Some(Span::new(s[2], g.slots()[5].end)));
    }

    #[test]
    fn range_toggle_sole_clears() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::Range)
            .toggle(&g, s[3])
            .toggle(&g, s[3]);
        assert!(st.is_empty());
        assert_eq!(st.effective_start(), None);
        assert_eq!(st.effective_end(), None);
    }

    #[test]
    fn range_toggle_head_shrinks() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::Range)
            .toggle(&g, s[1])
            .toggle(&g, s[3]);
        assert_eq!(ids(&st), vec![s[1], s[2], s[3]]);
        let st = st.toggle(&g, s[1]);
        assert_eq!(ids(&st), vec![s[2], s[3]]);
        assert_eq!(st.effective_start(), Some(s[2]));
    }

    #[test]
    fn range_toggle_tail_shrinks() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::Range)
            .toggle(&g, s[1])
            .toggle(&g, s[3])
            .toggle(&g, s[3]);
        assert_eq!(ids(&st), vec![s[1], s[2]]);
        assert_eq!(st.effective_end(), Some(s[3]));
    }

    #[test]
    fn range_toggle_middle_clears() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::Range)
            .toggle(&g, s[1])
            .toggle(&g, s[3])
            .toggle(&g, s[2]);
        assert!(st.is_empty());
    }

    #[test]
    fn range_toggle_outside_run_clears() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::Range)
            .toggle(&g, s[1])
            .toggle(&g, s[3])
            .toggle(&g, s[6]);
        assert!(st.is_empty());
    }

    #[test]
    fn range_two_slots_shrink_to_one() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::Range)
            .toggle(&g, s[1])
            .toggle(&g, s[2])
            .toggle(&g, s[2]);
        assert_eq!(ids(&st), vec![s[1]]);
        assert_eq!(st.effective_end(), Some(s[2]));
    }

    #[test]
    fn start_open_selects_rest_of_day() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::StartOpen).toggle(&g, s[5]);
        assert_eq!(ids(&st), s[5..].to_vec());
        assert_eq!(st.effective_start(), Some(s[5]));
        assert_eq!(st.effective_end(), None);
        assert!(st.toggle(&g, s[5]).is_empty());
    }

    #[test]
    fn start_open_reanchors() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::StartOpen)
            .toggle(&g, s[5])
            .toggle(&g, s[2]);
        assert_eq!(ids(&st), s[2..].to_vec());
        assert_eq!(st.effective_start(), Some(s[2]));
    }

    #[test]
    fn end_open_selects_start_of_day() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::EndOpen).toggle(&g, s[2]);
        assert_eq!(ids(&st), s[..=2].to_vec());
        assert_eq!(st.effective_start(), None);
        assert_eq!(st.effective_end(), Some(g.slots()[2].end));
        assert!(st.toggle(&g, s[2]).is_empty());
    }

    #[test]
    fn unknown_slot_is_noop() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::Range).toggle(&g, s[1]);
        assert_eq!(st.toggle(&g, s[1] + 1), st);
    }

    #[test]
    fn mode_switch_clears() {
        let (g, s) = grid();
        let st = SelectionState::new(SelectionMode::Range).toggle(&g, s[1]);
        assert_eq!(st.with_mode(SelectionMode::Range), st);
        let switched = st.with_mode(SelectionMode::EndOpen);
        assert!(switched.is_empty());
        assert_eq!(switched.mode(), SelectionMode::EndOpen);
    }

    #[test]
    fn every_transition_stays_contiguous() {
        let (g, s) = grid();
        let sequence = [3, 6, 6, 3, 4, 0, 1, 7, 7, 2, 5, 2, 1];
        for mode in [SelectionMode::Range, SelectionMode::StartOpen, SelectionMode::EndOpen] {
            let mut st = SelectionState::new(mode);
            for &i in &sequence {
                st = st.toggle(&g, s[i]);
                assert!(g.is_contiguous(st.selected()), "{mode:?} after {i}");
            }
        }
    }
}
