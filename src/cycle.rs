//! Click cycling for one category on one date.
//!
//! States are `none, option_1, .., option_n`. A click moves `none -> option_1`,
//! `option_i -> option_i+1` and `option_n -> none`; the cycle never terminates.

use crate::models::ActivityKey;

/// The record toggles one click needs, in the order they must be observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickPlan {
    pub deactivate: Option<ActivityKey>,
    pub activate: Option<ActivityKey>,
}

impl ClickPlan {
    /// Toggles in dispatch order.
    pub fn toggles(&self) -> impl Iterator<Item = &ActivityKey> {
        self.deactivate.iter().chain(self.activate.iter())
    }

    pub fn target(&self) -> Option<&ActivityKey> {
        self.activate.as_ref()
    }
}

/// Plans the transition for a click given the currently active option.
///
/// A `current` key that is not one of `options` is deactivated and the cycle
/// restarts at the first option. Returns `None` for an empty option list.
pub fn plan_click(options: &[ActivityKey], current: Option<&ActivityKey>) -> Option<ClickPlan> {
    let first = options.first()?;

    let Some(current) = current else {
        return Some(ClickPlan {
            deactivate: None,
            activate: Some(first.clone()),
        });
    };

    let next = match options.iter().position(|key| key == current) {
        Some(index) => (index + 1) % (options.len() + 1),
        None => 0,
    };

    Some(ClickPlan {
        deactivate: Some(current.clone()),
        activate: options.get(next).cloned(),
    })
}

/// The state after one click.
pub fn next_state(options: &[ActivityKey], current: Option<&ActivityKey>) -> Option<ActivityKey> {
    plan_click(options, current).and_then(|plan| plan.activate)
}
