//! Staged toggle sequencing.
//!
//! A header click flips the node immediately, propagates to group members a
//! moment later, and commits the document snapshot once the transition has
//! finished. Each toggle gets a [`SequenceToken`]; starting a new toggle for the
//! same node drops whatever the previous one still had pending.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;

pub const PROPAGATE_DELAY: Duration = Duration::from_millis(50);
pub const COMMIT_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceToken(u64);

impl SequenceToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ToggleStage {
    VisualToggled,
    Propagated,
    Committed,
}

impl ToggleStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::VisualToggled => "visual-toggled",
            Self::Propagated => "propagated",
            Self::Committed => "committed",
        }
    }
}

/// A continuation that became due. `stage` is the stage the sequence reaches
/// once the caller has run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredStep {
    pub node_id: String,
    pub token: SequenceToken,
    pub stage: ToggleStage,
    pub due: Duration,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    next_token: u64,
    pending: Vec<DeferredStep>,
    sequences: BTreeMap<String, (SequenceToken, ToggleStage)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a toggle sequence for `node_id`, superseding any sequence the
    /// node still has in flight.
    pub fn begin(&mut self, node_id: &str) -> SequenceToken {
        self.next_token += 1;
        let token = SequenceToken(self.next_token);

        let before = self.pending.len();
        self.pending.retain(|step| step.node_id != node_id);
        let superseded = before - self.pending.len();
        if superseded > 0 {
            debug!(node_id, superseded, token = token.value(), "toggle superseded pending steps");
        }

        for (stage, delay) in [
            (ToggleStage::Propagated, PROPAGATE_DELAY),
            (ToggleStage::Committed, COMMIT_DELAY),
        ] {
            self.pending.push(DeferredStep {
                node_id: node_id.to_owned(),
                token,
                stage,
                due: self.now + delay,
            });
        }
        self.sequences
            .insert(node_id.to_owned(), (token, ToggleStage::VisualToggled));
        token
    }

    /// Moves the clock forward and hands back every step that became due, in
    /// due order. Stages are recorded as reached when they are handed out.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<DeferredStep> {
        self.now += elapsed;
        let now = self.now;

        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|step| step.due <= now);
        self.pending = pending;
        due.sort_by_key(|step| (step.due, step.token));

        for step in &due {
            self.sequences
                .insert(step.node_id.clone(), (step.token, step.stage));
        }
        due
    }

    /// Time until the next pending step, if any.
    pub fn next_due_in(&self) -> Option<Duration> {
        self.pending
            .iter()
            .map(|step| step.due.saturating_sub(self.now))
            .min()
    }

    pub fn stage(&self, node_id: &str) -> Option<ToggleStage> {
        self.sequences.get(node_id).map(|(_, stage)| *stage)
    }

    pub fn is_current(&self, node_id: &str, token: SequenceToken) -> bool {
        self.sequences
            .get(node_id)
            .is_some_and(|(current, _)| *current == token)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn now(&self) -> Duration {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Scheduler, ToggleStage};

    #[test]
    fn steps_fire_in_order_after_their_delays() {
        let mut scheduler = Scheduler::new();
        let token = scheduler.begin("n1");
        assert_eq!(scheduler.stage("n1"), Some(ToggleStage::VisualToggled));

        assert!(scheduler.advance(Duration::from_millis(49)).is_empty());
        let propagated = scheduler.advance(Duration::from_millis(1));
        assert_eq!(propagated.len(), 1);
        assert_eq!(propagated[0].stage, ToggleStage::Propagated);
        assert_eq!(propagated[0].token, token);
        assert_eq!(scheduler.stage("n1"), Some(ToggleStage::Propagated));

        assert_eq!(scheduler.next_due_in(), Some(Duration::from_millis(250)));
        let committed = scheduler.advance(Duration::from_millis(250));
        assert_eq!(committed[0].stage, ToggleStage::Committed);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn second_toggle_supersedes_the_first() {
        let mut scheduler = Scheduler::new();
        let first = scheduler.begin("n1");
        scheduler.advance(Duration::from_millis(100));
        let second = scheduler.begin("n1");

        assert!(!scheduler.is_current("n1", first));
        assert!(scheduler.is_current("n1", second));

        let steps = scheduler.advance(Duration::from_secs(1));
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|step| step.token == second));
    }

    #[test]
    fn sequences_of_different_nodes_do_not_interfere() {
        let mut scheduler = Scheduler::new();
        scheduler.begin("a");
        scheduler.begin("b");

        let steps = scheduler.advance(Duration::from_millis(300));
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].node_id, "a");
        assert_eq!(steps[1].node_id, "b");
        assert_eq!(scheduler.stage("a"), Some(ToggleStage::Committed));
        assert_eq!(scheduler.stage("b"), Some(ToggleStage::Committed));
    }
}
