use tracing::debug;

/// Permission to swallow exactly one host history push.
#[derive(Debug, PartialEq, Eq)]
pub struct HistoryToken {
    id: u64,
}

impl HistoryToken {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Holds at most one armed token. Batch operations arm it right before they
/// write a snapshot back, and the next history push consumes it.
#[derive(Debug, Default)]
pub struct HistoryGuard {
    armed: Option<HistoryToken>,
    next_id: u64,
    consumed: u64,
}

impl HistoryGuard {
    pub fn arm(&mut self) -> u64 {
        self.next_id += 1;
        if let Some(stale) = self.armed.replace(HistoryToken { id: self.next_id }) {
            debug!(token = stale.id(), "replacing unconsumed history token");
        }
        self.next_id
    }

    pub fn consume(&mut self) -> Option<HistoryToken> {
        let token = self.armed.take()?;
        self.consumed += 1;
        debug!(token = token.id(), "history push suppressed by token");
        Some(token)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// How many pushes have been suppressed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}
