//! Snapshot / speculate / reconcile-or-restore, shared by every store that
//! updates local state ahead of the server.

/// A speculative change that has been applied but not yet confirmed.
///
/// Holds the exact pre-change state so a failed request can put it back
/// untouched.
#[derive(Debug, Clone)]
#[must_use = "a pending mutation must be committed or rolled back"]
pub struct PendingMutation<S: Clone> {
    snapshot: S,
}

impl<S: Clone> PendingMutation<S> {
    /// Snapshots `state`, then applies `speculate` to it.
    pub fn begin(state: &mut S, speculate: impl FnOnce(&mut S)) -> Self {
        let snapshot = state.clone();
        speculate(state);
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &S {
        &self.snapshot
    }

    /// Replaces the speculative state with server truth.
    pub fn commit(self, state: &mut S, reconcile: impl FnOnce(&mut S)) {
        reconcile(state);
    }

    /// Restores the pre-change snapshot.
    pub fn rollback(self, state: &mut S) {
        *state = self.snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        value: i32,
        label: Option<String>,
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let mut state = Counter {
            value: 3,
            label: None,
        };
        let original = state.clone();

        let pending = PendingMutation::begin(&mut state, |s| {
            s.value += 1;
            s.label = Some("speculative".into());
        });
        assert_eq!(state.value, 4);
        assert_eq!(pending.snapshot(), &original);

        pending.rollback(&mut state);
        assert_eq!(state, original);
    }

    #[test]
    fn test_commit_applies_reconciliation() {
        let mut state = Counter {
            value: 3,
            label: None,
        };

        let pending = PendingMutation::begin(&mut state, |s| s.value += 1);
        pending.commit(&mut state, |s| {
            s.value = 10;
            s.label = Some("server".into());
        });

        assert_eq!(state.value, 10);
        assert_eq!(state.label.as_deref(), Some("server"));
    }
}
