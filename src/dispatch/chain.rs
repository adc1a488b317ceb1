//! Priority-ordered backend chain with forward-only demotion.

use std::sync::Arc;

use super::backend::DeliveryBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Standby,
    Active,
    Demoted,
}

/// A backend switch that happened during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    pub from: String,
    /// `None` when nothing is left to take over
    pub to: Option<String>,
}

/// The backends of one run.
///
/// At most one slot is active. Demotion only moves forward through the list
/// and a demoted backend is never re-activated. A delivery failure switches
/// backends at most once per run; later failures leave the active backend in
/// place.
pub struct BackendChain {
    backends: Vec<Arc<dyn DeliveryBackend>>,
    states: Vec<SlotState>,
    active: Option<usize>,
    demoted: Vec<String>,
    /// A failure has already triggered the run's one fallback
    fell_back: bool,
}

impl BackendChain {
    /// Build the chain from the backends available right now, keeping order
    pub fn new(backends: &[Arc<dyn DeliveryBackend>]) -> Self {
        let backends: Vec<_> = backends
            .iter()
            .filter(|backend| backend.is_available())
            .cloned()
            .collect();

        let mut states = vec![SlotState::Standby; backends.len()];
        let active = if backends.is_empty() {
            None
        } else {
            states[0] = SlotState::Active;
            Some(0)
        };

        Self {
            backends,
            states,
            active,
            demoted: Vec::new(),
            fell_back: false,
        }
    }

    pub fn active(&self) -> Option<&Arc<dyn DeliveryBackend>> {
        self.active.map(|index| &self.backends[index])
    }

    pub fn active_name(&self) -> Option<String> {
        self.active().map(|backend| backend.name().to_string())
    }

    /// Names of demoted backends, in demotion order
    pub fn demoted(&self) -> &[String] {
        &self.demoted
    }

    /// Whether a delivery failure has already caused a switch
    pub fn has_fallen_back(&self) -> bool {
        self.fell_back
    }

    /// Demote the active backend after a failed attempt.
    ///
    /// Only the first failure of a run switches, and only when a later
    /// backend is available. Otherwise the active backend stays in place.
    pub fn demote_after_failure(&mut self) -> Option<Fallback> {
        if self.fell_back {
            return None;
        }
        let current = self.active?;
        let next = self.next_available(current)?;
        self.fell_back = true;
        Some(self.switch(current, Some(next)))
    }

    /// Demote the active backend if it stopped reporting itself available.
    ///
    /// Not bounded by the failure fallback, since an unavailable backend
    /// cannot be kept. May leave the chain without an active backend.
    pub fn ensure_available(&mut self) -> Option<Fallback> {
        let current = self.active?;
        if self.backends[current].is_available() {
            return None;
        }
        let next = self.next_available(current);
        Some(self.switch(current, next))
    }

    fn next_available(&self, after: usize) -> Option<usize> {
        (after + 1..self.backends.len()).find(|&index| {
            self.states[index] == SlotState::Standby && self.backends[index].is_available()
        })
    }

    fn switch(&mut self, from: usize, to: Option<usize>) -> Fallback {
        self.states[from] = SlotState::Demoted;
        let from_name = self.backends[from].name().to_string();
        self.demoted.push(from_name.clone());

        if let Some(to) = to {
            self.states[to] = SlotState::Active;
        }
        self.active = to;

        Fallback {
            from: from_name,
            to: to.map(|index| self.backends[index].name().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;

    fn chain_of(backends: &[Arc<MemoryBackend>]) -> BackendChain {
        let dyn_backends: Vec<Arc<dyn DeliveryBackend>> = backends
            .iter()
            .map(|b| b.clone() as Arc<dyn DeliveryBackend>)
            .collect();
        BackendChain::new(&dyn_backends)
    }

    #[test]
    fn test_skips_unavailable_at_start() {
        let a = Arc::new(MemoryBackend::named("a"));
        let b = Arc::new(MemoryBackend::named("b"));
        a.set_available(false);

        let chain = chain_of(&[a, b]);
        assert_eq!(chain.active_name().as_deref(), Some("b"));
    }

    #[test]
    fn test_empty_chain() {
        let chain = BackendChain::new(&[]);
        assert!(chain.active().is_none());
    }

    #[test]
    fn test_failure_falls_back_only_once() {
        let a = Arc::new(MemoryBackend::named("a"));
        let b = Arc::new(MemoryBackend::named("b"));
        let c = Arc::new(MemoryBackend::named("c"));
        let mut chain = chain_of(&[a, b, c]);

        let fallback = chain.demote_after_failure().unwrap();
        assert_eq!(fallback.from, "a");
        assert_eq!(fallback.to.as_deref(), Some("b"));
        assert!(chain.has_fallen_back());

        // b keeps serving after its own failure even though c is available
        assert!(chain.demote_after_failure().is_none());
        assert!(chain.demote_after_failure().is_none());
        assert_eq!(chain.active_name().as_deref(), Some("b"));
        assert_eq!(chain.demoted(), ["a"]);
    }

    #[test]
    fn test_last_resort_failure_does_not_use_up_fallback() {
        let a = Arc::new(MemoryBackend::named("a"));
        let mut chain = chain_of(&[a]);

        assert!(chain.demote_after_failure().is_none());
        assert!(!chain.has_fallen_back());
        assert_eq!(chain.active_name().as_deref(), Some("a"));
    }

    #[test]
    fn test_unavailability_after_fallback_still_moves_forward() {
        let a = Arc::new(MemoryBackend::named("a"));
        let b = Arc::new(MemoryBackend::named("b"));
        let c = Arc::new(MemoryBackend::named("c"));
        let mut chain = chain_of(&[a, b.clone(), c]);

        chain.demote_after_failure().unwrap();
        b.set_available(false);

        let fallback = chain.ensure_available().unwrap();
        assert_eq!(fallback.from, "b");
        assert_eq!(fallback.to.as_deref(), Some("c"));
        assert_eq!(chain.demoted(), ["a", "b"]);
    }

    #[test]
    fn test_demote_skips_backend_that_went_unavailable() {
        let a = Arc::new(MemoryBackend::named("a"));
        let b = Arc::new(MemoryBackend::named("b"));
        let c = Arc::new(MemoryBackend::named("c"));
        let mut chain = chain_of(&[a, b.clone(), c]);

        b.set_available(false);
        let fallback = chain.demote_after_failure().unwrap();
        assert_eq!(fallback.to.as_deref(), Some("c"));
    }

    #[test]
    fn test_ensure_available_exhausts() {
        let a = Arc::new(MemoryBackend::named("a"));
        let mut chain = chain_of(&[a.clone()]);

        assert!(chain.ensure_available().is_none());

        a.set_available(false);
        let fallback = chain.ensure_available().unwrap();
        assert_eq!(fallback.from, "a");
        assert!(fallback.to.is_none());
        assert!(chain.active().is_none());

        // Never re-promoted, even if it comes back
        a.set_available(true);
        assert!(chain.ensure_available().is_none());
        assert!(chain.active().is_none());
    }
}
