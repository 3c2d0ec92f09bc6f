//! Set of endpoints a sensor fans its change events out to.

use super::endpoint::Endpoint;
use parking_lot::RwLock;

/// Registration-ordered endpoint set, safe to mutate while the listener
/// delivers.
///
/// The listener never iterates the live list: it takes a [`snapshot`] and
/// delivers to that, so subscribing or unsubscribing during a delivery round
/// only affects the next change.
///
/// [`snapshot`]: SubscriberRegistry::snapshot
pub struct SubscriberRegistry<T> {
    endpoints: RwLock<Vec<Endpoint<T>>>,
}

impl<T> SubscriberRegistry<T> {
    pub fn new() -> Self {
        Self {
            endpoints: RwLock::new(Vec::new()),
        }
    }

    /// Add an endpoint. Returns false if it was already registered.
    pub fn add(&self, endpoint: Endpoint<T>) -> bool {
        let mut endpoints = self.endpoints.write();
        if endpoints.contains(&endpoint) {
            return false;
        }
        endpoints.push(endpoint);
        true
    }

    /// Remove an endpoint. Returns false if it was not registered.
    pub fn remove(&self, endpoint: &Endpoint<T>) -> bool {
        let mut endpoints = self.endpoints.write();
        match endpoints.iter().position(|e| e == endpoint) {
            Some(i) => {
                endpoints.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, endpoint: &Endpoint<T>) -> bool {
        self.endpoints.read().contains(endpoint)
    }

    /// Copy of the current membership.
    pub fn snapshot(&self) -> Vec<Endpoint<T>> {
        self.endpoints.read().clone()
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }

    /// Drop endpoints whose receiver is gone. Returns how many were removed.
    pub fn prune_closed(&self) -> usize {
        let mut endpoints = self.endpoints.write();
        let before = endpoints.len();
        endpoints.retain(|e| !e.is_closed());
        before - endpoints.len()
    }
}

impl<T> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_double_add_is_single_add() {
        let registry = SubscriberRegistry::<u8>::new();
        let (ep, _rx) = Endpoint::channel(1);

        assert!(registry.add(ep.clone()));
        assert!(!registry.add(ep.clone()));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&ep));
        assert!(!registry.remove(&ep));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = SubscriberRegistry::<u8>::new();
        let (a, _rx_a) = Endpoint::channel(1);
        let (b, _rx_b) = Endpoint::channel(1);
        registry.add(a.clone());

        assert!(!registry.remove(&b));
        assert!(registry.contains(&a));
    }

    #[test]
    fn test_snapshot_is_stable() {
        let registry = SubscriberRegistry::<u8>::new();
        let (a, _rx_a) = Endpoint::channel(1);
        let (b, _rx_b) = Endpoint::channel(1);
        registry.add(a.clone());

        let snapshot = registry.snapshot();
        registry.add(b.clone());
        registry.remove(&a);

        assert_eq!(snapshot, vec![a]);
        assert_eq!(registry.snapshot(), vec![b]);
    }

    #[test]
    fn test_registration_order_preserved() {
        let registry = SubscriberRegistry::<u8>::new();
        let pairs: Vec<_> = (0..4).map(|_| Endpoint::channel(1)).collect();
        for (ep, _) in &pairs {
            registry.add(ep.clone());
        }
        registry.remove(&pairs[1].0);

        let expected: Vec<_> = [0, 2, 3].iter().map(|&i| pairs[i].0.clone()).collect();
        assert_eq!(registry.snapshot(), expected);
    }

    #[test]
    fn test_prune_closed() {
        let registry = SubscriberRegistry::<u8>::new();
        let (a, rx_a) = Endpoint::channel(1);
        let (b, _rx_b) = Endpoint::channel(1);
        registry.add(a);
        registry.add(b.clone());

        drop(rx_a);
        assert_eq!(registry.prune_closed(), 1);
        assert_eq!(registry.snapshot(), vec![b]);
    }

    #[test]
    fn test_concurrent_mutation_keeps_net_effect() {
        let registry = Arc::new(SubscriberRegistry::<u8>::new());
        let pairs: Vec<_> = (0..8).map(|_| Endpoint::channel(1)).collect();
        let endpoints: Vec<_> = pairs.iter().map(|(ep, _)| ep.clone()).collect();

        let threads: Vec<_> = endpoints
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, ep)| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        registry.add(ep.clone());
                        let _ = registry.snapshot();
                        registry.remove(&ep);
                    }
                    // Even-numbered endpoints stay subscribed
                    if i % 2 == 0 {
                        registry.add(ep.clone());
                        registry.add(ep);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(registry.len(), 4);
        for (i, ep) in endpoints.iter().enumerate() {
            assert_eq!(registry.contains(ep), i % 2 == 0);
        }
    }
}
