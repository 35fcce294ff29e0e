//! Consumer bookkeeping shared by [`Broker`](crate::Broker) and [`Client`](crate::Client).
//!
//! Each registration remembers the last instance handed to its consumer. The
//! connection fan-out and the synchronous catch-up both go through [`offer`], so one
//! connection event reaches a consumer at most once, whichever path gets there first.

use crate::service::{Consumer, Instance};

pub(crate) struct Registration {
    consumer: Consumer,
    seen: Option<Instance>,
}

impl Registration {
    pub(crate) fn new(consumer: Consumer) -> Self {
        Self {
            consumer,
            seen: None,
        }
    }

    pub(crate) fn consumer(&self) -> &Consumer {
        &self.consumer
    }

    pub(crate) fn is(&self, consumer: &Consumer) -> bool {
        self.consumer.same(consumer)
    }

    /// Records `instance` as delivered. Returns `false` if the consumer already holds it.
    ///
    /// Absence is always delivered and forgets the held instance.
    pub(crate) fn offer(&mut self, instance: Option<&Instance>) -> bool {
        match instance {
            Some(inst) if self.seen.as_ref().is_some_and(|s| s.same(inst)) => false,
            Some(inst) => {
                self.seen = Some(inst.clone());
                true
            }
            None => {
                self.seen = None;
                true
            }
        }
    }
}

/// Offers `instance` to every registration and returns the consumers that must be called.
pub(crate) fn offer(list: &mut [Registration], instance: Option<&Instance>) -> Vec<Consumer> {
    list.iter_mut()
        .filter_map(|r| r.offer(instance).then(|| r.consumer.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::Echo;

    #[test]
    fn same_instance_is_offered_once() {
        let svc = Arc::new(Echo);
        let mut list = vec![
            Registration::new(Consumer::new(|_, _| {})),
            Registration::new(Consumer::new(|_, _| {})),
        ];

        assert_eq!(offer(&mut list, Some(&Instance::new(svc.clone()))).len(), 2);
        assert!(offer(&mut list, Some(&Instance::new(svc.clone()))).is_empty());

        assert_eq!(offer(&mut list, None).len(), 2);
        assert_eq!(offer(&mut list, Some(&Instance::new(svc))).len(), 2);
    }

    #[test]
    fn a_new_connection_is_a_new_event() {
        let mut reg = Registration::new(Consumer::new(|_, _| {}));
        assert!(reg.offer(Some(&Instance::new(Arc::new(Echo)))));
        assert!(reg.offer(Some(&Instance::new(Arc::new(Echo)))));
    }
}
