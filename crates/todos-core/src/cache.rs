//! Keyed query cache
//!
//! Holds the last successful result of one logical query. Every fetch is
//! issued a `Ticket`; results are applied in ticket order so a slow,
//! older response can never overwrite a newer one. A failed fetch keeps
//! the previous value and only records the error.

use std::fmt::Display;

/// Identifies one fetch issued against a cache slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket {
    seq: u64,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// What happened to a completed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The result replaced the cached value
    Applied,
    /// A newer result was already applied; this one was dropped
    Stale,
    /// The fetch failed; the cached value is unchanged
    Failed,
}

/// Cache slot for a single query key
#[derive(Debug)]
pub struct QueryCache<T> {
    key: &'static str,
    data: Option<T>,
    error: Option<String>,
    next_seq: u64,
    applied_seq: Option<u64>,
    in_flight: usize,
    invalidations: u64,
}

impl<T> QueryCache<T> {
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            data: None,
            error: None,
            next_seq: 0,
            applied_seq: None,
            in_flight: 0,
            invalidations: 0,
        }
    }

    /// Logical key of this slot
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Last successfully fetched value, if any
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Error from the most recent failed fetch, cleared by the next success
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether any fetch is still outstanding
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Number of invalidations seen so far
    pub fn invalidations(&self) -> u64 {
        self.invalidations
    }

    /// Start a fetch and get the ticket its result must be completed with
    pub fn begin_fetch(&mut self) -> Ticket {
        self.next_seq += 1;
        self.in_flight += 1;
        Ticket {
            seq: self.next_seq,
        }
    }

    /// Mark the slot stale; returns the ticket for the refetch this requires
    pub fn invalidate(&mut self) -> Ticket {
        self.invalidations += 1;
        self.begin_fetch()
    }

    /// Record the outcome of the fetch identified by `ticket`
    pub fn complete<E: Display>(&mut self, ticket: Ticket, result: Result<T, E>) -> Completion {
        self.in_flight = self.in_flight.saturating_sub(1);

        match result {
            Ok(value) => {
                if self.applied_seq.is_some_and(|applied| applied > ticket.seq) {
                    return Completion::Stale;
                }
                self.data = Some(value);
                self.applied_seq = Some(ticket.seq);
                self.error = None;
                Completion::Applied
            }
            Err(e) => {
                // A failure older than the applied value says nothing new
                if self.applied_seq.is_some_and(|applied| applied > ticket.seq) {
                    return Completion::Stale;
                }
                self.error = Some(e.to_string());
                Completion::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_slot_is_empty() {
        let cache: QueryCache<Vec<u32>> = QueryCache::new("todosList");
        assert_eq!(cache.key(), "todosList");
        assert!(cache.data().is_none());
        assert!(cache.error().is_none());
        assert!(!cache.is_loading());
    }

    #[test]
    fn test_success_applies_and_clears_error() {
        let mut cache = QueryCache::new("k");
        let t1 = cache.begin_fetch();
        assert!(cache.is_loading());
        assert_eq!(cache.complete::<String>(t1, Err("down".into())), Completion::Failed);
        assert_eq!(cache.error(), Some("down"));

        let t2 = cache.invalidate();
        assert_eq!(cache.complete::<String>(t2, Ok(vec![1])), Completion::Applied);
        assert_eq!(cache.data(), Some(&vec![1]));
        assert!(cache.error().is_none());
        assert!(!cache.is_loading());
    }

    #[test]
    fn test_failure_keeps_previous_value() {
        let mut cache = QueryCache::new("k");
        let t1 = cache.begin_fetch();
        cache.complete::<String>(t1, Ok(vec![1, 2]));

        let t2 = cache.invalidate();
        assert_eq!(
            cache.complete::<String>(t2, Err("timeout".into())),
            Completion::Failed
        );
        assert_eq!(cache.data(), Some(&vec![1, 2]));
        assert_eq!(cache.error(), Some("timeout"));
    }

    #[test]
    fn test_stale_result_is_dropped() {
        let mut cache = QueryCache::new("k");
        let older = cache.invalidate();
        let newer = cache.invalidate();
        assert!(newer > older);

        assert_eq!(cache.complete::<String>(newer, Ok("new")), Completion::Applied);
        assert_eq!(cache.complete::<String>(older, Ok("old")), Completion::Stale);
        assert_eq!(cache.data(), Some(&"new"));
        assert!(!cache.is_loading());
        assert_eq!(cache.invalidations(), 2);
    }

    #[test]
    fn test_in_order_results_both_apply() {
        let mut cache = QueryCache::new("k");
        let first = cache.invalidate();
        let second = cache.invalidate();

        assert_eq!(cache.complete::<String>(first, Ok(1)), Completion::Applied);
        assert_eq!(cache.complete::<String>(second, Ok(2)), Completion::Applied);
        assert_eq!(cache.data(), Some(&2));
    }

    #[test]
    fn test_old_failure_after_newer_success_is_stale() {
        let mut cache = QueryCache::new("k");
        let older = cache.invalidate();
        let newer = cache.invalidate();

        cache.complete::<String>(newer, Ok(5));
        assert_eq!(
            cache.complete::<String>(older, Err("late".into())),
            Completion::Stale
        );
        assert!(cache.error().is_none());
    }
}
