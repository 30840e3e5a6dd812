//! Newest-first event and insight buckets.

use std::collections::{HashSet, VecDeque};

use hw_models::BackendEvent;

/// Which bucket an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    Events,
    Insights,
}

impl BucketKind {
    pub fn for_event(event: &BackendEvent) -> Self {
        if event.is_insight() {
            Self::Insights
        } else {
            Self::Events
        }
    }
}

impl std::fmt::Display for BucketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Events => write!(f, "events"),
            Self::Insights => write!(f, "insights"),
        }
    }
}

/// Push counters captured when a history fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryMark {
    events: u64,
    insights: u64,
}

#[derive(Debug, Clone)]
struct Ring {
    entries: VecDeque<BackendEvent>,
    pushed: u64,
}

impl Ring {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            pushed: 0,
        }
    }

    fn push_front(&mut self, event: BackendEvent, capacity: usize) {
        self.entries.push_front(event);
        self.entries.truncate(capacity);
        self.pushed += 1;
    }

    /// Replace contents with `history`, keeping entries pushed after `mark`
    /// that the history does not already contain on top.
    fn merge(&mut self, mark: u64, history: Vec<BackendEvent>, capacity: usize) {
        let live_count = (self.pushed.saturating_sub(mark) as usize).min(self.entries.len());
        let known: HashSet<&str> = history.iter().map(|e| e.id.as_str()).collect();

        let mut merged: VecDeque<BackendEvent> = self
            .entries
            .iter()
            .take(live_count)
            .filter(|e| !known.contains(e.id.as_str()))
            .cloned()
            .collect();
        drop(known);
        merged.extend(history);
        merged.truncate(capacity);
        self.entries = merged;
    }
}

/// The two bounded newest-first buckets aggregated from inbound events.
#[derive(Debug, Clone)]
pub struct EventBuckets {
    capacity: usize,
    events: Ring,
    insights: Ring,
}

impl EventBuckets {
    /// Create empty buckets holding at most `capacity` entries each.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Ring::new(),
            insights: Ring::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prepend `event` to its bucket, evicting the oldest entry when full.
    pub fn push(&mut self, event: BackendEvent) -> BucketKind {
        let kind = BucketKind::for_event(&event);
        let capacity = self.capacity;
        self.ring_mut(kind).push_front(event, capacity);
        kind
    }

    pub fn events(&self) -> &VecDeque<BackendEvent> {
        &self.events.entries
    }

    pub fn insights(&self) -> &VecDeque<BackendEvent> {
        &self.insights.entries
    }

    pub fn get(&self, kind: BucketKind) -> &VecDeque<BackendEvent> {
        match kind {
            BucketKind::Events => self.events(),
            BucketKind::Insights => self.insights(),
        }
    }

    /// Capture the current push counters before fetching history.
    pub fn mark(&self) -> HistoryMark {
        HistoryMark {
            events: self.events.pushed,
            insights: self.insights.pushed,
        }
    }

    /// Install fetched history for one bucket.
    ///
    /// Live events that arrived after `mark` and are missing from `history`
    /// stay on top, newest first.
    pub fn merge_history(&mut self, kind: BucketKind, mark: HistoryMark, history: Vec<BackendEvent>) {
        let capacity = self.capacity;
        let since = match kind {
            BucketKind::Events => mark.events,
            BucketKind::Insights => mark.insights,
        };
        self.ring_mut(kind).merge(since, history, capacity);
    }

    pub fn clear(&mut self) {
        self.events.entries.clear();
        self.insights.entries.clear();
    }

    fn ring_mut(&mut self, kind: BucketKind) -> &mut Ring {
        match kind {
            BucketKind::Events => &mut self.events,
            BucketKind::Insights => &mut self.insights,
        }
    }
}

impl Default for EventBuckets {
    fn default() -> Self {
        Self::new(hw_core::constants::DEFAULT_BUCKET_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hw_models::EventType;

    fn event(id: &str, event_type: EventType) -> BackendEvent {
        BackendEvent {
            id: id.into(),
            event_type,
            timestamp: "2025-01-01T00:00:00Z".into(),
            message: format!("event {id}"),
            details: None,
            image_url: None,
            data: None,
            severity: None,
        }
    }

    fn ids(bucket: &VecDeque<BackendEvent>) -> Vec<&str> {
        bucket.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_newest_first() {
        let mut buckets = EventBuckets::default();
        for id in ["e1", "e2", "e3"] {
            assert_eq!(buckets.push(event(id, EventType::Predator)), BucketKind::Events);
        }
        assert_eq!(ids(buckets.events()), vec!["e3", "e2", "e1"]);
        assert!(buckets.insights().is_empty());
    }

    #[test]
    fn test_routing_keeps_buckets_disjoint() {
        let mut buckets = EventBuckets::default();
        buckets.push(event("a", EventType::NormalActivity));
        buckets.push(event("b", EventType::Insight));
        buckets.push(event("c", EventType::System));
        buckets.push(event("d", EventType::Other("swarm".into())));
        buckets.push(event("e", EventType::Insight));

        assert_eq!(ids(buckets.events()), vec!["d", "c", "a"]);
        assert_eq!(ids(buckets.insights()), vec!["e", "b"]);
        assert!(buckets.events().iter().all(|e| !e.is_insight()));
        assert!(buckets.get(BucketKind::Insights).iter().all(|e| e.is_insight()));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut buckets = EventBuckets::new(2);
        for id in ["1", "2", "3"] {
            buckets.push(event(id, EventType::System));
        }
        assert_eq!(ids(buckets.events()), vec!["3", "2"]);
        assert_eq!(buckets.capacity(), 2);
    }

    #[test]
    fn test_history_replaces_contents() {
        let mut buckets = EventBuckets::default();
        buckets.push(event("old", EventType::Predator));
        let mark = buckets.mark();

        buckets.merge_history(
            BucketKind::Events,
            mark,
            vec![event("h2", EventType::Predator), event("h1", EventType::System)],
        );
        assert_eq!(ids(buckets.events()), vec!["h2", "h1"]);
    }

    #[test]
    fn test_history_keeps_live_events_from_fetch_window() {
        let mut buckets = EventBuckets::default();
        buckets.push(event("before", EventType::Predator));
        let mark = buckets.mark();

        buckets.push(event("live1", EventType::Predator));
        buckets.push(event("h3", EventType::Predator));
        buckets.push(event("live2", EventType::System));
        buckets.push(event("i-live", EventType::Insight));

        buckets.merge_history(
            BucketKind::Events,
            mark,
            vec![event("h3", EventType::Predator), event("h2", EventType::System)],
        );
        assert_eq!(ids(buckets.events()), vec!["live2", "live1", "h3", "h2"]);

        buckets.merge_history(BucketKind::Insights, mark, vec![event("i-old", EventType::Insight)]);
        assert_eq!(ids(buckets.insights()), vec!["i-live", "i-old"]);
    }

    #[test]
    fn test_history_respects_capacity() {
        let mut buckets = EventBuckets::new(2);
        let mark = buckets.mark();
        buckets.push(event("live", EventType::System));
        buckets.merge_history(
            BucketKind::Events,
            mark,
            vec![event("a", EventType::System), event("b", EventType::System)],
        );
        assert_eq!(ids(buckets.events()), vec!["live", "a"]);
    }
}
