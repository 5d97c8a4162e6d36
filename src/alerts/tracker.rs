//! Per-(probe, channel) send history

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Last successful send per probe and channel.
///
/// Entries are only written after a channel reports success, and are kept
/// for the lifetime of the process. A send in progress holds a [`SendClaim`]
/// on its key so that concurrent dispatches cannot both pass the interval
/// check.
#[derive(Debug, Default)]
pub struct AlertTracker {
    last_sent: RwLock<HashMap<String, HashMap<String, Instant>>>,
    in_flight: Mutex<HashSet<(String, String)>>,
}

impl AlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing was sent yet for this key, or when at least
    /// `min_interval` has elapsed since the last recorded send.
    pub fn can_send(&self, probe: &str, channel: &str, min_interval: Duration) -> bool {
        match self.last_sent(probe, channel) {
            Some(at) => at.elapsed() >= min_interval,
            None => true,
        }
    }

    /// Record a successful send at the current instant
    pub fn record_send(&self, probe: &str, channel: &str) {
        let mut last_sent = self.last_sent.write();
        last_sent
            .entry(probe.to_string())
            .or_default()
            .insert(channel.to_string(), Instant::now());
    }

    /// Claim the key for one send when the interval has elapsed and no other
    /// send is in progress. The claim is released when dropped; it records
    /// the send only if [`SendClaim::succeeded`] was called.
    pub fn try_claim(
        &self,
        probe: &str,
        channel: &str,
        min_interval: Duration,
    ) -> Option<SendClaim<'_>> {
        let mut in_flight = self.in_flight.lock();
        let key = (probe.to_string(), channel.to_string());
        if in_flight.contains(&key) || !self.can_send(probe, channel, min_interval) {
            return None;
        }
        in_flight.insert(key.clone());
        Some(SendClaim {
            tracker: self,
            key,
            succeeded: false,
        })
    }

    pub fn last_sent(&self, probe: &str, channel: &str) -> Option<Instant> {
        self.last_sent
            .read()
            .get(probe)
            .and_then(|channels| channels.get(channel))
            .copied()
    }

    /// Number of recorded (probe, channel) keys
    pub fn len(&self) -> usize {
        self.last_sent.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive right to send one alert for a (probe, channel) key
#[derive(Debug)]
pub struct SendClaim<'a> {
    tracker: &'a AlertTracker,
    key: (String, String),
    succeeded: bool,
}

impl SendClaim<'_> {
    /// Mark the send as delivered; recorded when the claim is dropped
    pub fn succeeded(mut self) {
        self.succeeded = true;
    }
}

impl Drop for SendClaim<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.tracker.in_flight.lock();
        if self.succeeded {
            self.tracker.record_send(&self.key.0, &self.key.1);
        }
        in_flight.remove(&self.key);
    }
}
