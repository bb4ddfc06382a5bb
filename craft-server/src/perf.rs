//! Rolling tick-time statistics. A fixed-size ring buffer of the last N tick
//! durations backs both the reported TPS and the mean tick time; the ring
//! is behind a mutex since the tick thread writes and console/status
//! handlers read from elsewhere.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const SAMPLE_WINDOW: usize = 100;
const TARGET_TICK: Duration = Duration::from_millis(50);

pub struct PerfMonitor {
    samples: Mutex<VecDeque<Duration>>,
    ticks_total: AtomicU64,
    ticks_behind_schedule: AtomicU64,
    packets_in: AtomicU64,
    packets_out: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    connections_total: AtomicU64,
}

impl PerfMonitor {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(SAMPLE_WINDOW)),
            ticks_total: AtomicU64::new(0),
            ticks_behind_schedule: AtomicU64::new(0),
            packets_in: AtomicU64::new(0),
            packets_out: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
        }
    }

    pub fn record_packet_in(&self, bytes: usize) {
        self.packets_in.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Folds in a batch of outbound frames drained from a connection's
    /// write side (see `Connection::take_io_stats`).
    pub fn record_packets_out(&self, frames: u64, bytes: u64) {
        self.packets_out.fetch_add(frames, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_connection(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packets_in(&self) -> u64 {
        self.packets_in.load(Ordering::Relaxed)
    }

    pub fn packets_out(&self) -> u64 {
        self.packets_out.load(Ordering::Relaxed)
    }

    pub fn bytes_in(&self) -> u64 {
        self.bytes_in.load(Ordering::Relaxed)
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out.load(Ordering::Relaxed)
    }

    pub fn connections_total(&self) -> u64 {
        self.connections_total.load(Ordering::Relaxed)
    }

    pub fn record_tick(&self, duration: Duration) {
        self.ticks_total.fetch_add(1, Ordering::Relaxed);
        if duration > TARGET_TICK {
            self.ticks_behind_schedule.fetch_add(1, Ordering::Relaxed);
        }
        let mut samples = self.samples.lock().unwrap();
        if samples.len() == SAMPLE_WINDOW {
            samples.pop_front();
        }
        samples.push_back(duration);
    }

    pub fn mean_tick_millis(&self) -> f64 {
        let samples = self.samples.lock().unwrap();
        if samples.is_empty() {
            return 0.0;
        }
        let total: Duration = samples.iter().sum();
        total.as_secs_f64() * 1000.0 / samples.len() as f64
    }

    /// Ticks per second, capped at the 20Hz target: a server running ahead
    /// of schedule still reports 20.0, not an inflated number.
    pub fn tps(&self) -> f64 {
        let mean = self.mean_tick_millis();
        if mean <= 0.0 {
            return 20.0;
        }
        (1000.0 / mean).min(20.0)
    }

    pub fn ticks_total(&self) -> u64 {
        self.ticks_total.load(Ordering::Relaxed)
    }

    pub fn ticks_behind_schedule(&self) -> u64 {
        self.ticks_behind_schedule.load(Ordering::Relaxed)
    }
}

impl Default for PerfMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_monitor_reports_full_tps() {
        let monitor = PerfMonitor::new();
        assert_eq!(monitor.tps(), 20.0);
    }

    #[test]
    fn slow_ticks_lower_reported_tps() {
        let monitor = PerfMonitor::new();
        for _ in 0..10 {
            monitor.record_tick(Duration::from_millis(100));
        }
        assert!(monitor.tps() < 15.0);
    }

    #[test]
    fn window_caps_at_sample_limit() {
        let monitor = PerfMonitor::new();
        for _ in 0..(SAMPLE_WINDOW * 2) {
            monitor.record_tick(Duration::from_millis(50));
        }
        assert_eq!(monitor.samples.lock().unwrap().len(), SAMPLE_WINDOW);
    }

    #[test]
    fn tracks_ticks_behind_schedule() {
        let monitor = PerfMonitor::new();
        monitor.record_tick(Duration::from_millis(20));
        monitor.record_tick(Duration::from_millis(80));
        assert_eq!(monitor.ticks_total(), 2);
        assert_eq!(monitor.ticks_behind_schedule(), 1);
    }

    #[test]
    fn tracks_packet_and_byte_counters() {
        let monitor = PerfMonitor::new();
        monitor.record_packet_in(12);
        monitor.record_packet_in(8);
        monitor.record_packets_out(3, 40);
        monitor.record_connection();
        assert_eq!(monitor.packets_in(), 2);
        assert_eq!(monitor.bytes_in(), 20);
        assert_eq!(monitor.packets_out(), 3);
        assert_eq!(monitor.bytes_out(), 40);
        assert_eq!(monitor.connections_total(), 1);
    }
}
