use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Admission control for incoming connections.
///
/// Caps connections per peer IP and in total. A successful
/// [`try_connect`](ConnectionTracker::try_connect) hands out a
/// [`ConnectionSlot`] that frees itself when the connection ends.
#[derive(Debug)]
pub struct ConnectionTracker {
    state: Mutex<TrackerState>,
    max_per_ip: usize,
    max_total: usize,
}

#[derive(Debug, Default)]
struct TrackerState {
    per_ip: HashMap<IpAddr, usize>,
    total: usize,
}

/// Why a connection was turned away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    TotalLimit { active: usize, max: usize },
    PerIpLimit { active: usize, max: usize },
}

impl ConnectionTracker {
    pub fn new(max_per_ip: usize, max_total: usize) -> Arc<Self> {
        Arc::new(ConnectionTracker {
            state: Mutex::new(TrackerState::default()),
            max_per_ip,
            max_total,
        })
    }

    pub fn try_connect(self: &Arc<Self>, ip: IpAddr) -> Result<ConnectionSlot, Rejection> {
        let mut state = self.state();
        if state.total >= self.max_total {
            return Err(Rejection::TotalLimit {
                active: state.total,
                max: self.max_total,
            });
        }

        let ip_count = state.per_ip.get(&ip).copied().unwrap_or(0);
        if ip_count >= self.max_per_ip {
            return Err(Rejection::PerIpLimit {
                active: ip_count,
                max: self.max_per_ip,
            });
        }

        state.per_ip.insert(ip, ip_count + 1);
        state.total += 1;
        Ok(ConnectionSlot {
            tracker: self.clone(),
            ip,
        })
    }

    pub fn active(&self) -> usize {
        self.state().total
    }

    pub fn max_total(&self) -> usize {
        self.max_total
    }

    fn disconnect(&self, ip: IpAddr) {
        let mut state = self.state();
        if let Some(count) = state.per_ip.get_mut(&ip) {
            *count -= 1;
            if *count == 0 {
                state.per_ip.remove(&ip);
            }
            state.total -= 1;
        }
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// An admitted connection. Dropping it releases the slot.
#[derive(Debug)]
pub struct ConnectionSlot {
    tracker: Arc<ConnectionTracker>,
    ip: IpAddr,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.tracker.disconnect(self.ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 0, last))
    }

    #[test]
    fn eleventh_connection_is_rejected_until_a_slot_frees() {
        let tracker = ConnectionTracker::new(1, 10);

        let mut slots: Vec<ConnectionSlot> = (1..=10)
            .map(|i| tracker.try_connect(ip(i)).expect("within limit"))
            .collect();
        assert_eq!(tracker.active(), 10);

        assert_eq!(
            tracker.try_connect(ip(11)).unwrap_err(),
            Rejection::TotalLimit { active: 10, max: 10 }
        );

        slots.remove(0);
        assert_eq!(tracker.active(), 9);
        assert!(tracker.try_connect(ip(11)).is_ok());
    }

    #[test]
    fn one_connection_per_ip() {
        let tracker = ConnectionTracker::new(1, 10);

        let first = tracker.try_connect(ip(1)).unwrap();
        assert_eq!(
            tracker.try_connect(ip(1)).unwrap_err(),
            Rejection::PerIpLimit { active: 1, max: 1 }
        );
        assert!(tracker.try_connect(ip(2)).is_ok());

        drop(first);
        assert!(tracker.try_connect(ip(1)).is_ok());
    }
}
