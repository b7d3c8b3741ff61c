#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Lost,
    Restored,
}

/// Transport state as published by the channel. `epoch` grows with every
/// successful connect, so two connections in a row stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub connectivity: Connectivity,
    pub epoch: u64,
}

impl Link {
    pub fn online(epoch: u64) -> Link {
        Link { connectivity: Connectivity::Online, epoch }
    }

    pub fn offline(epoch: u64) -> Link {
        Link { connectivity: Connectivity::Offline, epoch }
    }
}

/// Turns sampled [`Link`] values into the state signals a session needs.
#[derive(Debug, Clone, Default)]
pub struct LinkTracker {
    seen: Option<u64>,
}

impl LinkTracker {
    /// A connection not seen before is reported as a drop followed by a
    /// reconnect, even when the intermediate offline state was never sampled.
    pub fn signals(&mut self, link: Link) -> &'static [Connectivity] {
        match link.connectivity {
            Connectivity::Online if self.seen != Some(link.epoch) => {
                self.seen = Some(link.epoch);
                &[Connectivity::Offline, Connectivity::Online]
            }
            Connectivity::Online => &[Connectivity::Online],
            Connectivity::Offline => &[Connectivity::Offline],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: Connectivity,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity) -> ConnectivityMonitor {
        ConnectivityMonitor { state: initial }
    }

    pub fn state(&self) -> Connectivity {
        self.state
    }

    pub fn is_online(&self) -> bool {
        self.state == Connectivity::Online
    }

    /// Records a platform signal; repeats of the current state are ignored.
    pub fn observe(&mut self, next: Connectivity) -> Option<Transition> {
        let transition = match (self.state, next) {
            (Connectivity::Online, Connectivity::Offline) => Transition::Lost,
            (Connectivity::Offline, Connectivity::Online) => Transition::Restored,
            _ => return None,
        };
        self.state = next;
        Some(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_only_real_transitions() {
        let mut monitor = ConnectivityMonitor::new(Connectivity::Online);

        assert_eq!(monitor.observe(Connectivity::Online), None);
        assert_eq!(monitor.observe(Connectivity::Offline), Some(Transition::Lost));
        assert!(!monitor.is_online());
        assert_eq!(monitor.observe(Connectivity::Offline), None);
        assert_eq!(monitor.observe(Connectivity::Online), Some(Transition::Restored));
        assert_eq!(monitor.state(), Connectivity::Online);
    }

    #[test]
    fn a_new_connection_always_reads_as_a_reconnect() {
        let mut tracker = LinkTracker::default();

        assert_eq!(tracker.signals(Link::online(1)), [Connectivity::Offline, Connectivity::Online]);
        assert_eq!(tracker.signals(Link::online(1)), [Connectivity::Online]);
        // dropped and reconnected between two samples
        assert_eq!(tracker.signals(Link::online(2)), [Connectivity::Offline, Connectivity::Online]);
        assert_eq!(tracker.signals(Link::offline(2)), [Connectivity::Offline]);
        assert_eq!(tracker.signals(Link::online(3)), [Connectivity::Offline, Connectivity::Online]);
    }
}
