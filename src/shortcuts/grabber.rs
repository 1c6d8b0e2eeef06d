//! Seam to the platform input backend.

use super::keys::Key;

/// Performs (or releases) a low-level grab of a key so the backend reports it
/// even when another application has focus.
pub trait KeyGrabber: Send {
    /// Returns false if the backend refused the grab.
    fn grab_key(&mut self, key: Key, grab: bool) -> bool;
}

/// Grabber for backends that deliver every key anyway.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGrabber;

impl KeyGrabber for NoopGrabber {
    fn grab_key(&mut self, _key: Key, _grab: bool) -> bool {
        true
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct GrabLog {
        pub calls: Vec<(Key, bool)>,
        pub held: HashSet<Key>,
        pub refuse: HashSet<Key>,
    }

    /// Grabber that records every call and refuses keys listed in `refuse`.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingGrabber {
        pub log: Arc<Mutex<GrabLog>>,
    }

    impl KeyGrabber for RecordingGrabber {
        fn grab_key(&mut self, key: Key, grab: bool) -> bool {
            let mut log = self.log.lock().unwrap();
            log.calls.push((key, grab));
            if grab {
                if log.refuse.contains(&key) {
                    return false;
                }
                assert!(log.held.insert(key), "{key} grabbed twice");
            } else {
                assert!(log.held.remove(&key), "{key} released without a grab");
            }
            true
        }
    }
}
