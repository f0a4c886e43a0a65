//! Cooperative server grab
//!
//! GrabServer lets one client run alone: every other client finishes its
//! current request and then parks here until the grab is released. Waiters
//! block on a condition variable and are woken by `ungrab`, by the holder's
//! disconnect, or by their own connection closing.

use crate::protocol::ClientId;
use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct ServerGrab {
    holder: Mutex<Option<ClientId>>,
    released: Condvar,
}

impl ServerGrab {
    pub fn new() -> Self {
        ServerGrab {
            holder: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    /// Grab on behalf of `client`; regrabbing by the holder is a no-op
    pub fn grab(&self, client: ClientId) {
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        *holder = Some(client);
    }

    /// Release the grab if `client` holds it
    pub fn ungrab(&self, client: ClientId) -> bool {
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        if *holder != Some(client) {
            return false;
        }
        *holder = None;
        self.released.notify_all();
        true
    }

    pub fn holder(&self) -> Option<ClientId> {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// May `client` process a request right now?
    pub fn allows(&self, client: ClientId) -> bool {
        match self.holder() {
            None => true,
            Some(holder) => holder == client,
        }
    }

    /// Block until `client` may run or `closed()` reports the connection gone.
    /// Returns false in the latter case.
    pub fn wait_for_turn(&self, client: ClientId, closed: impl Fn() -> bool) -> bool {
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if closed() {
                return false;
            }
            match *holder {
                None => return true,
                Some(h) if h == client => return true,
                Some(_) => {}
            }
            holder = self
                .released
                .wait(holder)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wake every waiter so it can re-check its connection state
    pub fn wake_all(&self) {
        let _holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        self.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_holder_runs_others_wait() {
        let grab = ServerGrab::new();
        assert!(grab.allows(1));
        grab.grab(1);
        assert!(grab.allows(1));
        assert!(!grab.allows(2));
        assert!(!grab.ungrab(2));
        assert!(grab.ungrab(1));
        assert!(grab.allows(2));
    }

    #[test]
    fn test_waiter_released_by_ungrab() {
        let grab = Arc::new(ServerGrab::new());
        grab.grab(1);

        let waiter = {
            let grab = grab.clone();
            thread::spawn(move || grab.wait_for_turn(2, || false))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        grab.ungrab(1);
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_waiter_released_by_close() {
        let grab = Arc::new(ServerGrab::new());
        grab.grab(1);
        let closed = Arc::new(AtomicBool::new(false));

        let waiter = {
            let grab = grab.clone();
            let closed = closed.clone();
            thread::spawn(move || grab.wait_for_turn(2, || closed.load(Ordering::SeqCst)))
        };
        thread::sleep(Duration::from_millis(20));
        closed.store(true, Ordering::SeqCst);
        grab.wake_all();
        assert!(!waiter.join().unwrap());
        assert_eq!(grab.holder(), Some(1));
    }
}
