//! Which transports are currently accepting connections.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::net::Protocol;
use crate::observability::metrics;

/// The serving-state flag a listener is represented by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Plain HTTP.
    Http,
    /// HTTPS, HTTP/2 (with or without TLS) or QUIC.
    Secure,
}

impl Slot {
    pub fn for_protocol(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Http => Slot::Http,
            Protocol::Http2Cleartext | Protocol::Https | Protocol::Http3 => Slot::Secure,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Http => "http",
            Slot::Secure => "secure",
        }
    }
}

#[derive(Debug, Default)]
struct Flags {
    http: AtomicBool,
    secure: AtomicBool,
}

/// Shared record of live transports.
///
/// Written only by listener workers, right after a successful bind and
/// right after the serve loop returns. Clones share the same flags.
#[derive(Debug, Clone, Default)]
pub struct ServingState {
    flags: Arc<Flags>,
}

impl ServingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, slot: Slot, live: bool) {
        self.flag(slot).store(live, Ordering::SeqCst);
        metrics::record_serving(slot, live);
    }

    pub fn is_live(&self, slot: Slot) -> bool {
        self.flag(slot).load(Ordering::SeqCst)
    }

    /// Plain HTTP is live.
    pub fn http(&self) -> bool {
        self.is_live(Slot::Http)
    }

    /// The secure/HTTP2 transport is live.
    pub fn secure(&self) -> bool {
        self.is_live(Slot::Secure)
    }

    /// At least one transport is live.
    pub fn any(&self) -> bool {
        self.http() || self.secure()
    }

    fn flag(&self, slot: Slot) -> &AtomicBool {
        match slot {
            Slot::Http => &self.flags.http,
            Slot::Secure => &self.flags.secure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_independent() {
        let state = ServingState::new();
        assert!(!state.any());

        state.set(Slot::Secure, true);
        assert!(state.secure());
        assert!(!state.http());

        state.set(Slot::Http, true);
        state.set(Slot::Secure, false);
        assert!(state.http());
        assert!(!state.secure());
        assert!(state.any());
    }

    #[test]
    fn clones_share_flags() {
        let state = ServingState::new();
        let worker_view = state.clone();
        worker_view.set(Slot::Http, true);
        assert!(state.http());
    }

    #[test]
    fn every_non_plain_protocol_uses_the_secure_slot() {
        assert_eq!(Slot::for_protocol(Protocol::Http), Slot::Http);
        assert_eq!(Slot::for_protocol(Protocol::Https), Slot::Secure);
        assert_eq!(Slot::for_protocol(Protocol::Http2Cleartext), Slot::Secure);
        assert_eq!(Slot::for_protocol(Protocol::Http3), Slot::Secure);
    }
}
