//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Drive messages per second accepted from one connection
pub const DRIVE_RATE_LIMIT: u32 = 20;

/// Control messages (join, start, stop, rate) per second from one connection
pub const CONTROL_RATE_LIMIT: u32 = 5;

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    drive_limiter: Arc<Limiter>,
    control_limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn new() -> Self {
        Self {
            drive_limiter: create_limiter(DRIVE_RATE_LIMIT),
            control_limiter: create_limiter(CONTROL_RATE_LIMIT),
        }
    }

    /// Check if a drive message is allowed (returns true if allowed)
    pub fn check_drive(&self) -> bool {
        self.drive_limiter.check().is_ok()
    }

    /// Check if a control message is allowed (returns true if allowed)
    pub fn check_control(&self) -> bool {
        self.control_limiter.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
