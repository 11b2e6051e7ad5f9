//! Rate limiting logic and state management.

mod decision;
mod limiter;
mod overrides;
mod record;

pub use decision::{Admission, RateLimitInfo, RateLimitRejection};
pub use limiter::RateLimiter;
pub use overrides::{AccessList, Override};
pub use record::CounterRecord;
