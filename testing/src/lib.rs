//! # Eventdesk Testing
//!
//! Testing utilities and helpers for eventdesk reducers.
//!
//! This crate provides:
//! - Deterministic implementations of environment traits ([`FixedClock`])
//! - [`ReducerTest`], a Given/When/Then harness for reducers
//! - Effect assertion helpers
//! - Opt-in tracing output for tests
//!
//! ## Example
//!
//! ```ignore
//! use eventdesk_testing::{ReducerTest, assertions};
//!
//! ReducerTest::new(CheckoutReducer::new())
//!     .with_env(test_environment())
//!     .given_state(CheckoutState::default())
//!     .when_action(CheckoutAction::ProceedToPayment)
//!     .then_state(|state| assert_eq!(state.step, CheckoutStep::OrderDetails))
//!     .then_effects(assertions::assert_no_effects)
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use eventdesk_core::environment::Clock;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use eventdesk_testing::mocks::FixedClock;
    /// use eventdesk_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities
pub mod helpers {
    use tracing_subscriber::EnvFilter;

    /// Route `tracing` output through the test harness
    ///
    /// Honours `RUST_LOG`; safe to call from every test (only the first call
    /// installs a subscriber).
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use helpers::init_test_tracing;
pub use mocks::{FixedClock, test_clock};
