//! # Tasklist Testing
//!
//! Testing utilities and helpers for the tasklist reducer architecture.
//!
//! This crate provides:
//! - Deterministic implementations of core Environment traits
//! - A Given-When-Then harness for reducers
//! - Assertion helpers for reducer effects
//!
//! ## Example
//!
//! ```ignore
//! use tasklist_testing::{test_clock, ReducerTest};
//!
//! #[test]
//! fn load_marks_loading() {
//!     ReducerTest::new(TaskReducer::new())
//!         .with_env(TaskEnvironment::new(MockTaskService::new(), Arc::new(test_clock())))
//!         .given_state(TaskState::new())
//!         .when_action(TaskAction::Load { request_id: RequestId::new() })
//!         .then_state(|state| assert!(state.loading))
//!         .run();
//! }
//! ```

use chrono::{DateTime, Utc};
use tasklist_core::environment::Clock;


/// Mock implementations of core Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use tasklist_testing::mocks::FixedClock;
    /// use tasklist_core::environment::Clock;
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
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
