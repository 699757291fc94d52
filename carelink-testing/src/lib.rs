//! Testing utilities for the carelink checkout.
//!
//! Every collaborator seam of `carelink-checkout` has a recording mock here.
//! Mocks are cheap to clone and clones share state, so a test keeps one copy
//! for assertions and hands another to the code under test.
//!
//! ## Quick Start
//!
//! ```
//! use carelink_testing::*;
//!
//! # tokio_test::block_on(async {
//! let mocks = MockServices::new();
//! let mut wizard = mocks.wizard();
//!
//! wizard.accept_terms().unwrap();
//! wizard.sign_up(&fixtures::profile()).await.unwrap();
//! assert!(mocks.accounts.log().was_called("signup"));
//! # });
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::MockServices;
pub use mock::*;
