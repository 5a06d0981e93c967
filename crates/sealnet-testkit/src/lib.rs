//! # Sealnet Testkit
//!
//! Testing utilities for Sealnet.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known transactions with expected canonical bytes, ids and signatures
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Identities with a seal and a nonce counter, ready to drive a ledger
//!
//! ## Golden Vectors
//!
//! ```rust
//! use sealnet_testkit::vectors::verify_all_vectors;
//!
//! for report in verify_all_vectors() {
//!     assert!(report.matches, "{} diverged", report.name);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sealnet_testkit::generators::{transaction_from_params, TxParams};
//!
//! proptest! {
//!     #[test]
//!     fn id_is_deterministic(params: TxParams) {
//!         let t1 = transaction_from_params(&params);
//!         let t2 = transaction_from_params(&params);
//!         prop_assert_eq!(t1.id(), t2.id());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use sealnet_testkit::fixtures::TestFixture;
//!
//! let mut fixture = TestFixture::new();
//! let tx = fixture.make_data(Default::default());
//! assert_eq!(tx.nonce, 0);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{memory_ledger, multi_party_fixtures, TestFixture};
pub use generators::{transaction_from_params, TxParams};
pub use vectors::{all_vectors, unsigned_from_vector, verify_all_vectors, GoldenVector};
