//! Gate validation test suite.
//!
//! Exercises the payment gate end to end against in-process scripted
//! collaborators: a [`fixtures::ScriptedChain`] standing in for the chain
//! node and a [`fixtures::StaticRegistry`] standing in for the metadata
//! store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod fixtures;

mod consume;
