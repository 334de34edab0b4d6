//! Shared fixtures for unit tests.


pub(crate) use runtime::{CallOutcome, FakeCall, FakeMono};
