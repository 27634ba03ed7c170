//! Testing utilities: scripted mock implementations of the capability
//! ports with call recording.

pub mod mocks;
