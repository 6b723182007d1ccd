//! Client socket handling

pub mod access;
pub mod connection;

pub use access::{AllowList, HostResolver, ReverseDnsResolver};
pub use connection::{Connection, Listener, REFUSED, ReadOutcome, WELCOME};
