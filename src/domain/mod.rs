//! Domain types and the ports the core talks to.

pub mod outcome;
pub mod ports;
pub mod registration;
pub mod transit;
pub mod vehicle;
