//! Test suites for the busgate daemon.

mod flow_behaviour;
mod support;
mod unit;
