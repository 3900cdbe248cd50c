//! End-to-end flows: scheduler, loopback engine, local file store and
//! tracing sink wired the way the runtime wires them.

pub mod flows;

#[cfg(test)]
pub mod support;
