//! nearscan application shell: configuration, tracing and the command flows
//! used by the `nearscan` binary.

pub mod bootstrap;
