//! Binary wiring: argument handling, tracing, the terminal UI and the run
//! itself.

pub(crate) mod reporter;
pub(crate) mod runtime;
pub(crate) mod terminal;
