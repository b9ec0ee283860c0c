//! Library half of the `remedy` binary: process-wide startup routines.

pub mod logging;
