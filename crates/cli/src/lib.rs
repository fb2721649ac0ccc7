//! Command-line front end for the snaplink client.

pub mod capture;
pub mod cli;
pub mod logging;
pub mod run;
pub mod surface;
