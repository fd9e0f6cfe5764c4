//! CSV scenario input and session report output for the command-line driver.

pub mod report_writer;
pub mod scenario_reader;
