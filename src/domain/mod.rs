//! Domain types and the ports through which the reconciliation engine talks to
//! its collaborators.

pub mod intent;
pub mod ports;
pub mod status;
pub mod verification;
