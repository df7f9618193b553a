//! Outer surfaces of the replay binary: CSV scripts in, console messages and a
//! CSV entitlement snapshot out.

pub mod console;
pub mod csv;
