//! Background loops.

pub mod analysis_loop;
