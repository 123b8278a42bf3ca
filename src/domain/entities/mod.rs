pub mod exchange;
pub mod position;
pub mod signal;
pub mod trade;
