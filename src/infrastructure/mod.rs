pub mod paper_exchange;
pub mod telegram;
pub mod vision;
