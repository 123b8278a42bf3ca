pub mod merge;
pub mod position_manager;
pub mod router;
pub mod symbol;
pub mod text_parser;
pub mod trade_executor;
pub mod validation;
