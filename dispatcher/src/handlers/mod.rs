//! Marketplace command handlers.

mod info;
mod rate;
mod sell;
mod trade;

pub use info::{ChatHandler, ExitHandler, ListHandler, StartHandler};
pub use rate::RateHandler;
pub use sell::SellHandler;
pub use trade::{BuyHandler, CancelHandler, ConfirmHandler};

/// Parses a numeric id typed by the user.
fn parse_id(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok().filter(|id| *id > 0)
}
