//! Reply texts. Every reply ends with the command guide.

use escrow_core::{Amount, Item};

pub const WELCOME: &str = "Welcome to the escrow trading bot!";
pub const BACK_TO_START: &str = "Back to the start screen.";
pub const ASK_ITEM_NAME: &str = "Enter the name of the item you want to sell.";
pub const ASK_PRICE: &str = "Enter the item price in USDT.";
pub const INVALID_PRICE: &str =
    "Please enter a valid price (a positive number with at most 6 decimal places).";
pub const ASK_ITEM_KIND: &str = "Enter the item kind (digital/physical).";
pub const INVALID_ITEM_KIND: &str = "Please enter a valid kind (digital/physical).";
pub const NO_ITEMS: &str = "No items are available for purchase.";
pub const ASK_BUY_ID: &str = "Enter the ID of the item you want to buy.";
pub const ASK_CANCEL_ID: &str = "Enter the ID of the item you want to cancel.";
pub const INVALID_ID: &str = "Please enter a valid ID.";
pub const INVALID_ITEM_ID: &str = "Please enter a valid item ID.";
pub const OWN_ITEM: &str = "You cannot buy your own item.";
pub const CONFIRM_USAGE: &str = "Usage: /confirm <item id>";
pub const ASK_RATED_USER: &str = "Enter the ID of the user you want to rate.";
pub const INVALID_USER_ID: &str = "Please enter a valid user ID.";
pub const SELF_RATING: &str = "You cannot rate yourself.";
pub const ASK_SCORE: &str = "Enter a score (1-5). You may add a short review after it.";
pub const INVALID_SCORE: &str = "Please enter a score between 1 and 5.";
pub const SAFE_CHAT: &str = "You can exchange messages with your trading partner safely.";
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong. Please try again.";

pub fn command_guide() -> &'static str {
    "\n\nAvailable commands:\n\
     /sell - register an item for sale\n\
     /list - items available for purchase\n\
     /buy - request to buy an item\n\
     /cancel - cancel an item you are selling\n\
     /confirm <item id> - confirm payment for your item\n\
     /rate - rate another user\n\
     /exit - back to the start screen"
}

pub fn with_guide(text: &str) -> String {
    format!("{}{}", text, command_guide())
}

pub fn item_registered(name: &str, price: Amount) -> String {
    format!("Registered '{}' for {} USDT!", name, price)
}

pub fn item_list(items: &[Item]) -> String {
    let mut message = String::from("Items available for purchase:\n");
    for item in items {
        message.push_str(&format!(
            "- ID: {}, name: {}, price: {} USDT, kind: {}\n",
            item.id,
            item.name,
            item.price,
            item.kind.as_str()
        ));
    }
    message
}

pub fn purchase_requested(item: &Item) -> String {
    format!(
        "Sent a purchase request for '{}'. Please wait for the seller's response.",
        item.name
    )
}

pub fn purchase_offer(item: &Item, buyer_id: i64) -> String {
    format!(
        "User {} wants to buy '{}' (ID {}) for {} USDT. After receiving the payment, send /confirm {}.",
        buyer_id, item.name, item.id, item.price, item.id
    )
}

pub fn item_deleted(item_id: i64) -> String {
    format!("Item ID {} has been deleted.", item_id)
}

pub fn no_pending_transaction(item_id: i64) -> String {
    format!("There is no pending transaction for item ID {}.", item_id)
}

pub fn transaction_completed(transaction_id: i64, item: &Item) -> String {
    format!(
        "Transaction {} for '{}' has been completed!",
        transaction_id, item.name
    )
}

pub fn payment_confirmed(transaction_id: i64, item: &Item) -> String {
    format!(
        "The seller confirmed your payment for '{}'. Transaction {} has been completed.",
        item.name, transaction_id
    )
}

pub fn rating_saved(user_id: i64, score: i64) -> String {
    format!("Rated user {} with {}/5. Thank you!", user_id, score)
}
