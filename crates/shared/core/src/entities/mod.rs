mod balance;
mod order;
mod order_status;
mod order_type;
mod side;
mod trade;
mod user;

pub use balance::Balance;
pub use order::{Order, OrderId, OrderRequest, TransitionError, price_time_priority};
pub use order_status::OrderStatus;
pub use order_type::{OrderKind, OrderType};
pub use side::Side;
pub use trade::{Counterparties, Trade, TradeId};
pub use user::{Role, User, UserId};
