pub mod stock;
pub mod watchlist;
pub mod response;

pub use stock::*;
pub use watchlist::*;
pub use response::*;
