pub mod ingredients;
pub mod lists;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod tokens;
pub mod users;

pub use ingredients::*;
pub use lists::*;
pub use recipes::*;
pub use subscriptions::*;
pub use tags::*;
pub use tokens::*;
pub use users::*;
