pub mod book;
pub mod transaction;

pub use book::{Availability, Entity as Book};
pub use transaction::{Action, Entity as Transaction};
