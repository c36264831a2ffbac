//! Data models for the circulation engine

pub mod borrowing;
pub mod fine;
pub mod media;
pub mod user;

// Re-export commonly used types
pub use borrowing::{Borrowing, BorrowingStatus, NewBorrowing};
pub use fine::{Fine, FinePayment, NewFine};
pub use media::{Media, MediaType, NewMedia};
pub use user::{Caller, Role, UserAccount};
