//! Data models for the lending server

pub mod author;
pub mod book;
pub mod loan;
pub mod member;
pub mod report;

// Re-export commonly used types
pub use author::Author;
pub use book::Book;
pub use loan::{Loan, LoanNotice, LoanPolicy, LoanTerms};
pub use member::Member;
pub use report::{OverdueMember, TopActiveMember};
