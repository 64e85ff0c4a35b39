pub mod customer;
pub mod ticket;
pub mod call_record;
pub mod company;

pub use customer::*;
pub use ticket::*;
pub use call_record::*;
pub use company::*;
