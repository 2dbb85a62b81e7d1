pub mod driver;
pub mod payment;
pub mod ride;
