pub mod dispatch;
pub mod fare;
pub mod matcher;
pub mod sweeper;
