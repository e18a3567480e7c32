pub mod calculator;
pub mod listing;
pub mod patch;
pub mod thumbnail;
pub mod visibility;
