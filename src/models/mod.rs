pub mod driver;
pub mod notification;
pub mod reservation;
