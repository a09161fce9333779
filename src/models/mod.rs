pub mod seat;
pub mod seat_status;
pub mod showtime;

pub use seat::{Seat, SeatClass};
pub use seat_status::{SeatState, SeatStatus};
pub use showtime::Showtime;
