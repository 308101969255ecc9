pub mod location;
pub mod reservation;
pub mod user;
pub mod vehicle;

pub use location::*;
pub use reservation::*;
pub use user::*;
pub use vehicle::*;
