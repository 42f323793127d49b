pub mod response;
pub mod task;
pub mod user;

pub use response::*;
pub use task::*;
pub use user::*;
