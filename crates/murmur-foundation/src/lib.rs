pub mod error;
pub mod notify;
pub mod shutdown;
pub mod state;

pub use error::*;
pub use notify::*;
pub use shutdown::*;
pub use state::*;
