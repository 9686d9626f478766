//! Wire types used by the host.

pub mod capabilities;
pub mod error;
pub mod message;
pub mod notification;
pub mod params;

pub use capabilities::*;
pub use error::*;
pub use message::*;
pub use notification::*;
pub use params::*;
