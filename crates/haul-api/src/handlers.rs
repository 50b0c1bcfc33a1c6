//! Request handlers.

pub mod artifact;
pub mod download;
pub mod health;
pub mod lookup;
pub mod progress;

pub use artifact::*;
pub use download::*;
pub use health::*;
pub use lookup::*;
pub use progress::*;
