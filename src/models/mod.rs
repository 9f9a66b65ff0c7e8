pub mod chat;
pub mod color;
pub mod diagnostics;
pub mod health;
pub mod messages;
pub mod ready;
pub mod version;

pub use chat::*;
pub use color::*;
pub use diagnostics::*;
pub use health::*;
pub use messages::*;
pub use ready::*;
pub use version::*;
