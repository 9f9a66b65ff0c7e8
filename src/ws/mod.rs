pub mod chat;
pub mod connctx;
pub mod docctx;
pub mod hub;
pub mod persist;
pub mod rooms;
pub mod versions;

#[cfg(test)]
mod test_support;

pub use connctx::ConnId;
pub use hub::{Hub, SyncSettings};
