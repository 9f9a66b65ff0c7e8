pub mod locks;
pub mod scope_guard;
