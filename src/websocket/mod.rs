pub mod handler;

pub use handler::websocket_handler;
