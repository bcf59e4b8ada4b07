pub mod backend;
pub mod config;
pub mod decode;
pub mod error;
pub mod pokedex;
pub mod protocol;
pub mod session;
pub mod state;
pub mod view;

// Re-export main types for convenience
pub use backend::{ByteStream, ChatBackend, HttpBackend};
pub use config::{Config, Settings};
pub use decode::Utf8StreamDecoder;
pub use error::ChatError;
pub use pokedex::{LocalBackend, Pokedex};
pub use protocol::Protocol;
pub use session::{ChatSession, Exchange, SendOutcome, FALLBACK_REPLY};
pub use state::{Message, Sender};
pub use view::{ChatView, Transcript};
