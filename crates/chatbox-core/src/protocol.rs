/// Which backend integration contract the widget speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// One JSON request, one JSON reply
    #[default]
    Json,
    /// One JSON request, reply streamed as raw text bytes
    Stream,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Json => "json",
            Protocol::Stream => "stream",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(Protocol::Json),
            "stream" | "streaming" => Some(Protocol::Stream),
            _ => None,
        }
    }

    pub fn all() -> Vec<Protocol> {
        vec![Protocol::Json, Protocol::Stream]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Protocol::Json => "JSON reply",
            Protocol::Stream => "Streamed reply",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Protocol::Json => Protocol::Stream,
            Protocol::Stream => Protocol::Json,
        }
    }
}
