//! Runtime configuration.

use crate::framer::DEFAULT_MAX_LINE_LEN;

/// Server configuration for the production runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "0.0.0.0:2222")
    pub bind_address: String,
    /// Bytes kept per input line
    pub max_line_len: usize,
    /// Character bound to every session when no user store is configured
    pub default_character: String,
    /// Greeting line sent before the username prompt
    pub motd: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:2222".to_string(),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            default_character: "guest".to_string(),
            motd: "Welcome to the MUD game!".to_string(),
        }
    }
}
