pub mod homeassistant;
pub mod http;
