// Adapters layer: concrete implementations for external systems (storage, http, remote API, terminal).

pub mod http;
pub mod m2m;
pub mod prompt;
pub mod storage;
