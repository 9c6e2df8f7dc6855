// Adapters layer: concrete implementations for external systems (webservice, local files).

pub mod local;
pub mod webservice;
