// Domain layer: core models, wire-neutral payloads and ports (interfaces).

pub mod model;
pub mod payload;
pub mod ports;
