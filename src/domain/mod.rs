// Domain layer: records, ports (interfaces) and the enrollment rule.
// The storage engine that implements the ports lives in `core`.

pub mod model;
pub mod ports;
pub mod services;
