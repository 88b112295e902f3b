// Domain layer: certificate models and ports (storage, configuration, rendering).

pub mod model;
pub mod ports;
