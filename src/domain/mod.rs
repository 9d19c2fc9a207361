// Domain layer: sheet/record models and the ports the pipelines are written against.

pub mod model;
pub mod ports;
pub mod sheets;
