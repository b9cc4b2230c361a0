// Domain layer: records and ports. No IO here.

pub mod model;
pub mod ports;
