// Domain layer: tour aggregate and the ports the ingestion core depends on.

pub mod model;
pub mod ports;
