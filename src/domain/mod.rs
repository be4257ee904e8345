// Domain layer: models and ports (interfaces). No process or filesystem code lives here.

pub mod model;
pub mod ports;
