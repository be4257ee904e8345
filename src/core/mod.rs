pub mod discovery;
pub mod job;
pub mod normalize;
pub mod params;
pub mod results;
pub mod runner;

pub use crate::domain::model::{ConfigurationModel, Lun, Target, TargetMap, TerminalResult};
pub use crate::domain::ports::{HostSession, JobChannel, Storage};
pub use crate::utils::error::Result;
