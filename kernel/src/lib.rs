mod flags;
mod metrics;
mod mlfq;
mod queue;
mod sjf;

pub use flags::Flags;
pub use metrics::{aggregate, Report};
pub use mlfq::{Mlfq, MlfqConfig};
pub use sjf::Sjf;
