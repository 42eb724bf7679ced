pub mod activity;
pub mod cache;
pub mod clock;
pub mod detector;
pub mod engine;
pub mod scheduler;
pub mod writer;

pub use activity::{ActiveRule, ActiveWindow, ActivityPolicy};
pub use cache::RunnerCache;
pub use clock::SystemClock;
pub use detector::ChangeDetector;
pub use engine::{CycleReport, Tracker};
pub use scheduler::Scheduler;
pub use writer::BatchWriter;
