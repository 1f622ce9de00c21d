pub mod activity;
pub mod attempt;
pub mod judge;
pub mod problem;
pub mod profile;
pub mod recognition;
pub mod session;
pub mod step;

pub use activity::ActivityRecord;
pub use attempt::Attempt;
pub use problem::Problem;
pub use profile::Profile;
pub use step::{Step, StepOutcome};
