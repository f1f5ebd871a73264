pub mod executor;
pub mod jobs;

pub use executor::run;
pub use jobs::Jobs;
