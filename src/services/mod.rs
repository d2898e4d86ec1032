pub mod analytics_run;
pub mod analyzer;
pub mod compass;
pub mod forecast_run;
pub mod forecaster;
pub mod recommendation;
pub mod scheduler;
pub mod worker_pool;
