pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod modules;
pub mod queue;
pub mod registry;
pub mod runner;
pub mod scheduler;

pub use dispatcher::{CancelToken, Dispatcher, DispatcherConfig, DispatcherError};
pub use executor::Executor;
pub use queue::{FileJobQueue, JobQueue, QueueError, QueueHandle, RedisJobQueue};
pub use registry::{JobModule, JobModuleContext, JobModuleMeta, JobModuleOutcome, JobRegistry, RegistryError};
pub use runner::{Runner, RunnerError};
pub use scheduler::{Scheduler, SchedulerError};
