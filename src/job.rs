//! Client side of the cluster job execution service.
//!
//! Jobs are started by name, polled until they are done and their result is
//! fetched afterwards. Polling is bounded by a timeout and can be aborted
//! between two polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Error;
use serde_json::Value;

/// Remote job execution service.
pub trait JobService {
    /// Start a job, returning its ID.
    fn job_start(&self, name: &str, args: &[String]) -> Result<String, Error>;
    /// Wait a little for the job, returning true once it is done.
    fn job_wait(&self, id: &str) -> Result<bool, Error>;
    fn job_result(&self, id: &str) -> Result<Value, Error>;
}

#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Number of attempts on transport failures.
    pub retries: usize,
    /// Upper bound for waiting on a started job.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            retries: 1,
            timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error("job service request failed - {0}")]
    Transport(Error),
    #[error("job '{0}' did not finish within {1:?}")]
    Timeout(String, Duration),
    #[error("job '{0}' aborted")]
    Aborted(String),
}

/// Run a job and return its result.
///
/// Transport failures restart the job up to `options.retries` times, a timeout
/// or an abort request ends it immediately.
pub fn run_job<S: JobService + ?Sized>(
    service: &S,
    name: &str,
    args: &[String],
    options: &JobOptions,
    abort: &AtomicBool,
) -> Result<Value, JobError> {
    let attempts = options.retries.max(1);

    let mut attempt = 1;
    loop {
        match run_job_once(service, name, args, options, abort) {
            Err(JobError::Transport(err)) if attempt < attempts => {
                log::warn!(
                    "job '{}' failed (attempt {}/{}) - {}",
                    name,
                    attempt,
                    attempts,
                    err
                );
                attempt += 1;
            }
            res => return res,
        }
    }
}

fn run_job_once<S: JobService + ?Sized>(
    service: &S,
    name: &str,
    args: &[String],
    options: &JobOptions,
    abort: &AtomicBool,
) -> Result<Value, JobError> {
    let id = service.job_start(name, args).map_err(JobError::Transport)?;
    let start = Instant::now();

    loop {
        if abort.load(Ordering::SeqCst) {
            return Err(JobError::Aborted(name.to_string()));
        }

        if service.job_wait(&id).map_err(JobError::Transport)? {
            break;
        }

        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            return Err(JobError::Timeout(name.to_string(), options.timeout));
        }
        std::thread::sleep(options.poll_interval.min(options.timeout - elapsed));
    }

    service.job_result(&id).map_err(JobError::Transport)
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use anyhow::bail;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct TestService {
        start_failures: Cell<usize>,
        polls_needed: Cell<usize>,
        started: Cell<usize>,
        polls: Cell<usize>,
    }

    impl JobService for TestService {
        fn job_start(&self, name: &str, args: &[String]) -> Result<String, Error> {
            self.started.set(self.started.get() + 1);
            if self.start_failures.get() > 0 {
                self.start_failures.set(self.start_failures.get() - 1);
                bail!("connection refused");
            }
            Ok(format!("{}:{}", name, args.join(",")))
        }

        fn job_wait(&self, _id: &str) -> Result<bool, Error> {
            self.polls.set(self.polls.get() + 1);
            Ok(self.polls.get() >= self.polls_needed.get())
        }

        fn job_result(&self, id: &str) -> Result<Value, Error> {
            Ok(json!({ "id": id }))
        }
    }

    fn options(retries: usize, timeout_ms: u64) -> JobOptions {
        JobOptions {
            retries,
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_run_job() -> Result<(), JobError> {
        let service = TestService::default();
        service.polls_needed.set(3);
        let abort = AtomicBool::new(false);

        let args = vec!["DB1".to_string()];
        let res = run_job(&service, "reorder", &args, &options(1, 10_000), &abort)?;
        assert_eq!(res, json!({ "id": "reorder:DB1" }));
        assert_eq!(service.polls.get(), 3);
        Ok(())
    }

    #[test]
    fn test_retries() {
        let service = TestService::default();
        service.start_failures.set(2);
        let abort = AtomicBool::new(false);

        assert!(run_job(&service, "commit", &[], &options(3, 1000), &abort).is_ok());
        assert_eq!(service.started.get(), 3);

        service.start_failures.set(2);
        service.started.set(0);
        let res = run_job(&service, "commit", &[], &options(2, 1000), &abort);
        assert!(matches!(res, Err(JobError::Transport(_))));
        assert_eq!(service.started.get(), 2);
    }

    #[test]
    fn test_timeout_and_abort() {
        let service = TestService::default();
        service.polls_needed.set(usize::MAX);
        let abort = AtomicBool::new(false);

        let res = run_job(&service, "commit", &[], &options(3, 50), &abort);
        assert!(matches!(res, Err(JobError::Timeout(_, _))));
        // timeouts are not retried
        assert_eq!(service.started.get(), 1);

        abort.store(true, Ordering::SeqCst);
        let res = run_job(&service, "commit", &[], &options(1, 10_000), &abort);
        assert!(matches!(res, Err(JobError::Aborted(_))));
    }
}
