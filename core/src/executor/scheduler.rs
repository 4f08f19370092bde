use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::Map;
use tokio::sync::Semaphore;

use crate::model::{Job, JobResult};

/// Run one wave: spawn a task per job and wait for all of them.
///
/// Results come back in dispatch order. With `max_parallel > 0` a semaphore
/// caps how many tasks run at once. A task that panics or is aborted is
/// reported as a failed [`JobResult`].
pub async fn execute_wave<F, Fut>(jobs: Vec<Job>, max_parallel: usize, dispatch: F) -> Vec<JobResult>
where
    F: Fn(Job) -> Fut,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    let limiter = (max_parallel > 0).then(|| Arc::new(Semaphore::new(max_parallel)));
    let wave_started = Utc::now();

    let mut dispatched = Vec::with_capacity(jobs.len());
    let mut handles = Vec::with_capacity(jobs.len());

    for job in jobs {
        dispatched.push((job.name.clone(), job.job_type.clone()));
        let limiter = limiter.clone();
        let fut = dispatch(job);

        handles.push(tokio::spawn(async move {
            let _permit = match limiter {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            fut.await
        }));
    }

    join_all(handles)
        .await
        .into_iter()
        .zip(dispatched)
        .map(|(joined, (name, job_type))| match joined {
            Ok(result) => result,
            Err(e) => {
                let reason = if e.is_panic() { "panicked" } else { "was cancelled" };
                tracing::error!(job = %name, error = %e, "job task {reason}");
                JobResult::new(
                    name,
                    job_type,
                    wave_started,
                    false,
                    format!("Job task {reason}"),
                    Map::new(),
                )
            }
        })
        .collect()
}
