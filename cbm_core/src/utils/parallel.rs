//! Running independent tasks on a worker pool
use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

/// Run `task` once per item, returning results in item order
///
/// With `processes > 1` the items are spread over a pool of that many threads, and each
/// worker gets its own clone of `state` so no mutable state is shared. Otherwise every task
/// runs on the caller's thread against `state` itself.
pub(crate) fn run_tasks<S, C, T, F>(
    state: &mut S,
    items: &[C],
    processes: usize,
    task: F,
) -> Result<Vec<T>, ThreadPoolBuildError>
where
    S: Clone + Sync,
    C: Sync,
    T: Send,
    F: Fn(&mut S, &C) -> T + Sync + Send,
{
    if processes <= 1 || items.len() <= 1 {
        return Ok(items.iter().map(|item| task(state, item)).collect());
    }
    debug!(processes, tasks = items.len(), "running tasks on worker pool");
    let pool = ThreadPoolBuilder::new().num_threads(processes).build()?;
    let base: &S = state;
    let mut results: Vec<(usize, T)> = pool.install(|| {
        items
            .par_iter()
            .enumerate()
            .map_init(|| base.clone(), |worker, (index, item)| (index, task(worker, item)))
            .collect()
    });
    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, result)| result).collect())
}
