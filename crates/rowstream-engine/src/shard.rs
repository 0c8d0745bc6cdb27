use rowstream_sdk::{DatasetError, Result};

/// Assign this worker its contiguous chunk of the partition list.
///
/// Partitions are split into `ceil(n / replicas)`-sized contiguous chunks in
/// order; worker `w` receives chunk `w`. The last workers may receive fewer
/// partitions, or none at all when there are more replicas than partitions.
pub fn assign(partitions: Vec<String>, worker: usize, replicas: usize) -> Result<Vec<String>> {
    if replicas == 0 {
        return Err(DatasetError::config(
            "the number of replicas must be a positive integer",
        ));
    }
    if worker >= replicas {
        return Err(DatasetError::config(format!(
            "worker {worker} out of range [0, {replicas})"
        )));
    }
    if replicas == 1 {
        return Ok(partitions);
    }

    let chunk = partitions.len().div_ceil(replicas);
    let start = (worker * chunk).min(partitions.len());
    let end = ((worker + 1) * chunk).min(partitions.len());
    Ok(partitions[start..end].to_vec())
}
