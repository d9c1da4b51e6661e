use sha2::{Digest, Sha256};

/// Key a job holds its fleet slot under.
///
/// Derived from the job token and job id, so a retried prepare finds the
/// slot it already holds. The separator keeps `("abc1", 2)` and
/// `("abc", 12)` apart.
pub fn acquisition_key(job_token: &str, job_id: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{job_token}:{job_id}").as_bytes());
    format!("{:x}", hasher.finalize())
}
