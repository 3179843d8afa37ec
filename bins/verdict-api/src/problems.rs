// Problem catalog client.
//
// The catalog is an external HTTP JSON service; submissions snapshot the
// fetched problem into the job payload, so this is the only place it is
// consulted.

use anyhow::{Context, Result};
use verdict_common::types::Problem;

/// `Ok(None)` means the catalog answered 404; transport and server
/// errors bubble up.
pub async fn fetch_problem(
    client: &reqwest::Client,
    base_url: &str,
    problem_id: &str,
) -> Result<Option<Problem>> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), problem_id);

    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("problem service unreachable: {}", url))?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }

    let response = response
        .error_for_status()
        .context("problem service returned an error")?;

    let problem = response
        .json::<Problem>()
        .await
        .context("invalid problem payload")?;

    Ok(Some(problem))
}
