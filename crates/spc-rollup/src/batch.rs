// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use spc_core::{Series, SpcError};
use spc_online::SeriesRequest;

/// Computes independent requests, in parallel when the `rayon` feature is on.
///
/// Results are returned in request order and match sequential computation.
pub fn compute_many(requests: &[SeriesRequest]) -> Vec<Result<Series, SpcError>> {
    #[cfg(feature = "rayon")]
    {
        requests.par_iter().map(SeriesRequest::compute).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        requests.iter().map(SeriesRequest::compute).collect()
    }
}
