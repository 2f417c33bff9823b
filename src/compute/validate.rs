//! Algorithm descriptor validation.

use crate::compute::AlgorithmDescriptor;
use crate::error::{Error, Result};

/// Check that an assembled algorithm descriptor is runnable.
///
/// `algorithm_did` is the DID the descriptor was resolved from, when the
/// by-reference path was taken; a DID whose download URL resolved empty is
/// rejected outright.
///
/// # Errors
///
/// Returns [`Error::BadRequest`] when the descriptor has no code source or
/// an incomplete container.
pub fn validate_algorithm(
    descriptor: &AlgorithmDescriptor,
    algorithm_did: Option<&str>,
) -> Result<()> {
    if let Some(did) = algorithm_did {
        if descriptor.url.is_empty() {
            return Err(Error::BadRequest(format!(
                "cannot get url for the algorithmDid {did}"
            )));
        }
    }

    if descriptor.url.is_empty() && descriptor.rawcode.is_empty() {
        return Err(Error::BadRequest(
            "`algorithmMeta` must define one of `url` or `rawcode`, but both seem missing"
                .to_string(),
        ));
    }

    if !descriptor.container.is_complete() {
        return Err(Error::BadRequest(
            "algorithm `container` must specify values for all of entrypoint, image and tag"
                .to_string(),
        ));
    }

    Ok(())
}
