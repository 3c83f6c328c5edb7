use anyhow::{bail, ensure};

use crate::error::{CatalogError, CatalogResult};
use crate::model::MutationResponse;

/// Bucket sizes `(created, updated, deleted)` must match exactly
pub fn expect_shape(
    response: &MutationResponse,
    expected: (usize, usize, usize),
    operation: &str,
) -> anyhow::Result<()> {
    ensure!(
        response.shape() == expected,
        "{} returned (created, updated, deleted) = {:?}, expected {:?}",
        operation,
        response.shape(),
        expected
    );
    let overlapping = response.overlapping_guids();
    ensure!(
        overlapping.is_empty(),
        "{} reported {:?} in more than one bucket",
        operation,
        overlapping
    );
    Ok(())
}

/// A call that must fail with a specific error kind
pub fn expect_failure<T>(
    result: CatalogResult<T>,
    is_expected: fn(&CatalogError) -> bool,
    operation: &str,
) -> anyhow::Result<CatalogError> {
    match result {
        Ok(_) => bail!("{} succeeded but was expected to fail", operation),
        Err(error) if is_expected(&error) => {
            log::info!("{} failed as expected: {}", operation, error);
            Ok(error)
        }
        Err(error) => bail!("{} failed with the wrong kind ({}): {}", operation, error.kind(), error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Asset, ConnectorType};

    #[test]
    fn test_shape_mismatch_is_reported() {
        let response =
            MutationResponse::created(Asset::connection("c", ConnectorType::S3, vec![]));
        assert!(expect_shape(&response, (1, 0, 0), "create").is_ok());
        let error = expect_shape(&response, (1, 1, 0), "create").unwrap_err();
        assert!(error.to_string().contains("expected (1, 1, 0)"));
    }

    #[test]
    fn test_expect_failure_checks_kind() {
        let result: CatalogResult<()> = Err(CatalogError::NotFound("gone".to_string()));
        assert!(expect_failure(result.clone(), CatalogError::is_not_found, "lookup").is_ok());
        assert!(expect_failure(result, CatalogError::is_transient, "lookup").is_err());
        assert!(expect_failure(Ok(()), CatalogError::is_not_found, "lookup").is_err());
    }
}
