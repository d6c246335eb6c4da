//! Reserved address lookup.

use std::sync::Arc;

use kip_compute::AddressApi;
use tracing::{debug, info, warn};

use crate::config::AddressFilter;
use crate::error::FindError;

/// Finds a free reserved address in a region.
///
/// Holds no state besides the provider handle; every lookup goes back to the
/// provider, which owns the reservation state.
#[derive(Clone)]
pub struct AddressFinder {
    api: Arc<dyn AddressApi>,
}

impl AddressFinder {
    pub fn new(api: Arc<dyn AddressApi>) -> Self {
        Self { api }
    }

    /// First `RESERVED` address in `region` labelled per `filter`, in
    /// provider listing order.
    pub async fn find_address(
        &self,
        project: &str,
        region: &str,
        filter: &AddressFilter,
    ) -> Result<String, FindError> {
        let expression = filter.expression();
        debug!(project = %project, region = %region, filter = %expression, "Looking up reserved address");

        let list = self
            .api
            .list_addresses(project, region, &expression)
            .await
            .map_err(|source| {
                warn!(region = %region, error = %source, "Address listing failed");
                FindError::Provider {
                    region: region.to_string(),
                    source,
                }
            })?;

        let found = list
            .items
            .into_iter()
            .find(|a| a.is_reserved() && a.has_label(&filter.label_key, &filter.label_value));

        match found {
            Some(address) => {
                info!(region = %region, address = %address.address, name = %address.name, "Found reserved address");
                Ok(address.address)
            }
            None => {
                info!(region = %region, filter = %filter, "No free address found");
                Err(FindError::NotFound {
                    region: region.to_string(),
                    filter: filter.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use kip_testing::{Call, FakeCompute};

    use super::*;

    fn filter() -> AddressFilter {
        AddressFilter::new("kip", "reserved")
    }

    #[tokio::test]
    async fn test_returns_first_matching_address() {
        let fake = Arc::new(
            FakeCompute::new()
                .with_address("us-central1", "35.0.0.1", "IN_USE", &[("kip", "reserved")])
                .with_address("us-central1", "35.0.0.2", "RESERVED", &[("kip", "other")])
                .with_address("us-central1", "35.0.0.3", "RESERVED", &[("kip", "reserved")])
                .with_address("us-central1", "35.0.0.4", "RESERVED", &[("kip", "reserved")]),
        );
        let finder = AddressFinder::new(fake.clone());

        let address = finder
            .find_address("p1", "us-central1", &filter())
            .await
            .unwrap();
        assert_eq!(address, "35.0.0.3");

        assert_eq!(
            fake.calls(),
            vec![Call::ListAddresses {
                project: "p1".to_string(),
                region: "us-central1".to_string(),
                filter: "(status=RESERVED) AND (labels.kip=reserved)".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_empty_pool_is_not_found() {
        let fake = Arc::new(
            FakeCompute::new().with_address("europe-west1", "35.0.0.1", "RESERVED", &[("kip", "reserved")]),
        );
        let finder = AddressFinder::new(fake);

        let err = finder
            .find_address("p1", "us-central1", &filter())
            .await
            .unwrap_err();
        assert!(matches!(err, FindError::NotFound { ref region, .. } if region == "us-central1"));
    }

    #[tokio::test]
    async fn test_listing_failure_is_provider_error() {
        let fake = Arc::new(FakeCompute::new().failing_list());
        let finder = AddressFinder::new(fake);

        let err = finder
            .find_address("p1", "us-central1", &filter())
            .await
            .unwrap_err();
        assert!(matches!(err, FindError::Provider { .. }));
    }
}
