//! Organization persistence contracts.

use async_trait::async_trait;

use bookings_core::paging::normalize_page_size;
use bookings_core::{
    Filter, OrganizationId, PagedReadRepository, PageRequest, PageToken, RepositoryError, Sort,
    WriteRepository,
};

use crate::organization::Organization;

/// Listing field names understood by organization read repositories.
pub mod fields {
    pub const ORGANIZATION_ID: &str = "organization_id";
    pub const NAME: &str = "name";
    pub const CREATE_TIME: &str = "create_time";
    pub const IS_DELETED: &str = "is_deleted";
}

/// Write side for organizations.
#[async_trait]
pub trait OrganizationRepository: WriteRepository<Organization> {
    /// Whether a non-deleted organization already uses `name`.
    async fn exists_by_name(&self, name: &str) -> Result<bool, RepositoryError>;
}

/// Read side for organizations.
pub trait OrganizationReadRepository:
    PagedReadRepository<OrganizationId, Organization, Criteria = ListOrganizations>
{
}

impl<T> OrganizationReadRepository for T where
    T: PagedReadRepository<OrganizationId, Organization, Criteria = ListOrganizations>
{
}

/// Criteria for listing organizations, oldest first. Soft-deleted rows are
/// left out unless `including_deleted` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOrganizations {
    pub page_size: u32,
    pub page_token: Option<PageToken>,
    pub include_deleted: bool,
}

impl ListOrganizations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_token(mut self, token: Option<PageToken>) -> Self {
        self.page_token = token;
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Translate into a generic page request.
    pub fn to_page_request(&self) -> PageRequest {
        let mut request = PageRequest::new(Sort::ascending(fields::CREATE_TIME))
            .with_page_size(normalize_page_size(self.page_size))
            .with_page_token(self.page_token.clone());
        if !self.include_deleted {
            request = request.with_filter(Filter::equal(fields::IS_DELETED, false));
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookings_core::paging::DEFAULT_PAGE_SIZE;
    use bookings_core::SortDirection;

    #[test]
    fn list_request_sorts_by_create_time() {
        let request = ListOrganizations::new().to_page_request();

        assert_eq!(request.sort().field(), fields::CREATE_TIME);
        assert_eq!(request.sort().direction(), SortDirection::Ascending);
        assert_eq!(request.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn default_listing_hides_deleted_rows() {
        let request = ListOrganizations::new().with_page_size(10).to_page_request();

        assert_eq!(request.page_size(), 10);
        assert_eq!(request.filters(), &[Filter::equal(fields::IS_DELETED, false)]);
    }

    #[test]
    fn including_deleted_drops_the_filter() {
        let request = ListOrganizations::new().including_deleted().to_page_request();

        assert!(request.filters().is_empty());
    }
}
