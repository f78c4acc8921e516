use crate::domains::household::catalog::{survey_catalog, SurveyCatalog};
use crate::domains::household::repository::HouseholdRepository;
use crate::domains::household::types::{HouseholdResponse, NewHousehold};
use crate::domains::sync::status_journal::StatusJournal;
use crate::domains::sync::types::SyncStatusCategory;
use crate::errors::{DomainError, ServiceResult};
use crate::types::{PaginatedResult, PaginationParams};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// All visible households plus the reason, if any, the stored data could not be read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdList {
    pub records: Vec<HouseholdResponse>,
    pub load_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdPage {
    pub page: PaginatedResult<HouseholdResponse>,
    pub load_error: Option<String>,
}

/// Figures shown on the home screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeSummary {
    pub total_households: usize,
    pub last_sync_status: Option<String>,
    pub last_sync_category: Option<SyncStatusCategory>,
}

/// Trait defining household service operations
#[async_trait]
pub trait HouseholdService: Send + Sync {
    async fn create_household(&self, draft: NewHousehold) -> ServiceResult<HouseholdResponse>;

    async fn update_household(&self, id: &str, draft: NewHousehold) -> ServiceResult<HouseholdResponse>;

    async fn delete_household(&self, id: &str) -> ServiceResult<()>;

    async fn get_household(&self, id: &str) -> ServiceResult<HouseholdResponse>;

    async fn list_households(&self) -> ServiceResult<HouseholdList>;

    async fn list_households_page(&self, params: PaginationParams) -> ServiceResult<HouseholdPage>;

    async fn count_households(&self) -> ServiceResult<usize>;

    async fn home_summary(&self) -> ServiceResult<HomeSummary>;

    fn catalog(&self) -> SurveyCatalog;
}

pub struct HouseholdServiceImpl {
    repo: Arc<dyn HouseholdRepository>,
    journal: Arc<StatusJournal>,
}

impl HouseholdServiceImpl {
    pub fn new(repo: Arc<dyn HouseholdRepository>, journal: Arc<StatusJournal>) -> Self {
        Self { repo, journal }
    }
}

#[async_trait]
impl HouseholdService for HouseholdServiceImpl {
    async fn create_household(&self, draft: NewHousehold) -> ServiceResult<HouseholdResponse> {
        let record = self.repo.create(&draft).await?;
        Ok(record.into())
    }

    async fn update_household(&self, id: &str, draft: NewHousehold) -> ServiceResult<HouseholdResponse> {
        let record = self.repo.update(id, &draft).await?;
        Ok(record.into())
    }

    async fn delete_household(&self, id: &str) -> ServiceResult<()> {
        self.repo.delete(id).await?;
        Ok(())
    }

    async fn get_household(&self, id: &str) -> ServiceResult<HouseholdResponse> {
        match self.repo.find_by_id(id).await? {
            Some(record) => Ok(record.into()),
            None => Err(DomainError::EntityNotFound("Household".to_string(), id.to_string()).into()),
        }
    }

    async fn list_households(&self) -> ServiceResult<HouseholdList> {
        let loaded = self.repo.list_valid().await;
        Ok(HouseholdList {
            records: loaded.records.into_iter().map(HouseholdResponse::from).collect(),
            load_error: loaded.load_error.map(|e| e.to_string()),
        })
    }

    async fn list_households_page(&self, params: PaginationParams) -> ServiceResult<HouseholdPage> {
        let (page, load_error) = self.repo.list_page(params).await;
        let items = page.items.into_iter().map(HouseholdResponse::from).collect();
        Ok(HouseholdPage {
            page: PaginatedResult {
                items,
                total: page.total,
                page: page.page,
                per_page: page.per_page,
                total_pages: page.total_pages,
            },
            load_error: load_error.map(|e| e.to_string()),
        })
    }

    async fn count_households(&self) -> ServiceResult<usize> {
        Ok(self.repo.count().await)
    }

    async fn home_summary(&self) -> ServiceResult<HomeSummary> {
        let status = self.journal.view().await;
        Ok(HomeSummary {
            total_households: self.repo.count().await,
            last_sync_status: status.message,
            last_sync_category: status.category,
        })
    }

    fn catalog(&self) -> SurveyCatalog {
        survey_catalog()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::kv_store::test_support::memory_store;
    use crate::domains::core::kv_store::KeyValueStore;
    use crate::domains::household::repository::KvHouseholdRepository;
    use crate::domains::household::scoring::VulnerabilityTier;
    use crate::domains::household::types::fixtures::draft;
    use crate::errors::ServiceError;

    async fn service() -> HouseholdServiceImpl {
        let store: Arc<dyn KeyValueStore> = memory_store().await;
        let repo = Arc::new(KvHouseholdRepository::new(store.clone()));
        let journal = Arc::new(StatusJournal::open(store).await);
        HouseholdServiceImpl::new(repo, journal)
    }

    #[tokio::test]
    async fn test_responses_carry_vulnerability_tier() {
        let svc = service().await;
        let mut d = draft("Mwangi");
        d.assessment_answers.water = Some("River/Stream".to_string());
        let created = svc.create_household(d).await.unwrap();
        assert_eq!(created.vulnerability, VulnerabilityTier::High);

        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["vulnerability"], "High");
        assert_eq!(json["headDetails"]["name"], "Mwangi");
    }

    #[tokio::test]
    async fn test_get_unknown_household_is_not_found() {
        let svc = service().await;
        let result = svc.get_household("ghost").await;
        assert!(matches!(
            result,
            Err(ServiceError::Domain(DomainError::EntityNotFound(_, _)))
        ));
    }

    #[tokio::test]
    async fn test_home_summary_counts_records_and_reports_sync_status() {
        let svc = service().await;
        svc.create_household(draft("A")).await.unwrap();
        svc.create_household(draft("B")).await.unwrap();
        svc.journal.write("Sync failed: Network unavailable. Please check your internet connection.").await.unwrap();

        let summary = svc.home_summary().await.unwrap();
        assert_eq!(summary.total_households, 2);
        assert_eq!(summary.last_sync_category, Some(SyncStatusCategory::Failure));
    }

    #[tokio::test]
    async fn test_page_of_responses() {
        let svc = service().await;
        for i in 0..11 {
            svc.create_household(draft(&format!("Head {}", i))).await.unwrap();
        }
        let page = svc.list_households_page(PaginationParams::page(2)).await.unwrap();
        assert_eq!(page.page.items.len(), 1);
        assert_eq!(page.page.total, 11);
        assert!(page.load_error.is_none());
    }
}
