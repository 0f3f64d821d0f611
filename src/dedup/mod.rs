//! Deduplication strategies for harvested job listings
//!
//! A site selects one of three fingerprinting strategies. The fingerprint is
//! always recomputed at save time; stored hashes are never trusted as
//! authoritative until written.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;
use crate::models::CrawledJob;
use crate::storage::JobRepository;

/// Strategy used to decide whether a harvested listing has already been stored
///
/// Unknown strategy strings in stored configuration fall back to [`Self::Url`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DedupStrategy {
    /// Exact detail-URL match
    #[default]
    Url,
    /// Hash of title, company, and location joined in order
    Composite,
    /// Site-supplied external identifier
    ExternalId,
}

impl DedupStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Composite => "composite",
            Self::ExternalId => "external_id",
        }
    }

    /// Compute the deduplication fingerprint for a candidate record
    ///
    /// `Composite` is intentionally order- and case-sensitive: callers that
    /// need normalization apply it upstream via field transformations.
    pub fn fingerprint(&self, job: &CrawledJob) -> String {
        match self {
            Self::Url => job.detail_url.clone(),
            Self::Composite => {
                let joined = format!("{}|{}|{}", job.title, job.company, job.location);
                let mut hasher = Sha256::new();
                hasher.update(joined.as_bytes());
                format!("{:x}", hasher.finalize())
            }
            Self::ExternalId => job.external_id.clone(),
        }
    }

    /// Check whether an equivalent record is already persisted
    ///
    /// The candidate's `deduplication_hash` must already hold the value of
    /// [`Self::fingerprint`]. An `ExternalId` strategy with an empty external
    /// id cannot match anything and reports no duplicate.
    ///
    /// # Errors
    ///
    /// Propagates repository lookup failures.
    pub async fn is_duplicate(
        &self,
        repo: &dyn JobRepository,
        job: &CrawledJob,
    ) -> Result<bool, StorageError> {
        match self {
            Self::Url => repo.exists_by_url(&job.detail_url).await,
            Self::Composite => repo.exists_by_hash(&job.deduplication_hash).await,
            Self::ExternalId => {
                if job.external_id.is_empty() {
                    Ok(false)
                } else {
                    repo.exists_by_external_id(&job.external_id).await
                }
            }
        }
    }
}

impl From<String> for DedupStrategy {
    fn from(s: String) -> Self {
        match s.as_str() {
            "composite" => Self::Composite,
            "external_id" => Self::ExternalId,
            _ => Self::Url,
        }
    }
}

impl From<DedupStrategy> for String {
    fn from(strategy: DedupStrategy) -> Self {
        strategy.as_str().to_string()
    }
}
