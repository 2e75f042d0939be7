use crate::config::Config;
use crate::errors::MailChimpError;
use crate::lazy_query::{LazyQuery, Page};
use crate::mailchimp_client::MailChimpClient;
use crate::models::*;
use moka::future::Cache;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

/// Default lifetime of cached interest metadata.
pub const METADATA_CACHE_TTL: Duration = Duration::from_secs(3600);

const METADATA_CACHE_CAPACITY: u64 = 10_000;

/// Central authority for everything that talks to MailChimp.
///
/// Built once at startup and shared behind an `Arc`. The only state besides
/// the client is the interest metadata cache, keyed by the full
/// `(list, category)` pair because category ids are only unique per list.
#[derive(Clone)]
pub struct MailChimpService {
    client: MailChimpClient,
    categories_cache: Cache<String, Vec<InterestCategory>>,
    category_cache: Cache<(String, String), InterestCategory>,
    interests_cache: Cache<(String, String), Vec<Interest>>,
}

impl MailChimpService {
    pub fn new(client: MailChimpClient, cache_ttl: Duration) -> Self {
        Self {
            client,
            categories_cache: metadata_cache(cache_ttl),
            category_cache: metadata_cache(cache_ttl),
            interests_cache: metadata_cache(cache_ttl),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, MailChimpError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = match &config.base_url {
            Some(base_url) => MailChimpClient::with_base_url(&config.api_key, base_url, timeout)?,
            None => MailChimpClient::new(&config.api_key, timeout)?,
        };
        Ok(Self::new(
            client,
            Duration::from_secs(config.interest_cache_ttl_secs),
        ))
    }

    pub fn client(&self) -> &MailChimpClient {
        &self.client
    }

    /// All lists of the account, fetched lazily.
    pub fn get_lists(&self) -> LazyQuery<MailingList> {
        let client = self.client.clone();
        let count_client = self.client.clone();

        LazyQuery::new(move |page| {
            let client = client.clone();
            async move {
                let response: ListsResponse =
                    client.get("lists", Some(&pagination_arguments(page))).await?;
                Ok(response.lists)
            }
        })
        .with_count(move || {
            let client = count_client.clone();
            async move {
                let total: TotalItems = client.get("lists", Some(&json!({"count": 0}))).await?;
                Ok(total.total_items)
            }
        })
    }

    pub async fn get_list_by_id(&self, list_id: &str) -> Result<MailingList, MailChimpError> {
        self.client.get(&format!("lists/{}", list_id), None).await
    }

    /// Members of a list, one page per fetch; `count()` asks for
    /// `total_items` with `count=0` instead of downloading members.
    pub fn get_members_by_list_id(&self, list_id: &str) -> LazyQuery<Member> {
        let resource = format!("lists/{}/members", list_id);
        let client = self.client.clone();
        let count_client = self.client.clone();
        let count_resource = resource.clone();

        LazyQuery::new(move |page| {
            let client = client.clone();
            let resource = resource.clone();
            async move {
                let response: MembersResponse = client
                    .get(&resource, Some(&pagination_arguments(page)))
                    .await?;
                Ok(response.members)
            }
        })
        .with_count(move || {
            let client = count_client.clone();
            let resource = count_resource.clone();
            async move {
                let total: TotalItems = client.get(&resource, Some(&json!({"count": 0}))).await?;
                Ok(total.total_items)
            }
        })
    }

    /// True only for members whose status is exactly `subscribed`.
    /// Unknown addresses are not an error here.
    pub async fn is_member(&self, list_id: &str, email_address: &str) -> Result<bool, MailChimpError> {
        match self.get_member_info(list_id, email_address).await {
            Ok(member) => Ok(member.status == MemberStatus::Subscribed),
            Err(MailChimpError::ResourceNotFound(_)) => {
                tracing::debug!("No member {} on list {}", email_address, list_id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_member_info(
        &self,
        list_id: &str,
        email_address: &str,
    ) -> Result<Member, MailChimpError> {
        self.client
            .get(&member_resource(list_id, email_address), None)
            .await
    }

    /// Upserts the member as `pending`, which makes MailChimp send the
    /// double opt-in confirmation mail.
    ///
    /// Write calls return `None` when MailChimp acknowledges without a body.
    pub async fn subscribe(
        &self,
        list_id: &str,
        email_address: &str,
        options: &SubscribeOptions,
    ) -> Result<Option<Member>, MailChimpError> {
        tracing::info!("Subscribing {} to list {}", email_address, list_id);
        let payload = upsert_payload(email_address, MemberStatus::Pending, options)?;
        self.client
            .put(&member_resource(list_id, email_address), Some(&payload))
            .await
    }

    pub async fn unsubscribe(
        &self,
        list_id: &str,
        email_address: &str,
    ) -> Result<Option<Member>, MailChimpError> {
        tracing::info!("Unsubscribing {} from list {}", email_address, list_id);
        let payload = upsert_payload(
            email_address,
            MemberStatus::Unsubscribed,
            &SubscribeOptions::default(),
        )?;
        self.client
            .put(&member_resource(list_id, email_address), Some(&payload))
            .await
    }

    pub async fn update_interests(
        &self,
        list_id: &str,
        email_address: &str,
        interests: &BTreeMap<String, bool>,
    ) -> Result<Option<Member>, MailChimpError> {
        tracing::info!(
            "Updating {} interests of {} on list {}",
            interests.len(),
            email_address,
            list_id
        );
        self.client
            .patch(
                &member_resource(list_id, email_address),
                Some(&json!({ "interests": interests })),
            )
            .await
    }

    pub async fn get_interest_categories_by_list(
        &self,
        list_id: &str,
    ) -> Result<Vec<InterestCategory>, MailChimpError> {
        let resource = format!("lists/{}/interest-categories", list_id);
        cached(
            &self.categories_cache,
            list_id.to_string(),
            async {
                let response: InterestCategoriesResponse = self.client.get(&resource, None).await?;
                Ok(response.categories)
            },
        )
        .await
    }

    pub async fn get_category_by_list_and_category(
        &self,
        list_id: &str,
        category_id: &str,
    ) -> Result<InterestCategory, MailChimpError> {
        let resource = format!("lists/{}/interest-categories/{}", list_id, category_id);
        cached(
            &self.category_cache,
            (list_id.to_string(), category_id.to_string()),
            self.client.get(&resource, None),
        )
        .await
    }

    pub async fn get_interests_by_list_and_category(
        &self,
        list_id: &str,
        category_id: &str,
    ) -> Result<Vec<Interest>, MailChimpError> {
        let resource = format!(
            "lists/{}/interest-categories/{}/interests",
            list_id, category_id
        );
        cached(
            &self.interests_cache,
            (list_id.to_string(), category_id.to_string()),
            async {
                let response: InterestsResponse = self.client.get(&resource, None).await?;
                Ok(response.interests)
            },
        )
        .await
    }

    /// Selectable options `id -> name`, ordered by `display_order`.
    pub async fn get_interests_form_options(
        &self,
        list_id: &str,
        category_id: &str,
    ) -> Result<Map<String, Value>, MailChimpError> {
        let interests = self
            .get_interests_by_list_and_category(list_id, category_id)
            .await?;
        Ok(interest_form_options(interests))
    }
}

/// Sorts by `display_order` (stable, so ties keep provider order) and
/// projects to an ordered `id -> name` map.
pub fn interest_form_options(mut interests: Vec<Interest>) -> Map<String, Value> {
    interests.sort_by_key(|interest| interest.display_order);
    interests
        .into_iter()
        .map(|interest| (interest.id, Value::String(interest.name)))
        .collect()
}

fn metadata_cache<K, V>(ttl: Duration) -> Cache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .time_to_live(ttl)
        .max_capacity(METADATA_CACHE_CAPACITY)
        .build()
}

/// Reads through `cache`; concurrent misses on one key share a single load.
async fn cached<K, V, F>(cache: &Cache<K, V>, key: K, load: F) -> Result<V, MailChimpError>
where
    K: Debug + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Future<Output = Result<V, MailChimpError>>,
{
    if let Some(hit) = cache.get(&key).await {
        tracing::debug!("MailChimp metadata cache HIT: {:?}", key);
        return Ok(hit);
    }

    tracing::debug!("MailChimp metadata cache MISS: {:?}", key);
    cache
        .try_get_with(key, load)
        .await
        .map_err(|e| (*e).clone())
}

fn member_resource(list_id: &str, email_address: &str) -> String {
    format!("lists/{}/members/{}", list_id, subscriber_hash(email_address))
}

fn pagination_arguments(page: Page) -> Value {
    json!({
        "offset": page.offset,
        "count": page.limit,
    })
}

fn upsert_payload(
    email_address: &str,
    status: MemberStatus,
    options: &SubscribeOptions,
) -> Result<Value, MailChimpError> {
    serde_json::to_value(MemberUpsert {
        email_address,
        status,
        options,
    })
    .map_err(|e| MailChimpError::ApiError(format!("Failed to encode member payload: {}", e)))
}
