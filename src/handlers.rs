use crate::errors::{AppError, MailChimpError};
use crate::forms::{
    self, InterestsElementProperties, SubscriptionFinisher, SubscriptionFinisherOptions,
    INTEREST_CATEGORY_DATA_SOURCE, INTEREST_DATA_SOURCE,
};
use crate::models::{MailingList, SubscribeOptions};
use crate::services::MailChimpService;
use crate::validation::UniqueSubscriptionValidator;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// The one MailChimp service of the process.
    pub service: MailChimpService,
}

/// Builds every route of the service. Tracing and CORS layers are added by
/// the binary.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/lists", get(list_index))
        .route("/api/v1/lists/:list_id", get(list_detail))
        .route("/api/v1/lists/:list_id/subscribe", post(subscribe_member))
        .route("/api/v1/lists/:list_id/unsubscribe", post(unsubscribe_member))
        .route("/api/v1/lists/:list_id/interests", patch(update_member_interests))
        .route("/api/v1/lists/:list_id/validate", get(validate_subscription))
        .route(
            "/api/v1/lists/:list_id/interest-categories/:category_id/element",
            get(interests_element),
        )
        .route("/api/v1/forms/subscribe", post(finish_subscription_form))
        .route("/api/v1/data-sources/:identifier", get(data_source))
        // Form posts are tiny; 1MB is plenty
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "mailchimp-signup",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/lists
///
/// All lists of the account.
pub async fn list_index(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let lists = state
        .service
        .get_lists()
        .execute()
        .into_vec()
        .await
        .map_err(|e| {
            AppError::ExternalApiError(format!(
                "An error occurred while trying to fetch lists from MailChimp: \"{}\"",
                e.detail()
            ))
        })?;

    Ok(Json(json!({ "lists": lists })))
}

/// GET /api/v1/lists/:list_id?limit=&offset=
///
/// One list plus a page of its members. Only `limit` and `offset` are
/// accepted; members cannot be filtered or sorted.
pub async fn list_detail(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    let (limit, offset) = pagination_from_params(&params)?;
    let list = fetch_list_by_id(&state, &list_id).await?;

    let mut query = state.service.get_members_by_list_id(&list_id);
    if let Some(limit) = limit {
        query.set_limit(limit);
    }
    if let Some(offset) = offset {
        query.set_offset(offset);
    }

    let members_error = |e: MailChimpError| {
        AppError::ExternalApiError(format!(
            "An error occurred while trying to fetch members for list \"{}\" from MailChimp: \"{}\"",
            list.name,
            e.detail()
        ))
    };

    let result = query.execute();
    let total_items = result.count().await.map_err(members_error)?;
    let members = result.into_vec().await.map_err(members_error)?;

    Ok(Json(json!({
        "list": list,
        "members": members,
        "total_items": total_items,
        "limit": limit,
        "offset": offset,
    })))
}

#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    pub email_address: String,
    #[serde(default)]
    pub options: SubscribeOptions,
}

/// POST /api/v1/lists/:list_id/subscribe
pub async fn subscribe_member(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    Json(request): Json<MemberRequest>,
) -> Result<Json<Value>, AppError> {
    let list = fetch_list_by_id(&state, &list_id).await?;

    let member = state
        .service
        .subscribe(&list.id, &request.email_address, &request.options)
        .await
        .map_err(|e| {
            AppError::ExternalApiError(format!(
                "An error occurred while trying to subscribe the email \"{}\" to list \"{}\": \"{}\"",
                request.email_address,
                list.name,
                e.detail()
            ))
        })?;

    Ok(Json(json!({
        "message": format!(
            "Subscribed email \"{}\" to list \"{}\". Note: The user will receive an email to confirm the subscription!",
            request.email_address, list.name
        ),
        "member": member,
    })))
}

/// POST /api/v1/lists/:list_id/unsubscribe
pub async fn unsubscribe_member(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    Json(request): Json<MemberRequest>,
) -> Result<Json<Value>, AppError> {
    let list = fetch_list_by_id(&state, &list_id).await?;

    let member = state
        .service
        .unsubscribe(&list.id, &request.email_address)
        .await
        .map_err(|e| {
            AppError::ExternalApiError(format!(
                "An error occurred while trying to unsubscribe the email \"{}\" from list \"{}\": \"{}\"",
                request.email_address,
                list.name,
                e.detail()
            ))
        })?;

    Ok(Json(json!({
        "message": format!(
            "Unsubscribed email \"{}\" from list \"{}\".",
            request.email_address, list.name
        ),
        "member": member,
    })))
}

#[derive(Debug, Deserialize)]
pub struct InterestsRequest {
    pub email_address: String,
    pub interests: BTreeMap<String, bool>,
}

/// PATCH /api/v1/lists/:list_id/interests
pub async fn update_member_interests(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    Json(request): Json<InterestsRequest>,
) -> Result<Json<Value>, AppError> {
    let member = state
        .service
        .update_interests(&list_id, &request.email_address, &request.interests)
        .await?;

    Ok(Json(json!({ "member": member })))
}

#[derive(Debug, Deserialize)]
pub struct ValidateParams {
    #[serde(default)]
    pub email: String,
}

/// GET /api/v1/lists/:list_id/validate?email=
///
/// Unique subscription check used by signup forms before submitting.
pub async fn validate_subscription(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<String>,
    Query(params): Query<ValidateParams>,
) -> Result<Json<Value>, AppError> {
    let validator = UniqueSubscriptionValidator::new(&state.service, &list_id);
    let result = validator.validate(&params.email).await?;

    Ok(Json(json!({
        "valid": result.is_valid(),
        "errors": result.errors,
    })))
}

#[derive(Debug, Deserialize)]
pub struct FinisherRequest {
    pub options: SubscriptionFinisherOptions,
    /// Submitted form values, referenced by `{placeholders}` in the options.
    #[serde(default)]
    pub values: Value,
}

/// POST /api/v1/forms/subscribe
pub async fn finish_subscription_form(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FinisherRequest>,
) -> Result<Json<Value>, AppError> {
    let finisher = SubscriptionFinisher::new(&state.service, request.options);
    let member = finisher.execute(&request.values).await?;

    Ok(Json(json!({ "member": member })))
}

#[derive(Debug, Deserialize)]
pub struct ElementParams {
    pub label: Option<String>,
}

/// GET /api/v1/lists/:list_id/interest-categories/:category_id/element
pub async fn interests_element(
    State(state): State<Arc<AppState>>,
    Path((list_id, category_id)): Path<(String, String)>,
    Query(params): Query<ElementParams>,
) -> Result<Json<forms::InterestsFormElement>, AppError> {
    let properties = InterestsElementProperties {
        list_id: Some(list_id),
        category_id: Some(category_id),
        label: params.label,
    };
    let element = forms::render_interests_element(&state.service, &properties).await?;
    Ok(Json(element))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceParams {
    pub list_id: Option<String>,
    pub category_id: Option<String>,
}

/// GET /api/v1/data-sources/:identifier?listId=&categoryId=
pub async fn data_source(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    Query(params): Query<DataSourceParams>,
) -> Result<Json<Vec<forms::DataSourceOption>>, AppError> {
    let list_id = params
        .list_id
        .ok_or_else(|| AppError::BadRequest("listId is required".to_string()))?;

    let options = match identifier.as_str() {
        INTEREST_CATEGORY_DATA_SOURCE => {
            forms::interest_category_options(&state.service, &list_id).await?
        }
        INTEREST_DATA_SOURCE => {
            let category_id = params
                .category_id
                .ok_or_else(|| AppError::BadRequest("categoryId is required".to_string()))?;
            forms::interest_options(&state.service, &list_id, &category_id).await?
        }
        other => {
            return Err(AppError::NotFound(format!(
                "Unknown data source \"{}\"",
                other
            )))
        }
    };

    Ok(Json(options))
}

/// Fetches a list, turning a 404 into the message editors know.
async fn fetch_list_by_id(state: &AppState, list_id: &str) -> Result<MailingList, AppError> {
    match state.service.get_list_by_id(list_id).await {
        Ok(list) => Ok(list),
        Err(MailChimpError::ResourceNotFound(_)) => Err(AppError::NotFound(format!(
            "The list with id \"{}\" does not exist",
            list_id
        ))),
        Err(e) => Err(AppError::ExternalApiError(format!(
            "An error occurred while trying to fetch list with id \"{}\" from MailChimp: \"{}\"",
            list_id,
            e.detail()
        ))),
    }
}

/// Reads `limit` and `offset`; anything else asks for filtering or
/// sorting, which the members query cannot do.
fn pagination_from_params(
    params: &HashMap<String, String>,
) -> Result<(Option<usize>, Option<usize>), AppError> {
    let mut limit = None;
    let mut offset = None;

    for (key, value) in params {
        let parsed = || {
            value.parse::<usize>().map_err(|_| {
                AppError::BadRequest(format!("{} must be a non-negative number", key))
            })
        };
        match key.as_str() {
            "limit" => limit = Some(parsed()?),
            "offset" => offset = Some(parsed()?),
            other => {
                return Err(MailChimpError::UnsupportedOperation(format!(
                    "Query parameter \"{}\" is not supported; members can only be paginated with limit and offset",
                    other
                ))
                .into())
            }
        }
    }

    Ok((limit, offset))
}
