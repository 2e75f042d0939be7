//! Form-facing adapters: the subscription finisher, the interests form
//! element and the option data sources used by editors.

use crate::errors::{AppError, MailChimpError};
use crate::models::{Member, SubscribeOptions};
use crate::placeholders::{interpolate, replace_placeholders, resolve_path};
use crate::services::MailChimpService;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const INTEREST_CATEGORY_DATA_SOURCE: &str = "mailchimp-interest-category";
pub const INTEREST_DATA_SOURCE: &str = "mailchimp-interest";

#[derive(thiserror::Error, Debug)]
pub enum FormError {
    #[error("Property \"{0}\" missing")]
    MissingProperty(&'static str),
    #[error("Failed to subscribe \"{email_address}\" to list \"{list_id}\"!")]
    SubscriptionFailed {
        email_address: String,
        list_id: String,
        #[source]
        source: MailChimpError,
    },
    #[error(transparent)]
    MailChimp(#[from] MailChimpError),
}

impl From<FormError> for AppError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::MissingProperty(_) => AppError::BadRequest(err.to_string()),
            FormError::SubscriptionFailed { ref source, .. } => {
                tracing::warn!("{}: {}", err, source);
                AppError::ExternalApiError(err.to_string())
            }
            FormError::MailChimp(e) => e.into(),
        }
    }
}

// ============ Subscription Finisher ============

fn default_email_template() -> String {
    "{email}".to_string()
}

/// Finisher options. Every string may reference submitted values as
/// `{field}` or `{group.field}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFinisherOptions {
    pub list_id: String,
    #[serde(default = "default_email_template")]
    pub email_address: String,
    /// Merge fields, e.g. `{"FNAME": "{firstName}"}`.
    #[serde(default)]
    pub additional_fields: Option<Value>,
    /// Interest id -> value; entries resolving to false or "" are dropped.
    #[serde(default)]
    pub interest_groups: Option<Value>,
}

/// Subscribes the submitter of a form once it has been validated.
pub struct SubscriptionFinisher<'a> {
    service: &'a MailChimpService,
    options: SubscriptionFinisherOptions,
}

impl<'a> SubscriptionFinisher<'a> {
    pub fn new(service: &'a MailChimpService, options: SubscriptionFinisherOptions) -> Self {
        Self { service, options }
    }

    /// Subscribes the resolved address. `None` means MailChimp accepted the
    /// write without returning the member.
    pub async fn execute(&self, form_values: &Value) -> Result<Option<Member>, FormError> {
        let resolver = |path: &str| resolve_path(form_values, path);

        let list_id = interpolate(&self.options.list_id, resolver);
        let email_address = interpolate(&self.options.email_address, resolver);
        if list_id.is_empty() {
            return Err(FormError::MissingProperty("listId"));
        }

        let merge_fields = self
            .options
            .additional_fields
            .as_ref()
            .map(|fields| replace_placeholders(fields, &resolver))
            .and_then(|fields| match fields {
                Value::Object(map) => Some(map),
                other => {
                    tracing::warn!("Ignoring non-object additional fields: {}", other);
                    None
                }
            });

        let interests = self
            .options
            .interest_groups
            .as_ref()
            .map(|groups| selected_interests(&replace_placeholders(groups, &resolver)));

        let options = SubscribeOptions {
            merge_fields,
            interests,
            marketing_permissions: None,
        };

        self.service
            .subscribe(&list_id, &email_address, &options)
            .await
            .map_err(|source| FormError::SubscriptionFailed {
                email_address,
                list_id,
                source,
            })
    }
}

/// Keeps the interest ids whose resolved value counts as checked.
pub fn selected_interests(groups: &Value) -> BTreeMap<String, bool> {
    let Some(groups) = groups.as_object() else {
        return BTreeMap::new();
    };

    groups
        .iter()
        .filter(|(_, value)| is_checked(value))
        .map(|(id, _)| (id.clone(), true))
        .collect()
}

fn is_checked(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty() && s != "false",
        _ => true,
    }
}

// ============ Interests Form Element ============

/// Element properties as configured by the editor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestsElementProperties {
    pub list_id: Option<String>,
    pub category_id: Option<String>,
    pub label: Option<String>,
}

/// What a renderer needs to draw the interest choices of one category.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InterestsFormElement {
    pub label: String,
    /// checkboxes, radio, dropdown or hidden.
    #[serde(rename = "type")]
    pub kind: String,
    pub options: Map<String, Value>,
}

pub async fn render_interests_element(
    service: &MailChimpService,
    properties: &InterestsElementProperties,
) -> Result<InterestsFormElement, FormError> {
    let list_id = properties
        .list_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(FormError::MissingProperty("listId"))?;
    let category_id = properties
        .category_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(FormError::MissingProperty("categoryId"))?;

    let category = service
        .get_category_by_list_and_category(list_id, category_id)
        .await?;
    let options = service
        .get_interests_form_options(list_id, category_id)
        .await?;

    let label = properties
        .label
        .clone()
        .filter(|label| !label.is_empty())
        .unwrap_or(category.title);

    Ok(InterestsFormElement {
        label,
        kind: category.kind,
        options,
    })
}

// ============ Data Sources ============

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DataSourceOption {
    pub value: String,
    pub label: String,
}

/// Interest categories of a list as `{value: id, label: title}`.
pub async fn interest_category_options(
    service: &MailChimpService,
    list_id: &str,
) -> Result<Vec<DataSourceOption>, MailChimpError> {
    let categories = service.get_interest_categories_by_list(list_id).await?;
    Ok(categories
        .into_iter()
        .map(|category| DataSourceOption {
            value: category.id,
            label: category.title,
        })
        .collect())
}

/// Interests of one category as `{value: id, label: name}`.
pub async fn interest_options(
    service: &MailChimpService,
    list_id: &str,
    category_id: &str,
) -> Result<Vec<DataSourceOption>, MailChimpError> {
    let interests = service
        .get_interests_by_list_and_category(list_id, category_id)
        .await?;
    Ok(interests
        .into_iter()
        .map(|interest| DataSourceOption {
            value: interest.id,
            label: interest.name,
        })
        .collect())
}
