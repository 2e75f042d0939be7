use crate::errors::MailChimpError;
use crate::services::MailChimpService;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const INVALID_EMAIL_CODE: u64 = 1221559976;
pub const ALREADY_SUBSCRIBED_CODE: u64 = 1422317184;

/// One failed check, shaped like the form framework's error messages.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    pub code: u64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn add_error(&mut self, message: &str, code: u64) {
        self.errors.push(ValidationError {
            message: message.to_string(),
            code,
        });
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    // RFC 5322 simplified: local@domain.tld
    EMAIL.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email pattern is valid")
    })
}

/// Syntactic email check. Requires a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Rejects addresses that are already subscribed to a list.
///
/// Empty values pass so that "required" stays a separate concern, and
/// malformed addresses fail without contacting MailChimp.
pub struct UniqueSubscriptionValidator<'a> {
    service: &'a MailChimpService,
    list_id: &'a str,
}

impl<'a> UniqueSubscriptionValidator<'a> {
    pub fn new(service: &'a MailChimpService, list_id: &'a str) -> Self {
        Self { service, list_id }
    }

    pub async fn validate(&self, value: &str) -> Result<ValidationResult, MailChimpError> {
        let mut result = ValidationResult::default();
        if value.is_empty() {
            return Ok(result);
        }

        if !is_valid_email(value) {
            result.add_error("Please specify a valid email address.", INVALID_EMAIL_CODE);
            return Ok(result);
        }

        if self.service.is_member(self.list_id, value).await? {
            tracing::info!("{} is already subscribed to list {}", value, self.list_id);
            result.add_error(
                "This email address is already registered in our newsletter.",
                ALREADY_SUBSCRIBED_CODE,
            );
        }

        Ok(result)
    }
}
