//! MailChimp Newsletter Signup Library
//!
//! Wraps the MailChimp v3 API for newsletter signup: browsing lists and
//! members, subscribing and unsubscribing visitors, validating that an
//! address is not already subscribed, and turning interest categories into
//! form options.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `forms`: Subscription finisher, interests form element and data sources.
//! - `handlers`: HTTP request handlers and router.
//! - `lazy_query`: Lazily fetched, paginated result sets.
//! - `mailchimp_client`: MailChimp REST client.
//! - `models`: Provider records and the subscriber hash.
//! - `placeholders`: `{variable}` interpolation.
//! - `services`: The MailChimp domain service with its metadata cache.
//! - `validation`: Email and unique subscription validation.

pub mod config;
pub mod errors;
pub mod forms;
pub mod handlers;
pub mod lazy_query;
pub mod mailchimp_client;
pub mod models;
pub mod placeholders;
pub mod services;
pub mod validation;
