//! Azure deployment orchestration for Project Acorn.
//!
//! Provides:
//! - Azure AD client-credential sign-in with per-tenant token caching
//! - Subscription listing across home and sandbox tenants, with a
//!   per-resource-kind subscription cache
//! - Offline name rules plus live availability checks for App Service,
//!   Cosmos DB, Function Apps and resource groups
//! - Resource-group planning: one shared group name across distinct
//!   subscriptions, sandbox groups reused instead of created
//! - Sequenced deployments with tenant-classified tiers, deployment-id
//!   normalization, env-file and app-settings fan-out
//! - A tagged JSON command envelope for UI hosts
//!
//! `service::AzureServices` is the entry point; `commands::dispatch`
//! drives it from envelope JSON.

pub mod app_service;
pub mod auth;
pub mod cache;
pub mod client;
pub mod commands;
pub mod cosmos;
pub mod functions;
pub mod gateway;
pub mod names;
pub mod resource_groups;
pub mod service;
pub mod settings;
pub mod subscriptions;
pub mod types;
