//! Command envelope surface.
//!
//! Hosts speak to the orchestrator in tagged JSON envelopes. Every request
//! names a command and carries an opaque `scope` the caller uses to route
//! the reply; responses echo the command id and scope untouched and wrap
//! the result in `payload`. A `null` payload is meaningful (for
//! `get-user-status` it means nobody is signed in), so errors are never
//! encoded into it; dispatch rethrows them for the host to handle.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::service::AzureServices;
use crate::types::{AzureError, AzureErrorKind, AzureResult, ResourceKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    Login {
        #[serde(default)]
        scope: Value,
    },
    Logout {
        #[serde(default)]
        scope: Value,
    },
    GetUserStatus {
        #[serde(default)]
        scope: Value,
    },
    #[serde(rename_all = "camelCase")]
    GetSubscriptionData {
        #[serde(default)]
        scope: Value,
        kind: ResourceKind,
        subscription: String,
        #[serde(default)]
        project_name: String,
    },
    #[serde(rename_all = "camelCase")]
    GetValidName {
        #[serde(default)]
        scope: Value,
        kind: ResourceKind,
        project_name: String,
    },
    ValidateName {
        #[serde(default)]
        scope: Value,
        kind: ResourceKind,
        name: String,
        subscription: String,
    },
}

impl Command {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Logout { .. } => "logout",
            Self::GetUserStatus { .. } => "get-user-status",
            Self::GetSubscriptionData { .. } => "get-subscription-data",
            Self::GetValidName { .. } => "get-valid-name",
            Self::ValidateName { .. } => "validate-name",
        }
    }

    pub fn scope(&self) -> &Value {
        match self {
            Self::Login { scope }
            | Self::Logout { scope }
            | Self::GetUserStatus { scope }
            | Self::GetSubscriptionData { scope, .. }
            | Self::GetValidName { scope, .. }
            | Self::ValidateName { scope, .. } => scope,
        }
    }
}

/// Response envelope. `payload` serializes as `null` when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub command: String,
    pub scope: Value,
    pub payload: Option<Value>,
}

pub fn parse_command(raw: &str) -> AzureResult<Command> {
    serde_json::from_str(raw).map_err(|e| AzureError::new(AzureErrorKind::Parse, e.to_string()))
}

fn to_payload<T: Serialize>(value: &T) -> AzureResult<Value> {
    serde_json::to_value(value).map_err(|e| AzureError::new(AzureErrorKind::Parse, e.to_string()))
}

/// Routes one command to the orchestrator and wraps the result.
pub async fn dispatch(
    services: &mut AzureServices,
    command: Command,
) -> AzureResult<CommandResponse> {
    let id = command.id();
    match command {
        Command::Login { scope } => {
            let status = services.login().await?;
            Ok(respond(id, scope, Some(to_payload(&status)?)))
        }
        Command::Logout { scope } => {
            services.logout().await?;
            Ok(respond(id, scope, Some(json!({ "success": true }))))
        }
        Command::GetUserStatus { scope } => {
            let payload = match services.user_status() {
                Some(status) => Some(to_payload(&status)?),
                None => None,
            };
            Ok(respond(id, scope, payload))
        }
        Command::GetSubscriptionData {
            scope,
            kind,
            subscription,
            project_name,
        } => {
            let data = services
                .subscription_data(kind, &subscription, &project_name)
                .await?;
            Ok(respond(id, scope, Some(to_payload(&data)?)))
        }
        Command::GetValidName {
            scope,
            kind,
            project_name,
        } => {
            let name = services.generate_valid_name(kind, &project_name);
            Ok(respond(id, scope, Some(json!({ "name": name }))))
        }
        Command::ValidateName {
            scope,
            kind,
            name,
            subscription,
        } => {
            let result = services.validate_name(kind, &name, &subscription).await?;
            Ok(respond(id, scope, Some(to_payload(&result)?)))
        }
    }
}

fn respond(command: &str, scope: Value, payload: Option<Value>) -> CommandResponse {
    CommandResponse {
        command: command.to_string(),
        scope,
        payload,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ArmClient;
    use crate::names;
    use crate::types::AzureConfig;
    use std::sync::Arc;

    fn services() -> AzureServices {
        AzureServices::over_arm(Arc::new(ArmClient::new()), AzureConfig::new())
    }

    #[test]
    fn parses_tagged_commands() {
        let command = parse_command(r#"{"command":"login","scope":{"panel":1}}"#).unwrap();
        assert_eq!(command.id(), "login");
        assert_eq!(command.scope()["panel"], 1);

        let command = parse_command(
            r#"{"command":"validate-name","kind":"app-service","name":"myapp","subscription":"Dev"}"#,
        )
        .unwrap();
        match command {
            Command::ValidateName { kind, name, subscription, .. } => {
                assert_eq!(kind, ResourceKind::AppService);
                assert_eq!(name, "myapp");
                assert_eq!(subscription, "Dev");
            }
            other => panic!("parsed wrong variant: {:?}", other),
        }
    }

    #[test]
    fn camel_case_fields_on_the_wire() {
        let command = parse_command(
            r#"{"command":"get-valid-name","kind":"cosmos-db","projectName":"My Cool App"}"#,
        )
        .unwrap();
        match command {
            Command::GetValidName { project_name, .. } => assert_eq!(project_name, "My Cool App"),
            other => panic!("parsed wrong variant: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_commands() {
        let err = parse_command(r#"{"command":"no-such-command"}"#).unwrap_err();
        assert_eq!(err.kind, AzureErrorKind::Parse);
        assert!(parse_command("not json").is_err());
    }

    #[test]
    fn null_payload_survives_serialization() {
        let response = CommandResponse {
            command: "get-user-status".into(),
            scope: json!({"panel": 2}),
            payload: None,
        };
        let raw = serde_json::to_string(&response).unwrap();
        assert!(raw.contains("\"payload\":null"));
    }

    #[tokio::test]
    async fn status_before_login_is_null_payload() {
        let mut services = services();
        let response = dispatch(
            &mut services,
            Command::GetUserStatus { scope: json!({"panel": 7}) },
        )
        .await
        .unwrap();
        assert_eq!(response.command, "get-user-status");
        assert_eq!(response.scope["panel"], 7);
        assert!(response.payload.is_none());
    }

    #[tokio::test]
    async fn valid_name_echoes_scope_and_passes_rules() {
        let mut services = services();
        let response = dispatch(
            &mut services,
            Command::GetValidName {
                scope: json!("left-pane"),
                kind: ResourceKind::Functions,
                project_name: "My Cool App".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(response.scope, json!("left-pane"));
        let name = response.payload.unwrap()["name"].as_str().unwrap().to_string();
        assert!(names::check(ResourceKind::Functions, &name).is_none());
    }
}
