use crate::envelope::{Envelope, Row};
use serde_json::{Value as JsonValue, json};
use tracing::{debug, warn};

/// Procedures answered locally with a synthesized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticProcedure {
    PersonalAccount,
    AccountBySlug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcHandler {
    Static(StaticProcedure),
    /// No backing implementation; resolves to an empty success.
    Unimplemented,
}

const REGISTRY: &[(&str, StaticProcedure)] = &[
    ("get_personal_account", StaticProcedure::PersonalAccount),
    ("get_account_by_slug", StaticProcedure::AccountBySlug),
];

const DEFAULT_ACCOUNT_SLUG: &str = "default-account";

/// Fixed name-to-handler table. Nothing is registered at runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcRegistry;

impl RpcRegistry {
    pub fn resolve(&self, name: &str) -> RpcHandler {
        REGISTRY
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, procedure)| RpcHandler::Static(*procedure))
            .unwrap_or(RpcHandler::Unimplemented)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|(name, _)| *name)
    }

    /// Never touches the network and never fails.
    pub fn dispatch(&self, name: &str, params: &JsonValue) -> Envelope<Row> {
        match self.resolve(name) {
            RpcHandler::Static(procedure) => {
                debug!(procedure = name, "answering rpc from static registry");
                Envelope::ok(procedure.record(params))
            }
            RpcHandler::Unimplemented => {
                warn!(procedure = name, "rpc function not implemented, returning null");
                Envelope::empty()
            }
        }
    }
}

impl StaticProcedure {
    pub fn record(self, params: &JsonValue) -> Row {
        let now = crate::now_rfc3339();
        let value = match self {
            StaticProcedure::PersonalAccount => json!({
                "id": "personal-account-id",
                "name": "Personal Account",
                "email": "user@example.com",
                "created_at": now,
                "updated_at": now,
            }),
            StaticProcedure::AccountBySlug => {
                let slug = params
                    .get("slug")
                    .and_then(JsonValue::as_str)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(DEFAULT_ACCOUNT_SLUG);
                json!({
                    "id": "account-id",
                    "slug": slug,
                    "name": "Account Name",
                    "created_at": now,
                    "updated_at": now,
                })
            }
        };
        match value {
            JsonValue::Object(map) => map,
            _ => Row::new(),
        }
    }
}
