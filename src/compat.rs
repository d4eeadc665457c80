//! Auth and storage namespaces with no real backing.
//!
//! Every call is stateless and resolves successfully: sessions and users are
//! always absent, sign-out always succeeds, MFA and storage operations return
//! empty data. Call sites written for a managed backend run unchanged.

use crate::envelope::{Envelope, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub user: Option<User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Listener handle carried in [`SubscriptionData`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AuthSubscription {
    _private: (),
}

impl AuthSubscription {
    pub fn unsubscribe(self) {}
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SubscriptionData {
    pub subscription: AuthSubscription,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthApi {
    mfa: MfaApi,
}

impl AuthApi {
    pub async fn get_session(&self) -> Envelope<SessionData> {
        debug!("auth.get_session");
        Envelope::ok(SessionData::default())
    }

    pub async fn get_user(&self) -> Envelope<UserData> {
        debug!("auth.get_user");
        Envelope::ok(UserData::default())
    }

    pub async fn sign_out(&self) -> ErrorEnvelope {
        debug!("auth.sign_out");
        ErrorEnvelope::default()
    }

    /// There are never any auth events, so `callback` is never invoked.
    pub fn on_auth_state_change<F>(&self, callback: F) -> Envelope<SubscriptionData>
    where
        F: Fn(AuthChangeEvent, Option<&Session>) + Send + Sync + 'static,
    {
        drop(callback);
        debug!("auth.on_auth_state_change");
        Envelope::ok(SubscriptionData::default())
    }

    pub fn mfa(&self) -> &MfaApi {
        &self.mfa
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MfaApi;

impl MfaApi {
    pub async fn enroll(&self) -> Envelope<JsonValue> {
        gap("auth.mfa.enroll")
    }

    pub async fn challenge(&self) -> Envelope<JsonValue> {
        gap("auth.mfa.challenge")
    }

    pub async fn verify(&self) -> Envelope<JsonValue> {
        gap("auth.mfa.verify")
    }

    pub async fn challenge_and_verify(&self) -> Envelope<JsonValue> {
        gap("auth.mfa.challenge_and_verify")
    }

    pub async fn unenroll(&self) -> Envelope<JsonValue> {
        gap("auth.mfa.unenroll")
    }

    pub async fn get_authenticator_assurance_level(&self) -> Envelope<JsonValue> {
        gap("auth.mfa.get_authenticator_assurance_level")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StorageApi;

impl StorageApi {
    pub fn from(&self, bucket: &str) -> StorageBucket {
        StorageBucket {
            bucket: bucket.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageBucket {
    bucket: String,
}

impl StorageBucket {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn upload(&self, path: &str, body: Vec<u8>) -> Envelope<JsonValue> {
        debug!(bucket = %self.bucket, path, bytes = body.len(), "storage.upload");
        Envelope::empty()
    }

    pub async fn download(&self, path: &str) -> Envelope<JsonValue> {
        debug!(bucket = %self.bucket, path, "storage.download");
        Envelope::empty()
    }

    pub async fn remove(&self, paths: &[&str]) -> Envelope<JsonValue> {
        debug!(bucket = %self.bucket, count = paths.len(), "storage.remove");
        Envelope::empty()
    }

    pub async fn create_signed_url(&self, path: &str, expires_in_secs: u64) -> Envelope<JsonValue> {
        debug!(bucket = %self.bucket, path, expires_in_secs, "storage.create_signed_url");
        Envelope::empty()
    }
}

fn gap(operation: &'static str) -> Envelope<JsonValue> {
    debug!(operation, "compatibility gap, returning null");
    Envelope::empty()
}
