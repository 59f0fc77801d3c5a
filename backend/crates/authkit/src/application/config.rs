//! Application Configuration
//!
//! Callers hand in a loosely shaped JSON document. It is deep-merged over the
//! built-in defaults, patched with the database/mail fallbacks, and then
//! deserialized once into the immutable [`Settings`] every module shares.

use chrono::Duration;
use platform::cookie::{CookieConfig, SameSite};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::{AuthKitError, AuthKitResult};

/// Reserved descriptor of the in-process fallback store
pub const EPHEMERAL_DB_URL: &str = "sqlite://";
pub const EPHEMERAL_DB_NAME: &str = ":memory:";
pub const EPHEMERAL_DB_COLLECTION: &str = "my_user_table";

/// `mail.emailType` installed when no transport is configured
pub const STUB_EMAIL_TYPE: &str = "stub";

/// Built-in defaults; durations are in seconds.
pub fn defaults() -> Value {
    json!({
        "appname": "authkit",
        "url": "http://localhost:3000",
        "signup": {
            "route": "/signup",
            "resendRoute": "/signup/resend-verification",
            "tokenExpiration": 86_400
        },
        "login": {
            "route": "/login",
            "logoutRoute": "/logout",
            "failedLoginAttempts": 5,
            "accountLockedTime": 1_200
        },
        "forgotPassword": {
            "route": "/forgot-password",
            "tokenExpiration": 86_400
        },
        "changeEmail": {
            "route": "/change-email",
            "tokenExpiration": 86_400
        },
        "deleteAccount": {
            "route": "/delete-account",
            "phrase": "please delete my account forever"
        },
        "mail": {
            "emailFrom": "noreply@authkit.local"
        },
        "session": {
            "cookieName": "authkit_session",
            "secure": false,
            "maxAge": 86_400
        }
    })
}

/// Deep-merge `user` over [`defaults`].
///
/// Only absent keys are filled. Explicit values, `false`, `0`, `""` and
/// `null` included, are kept. A non-object input counts as `{}`.
pub fn merge(user: &Value) -> Value {
    let mut merged = match user {
        Value::Object(_) => user.clone(),
        _ => Value::Object(Map::new()),
    };
    fill_absent(&mut merged, &defaults());
    merged
}

fn fill_absent(target: &mut Value, defaults: &Value) {
    let (Value::Object(target), Value::Object(defaults)) = (target, defaults) else {
        return;
    };

    for (key, default) in defaults {
        match target.get_mut(key) {
            Some(existing) => fill_absent(existing, default),
            None => {
                target.insert(key.clone(), default.clone());
            }
        }
    }
}

/// Install the stub mail transport when neither `mail.emailType` nor
/// `mail.emailSettings` is present. Returns whether anything changed.
pub fn ensure_mail(config: &mut Value) -> bool {
    let Value::Object(root) = config else {
        return false;
    };

    let mail = root
        .entry("mail")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(mail) = mail else {
        return false;
    };

    if mail.contains_key("emailType") || mail.contains_key("emailSettings") {
        return false;
    }

    mail.insert("emailType".to_string(), Value::from(STUB_EMAIL_TYPE));
    tracing::info!("no email config found, check your database for tokens");
    true
}

/// Substitute the ephemeral descriptor when `db` is absent or falsy
/// (`null`, `false`, `0`, `""`). Returns whether anything changed.
pub fn ensure_database(config: &mut Value) -> bool {
    let Value::Object(root) = config else {
        return false;
    };

    if root.get("db").is_some_and(|db| !is_falsy(db)) {
        return false;
    }

    root.insert(
        "db".to_string(),
        json!({
            "url": EPHEMERAL_DB_URL,
            "name": EPHEMERAL_DB_NAME,
            "collection": EPHEMERAL_DB_COLLECTION
        }),
    );
    tracing::info!("no db config found, using in-memory store");
    true
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

// ============================================================================
// Typed settings
// ============================================================================

/// Fully resolved configuration, shared by reference with every module.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub appname: String,
    /// Public base URL used in mailed links. Include the prefix the router
    /// is nested under, e.g. `http://localhost:3000/auth`.
    pub url: String,
    pub signup: SignupSettings,
    pub login: LoginSettings,
    pub forgot_password: ForgotPasswordSettings,
    pub change_email: ChangeEmailSettings,
    pub delete_account: DeleteAccountSettings,
    #[serde(default)]
    pub db: Option<DbSettings>,
    pub mail: MailSettings,
    pub session: SessionSettings,
    #[serde(default)]
    pub rest: Option<RestSettings>,
}

impl Settings {
    /// Deserialize and check every configured route.
    ///
    /// An empty `login.twoFactorRoute` counts as unset.
    pub fn from_value(value: Value) -> AuthKitResult<Self> {
        let mut settings: Settings = serde_json::from_value(value)
            .map_err(|e| AuthKitError::InvalidConfig(e.to_string()))?;

        if settings
            .login
            .two_factor_route
            .as_deref()
            .is_some_and(str::is_empty)
        {
            settings.login.two_factor_route = None;
        }

        for (key, route) in settings.routes() {
            validate_route(key, route)?;
        }
        Ok(settings)
    }

    /// Configured workflow routes with their configuration keys
    pub fn routes(&self) -> Vec<(&'static str, &str)> {
        let mut routes = vec![
            ("signup.route", self.signup.route.as_str()),
            ("signup.resendRoute", self.signup.resend_route.as_str()),
            ("login.route", self.login.route.as_str()),
            ("login.logoutRoute", self.login.logout_route.as_str()),
            ("forgotPassword.route", self.forgot_password.route.as_str()),
            ("changeEmail.route", self.change_email.route.as_str()),
            ("deleteAccount.route", self.delete_account.route.as_str()),
        ];
        if let Some(two_factor) = &self.login.two_factor_route {
            routes.push(("login.twoFactorRoute", two_factor.as_str()));
        }
        routes
    }

    /// True when storage is the reserved in-memory fallback
    pub fn uses_ephemeral_store(&self) -> bool {
        self.db.as_ref().is_some_and(DbSettings::is_ephemeral)
    }

    /// Absolute link for a tokenized route
    pub fn link(&self, route: &str, token: &str) -> String {
        format!("{}{}/{}", self.url.trim_end_matches('/'), route, token)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupSettings {
    pub route: String,
    pub resend_route: String,
    pub token_expiration: i64,
}

impl SignupSettings {
    pub fn token_ttl(&self) -> Duration {
        Duration::seconds(self.token_expiration)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSettings {
    pub route: String,
    pub logout_route: String,
    #[serde(default)]
    pub two_factor_route: Option<String>,
    pub failed_login_attempts: u32,
    pub account_locked_time: i64,
}

impl LoginSettings {
    pub fn lock_duration(&self) -> Duration {
        Duration::seconds(self.account_locked_time)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordSettings {
    pub route: String,
    pub token_expiration: i64,
}

impl ForgotPasswordSettings {
    pub fn token_ttl(&self) -> Duration {
        Duration::seconds(self.token_expiration)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEmailSettings {
    pub route: String,
    pub token_expiration: i64,
}

impl ChangeEmailSettings {
    pub fn token_ttl(&self) -> Duration {
        Duration::seconds(self.token_expiration)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountSettings {
    pub route: String,
    /// Sentence the user must type to confirm deletion
    pub phrase: String,
}

/// A route must be absolute and free of router syntax (`{}`, `:x`, `*x`).
fn validate_route(key: &str, route: &str) -> AuthKitResult<()> {
    if !route.starts_with('/') {
        return Err(AuthKitError::InvalidConfig(format!(
            "{} must start with '/' (got {:?})",
            key, route
        )));
    }

    let reserved = route.contains(['{', '}'])
        || route
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'));
    if reserved {
        return Err(AuthKitError::InvalidConfig(format!(
            "{} contains path parameter syntax (got {:?})",
            key, route
        )));
    }
    Ok(())
}

/// Storage descriptor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbSettings {
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Registry identifier; derived from `url` when absent
    #[serde(default)]
    pub backend: Option<String>,
}

fn default_collection() -> String {
    "users".to_string()
}

impl DbSettings {
    pub fn is_ephemeral(&self) -> bool {
        self.url == EPHEMERAL_DB_URL && self.name == EPHEMERAL_DB_NAME
    }

    /// Identifier looked up in the backend registry
    pub fn backend_id(&self) -> String {
        if let Some(backend) = &self.backend {
            return backend.clone();
        }
        if self.is_ephemeral() {
            return crate::infra::memory::MEMORY_BACKEND.to_string();
        }

        let scheme = self
            .url
            .split_once("://")
            .map_or(self.url.as_str(), |(scheme, _)| scheme);

        match scheme {
            "mongodb" => "mongodb".to_string(),
            "http" | "https" => "couchdb".to_string(),
            "postgres" | "mysql" | "sqlite" => "sql".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailSettings {
    #[serde(default)]
    pub email_type: Option<String>,
    #[serde(default)]
    pub email_settings: Option<Value>,
    pub email_from: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    pub cookie_name: String,
    pub secure: bool,
    /// Seconds
    pub max_age: i64,
}

impl SessionSettings {
    pub fn cookie(&self) -> CookieConfig {
        CookieConfig {
            name: self.cookie_name.clone(),
            secure: self.secure,
            http_only: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age_secs: Some(self.max_age),
        }
    }
}

/// Single-page-application fallback descriptor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestSettings {
    #[serde(default)]
    pub use_view_engine: bool,
    #[serde(default = "default_index")]
    pub index: String,
}

fn default_index() -> String {
    "index.html".to_string()
}
