//! End-to-end tests against the composed router

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, Response, header};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::domain::mail::{MailMessage, MailTransport};
    use crate::domain::user::{Lookup, User};
    use crate::error::AuthKitResult;
    use crate::AuthKit;

    pub const PASSWORD: &str = "correct horse battery";

    pub async fn send(router: &Router, req: Request<Body>) -> Response<Body> {
        router.clone().oneshot(req).await.unwrap()
    }

    pub fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    pub async fn body_json(response: Response<Body>) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    pub async fn body_text(response: Response<Body>) -> String {
        String::from_utf8(body_bytes(response).await).unwrap()
    }

    /// `name=value` part of the Set-Cookie header
    pub fn session_cookie(response: &Response<Body>) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string()
    }

    pub async fn stored(kit: &AuthKit, name: &str) -> Option<User> {
        kit.adapter().find(Lookup::Name, name).await.unwrap()
    }

    /// Sign up and confirm the email address
    pub async fn verified_user(kit: &AuthKit, name: &str, email: &str) {
        let router = kit.router();
        let response = send(
            &router,
            json_request(
                "POST",
                "/signup",
                serde_json::json!({ "name": name, "email": email, "password": PASSWORD }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), 201);

        let token = stored(kit, name).await.unwrap().signup_token.unwrap();
        let response = send(&router, get_request(&format!("/signup/{token}"), None)).await;
        assert_eq!(response.status(), 200);
    }

    /// Sign in and return the session cookie
    pub async fn sign_in(kit: &AuthKit, login: &str, password: &str) -> String {
        let response = send(
            &kit.router(),
            json_request(
                "POST",
                "/login",
                serde_json::json!({ "login": login, "password": password }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), 200);
        session_cookie(&response)
    }

    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Mutex<Vec<MailMessage>>,
    }

    impl RecordingTransport {
        pub fn shared() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn messages(&self) -> Vec<MailMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        fn kind(&self) -> &str {
            "recording"
        }

        async fn send(&self, message: MailMessage) -> AuthKitResult<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    /// In-memory sink for formatted log lines
    #[derive(Clone, Default)]
    pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        /// Route this thread's events here until the guard drops
        pub fn install(&self) -> tracing::subscriber::DefaultGuard {
            let sink = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::INFO)
                .with_ansi(false)
                .with_writer(move || sink.clone())
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod compose_tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::FutureExt;
    use serde_json::json;

    use crate::domain::adapter::SharedAdapter;
    use crate::domain::feature::FeatureKind;
    use crate::error::AuthKitError;
    use crate::infra::memory::MemoryStore;
    use crate::{AuthKit, BackendRegistry, ComposeState};

    #[tokio::test]
    async fn test_empty_config_uses_ephemeral_store() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();

        assert_eq!(kit.state(), ComposeState::Ready);
        assert_eq!(kit.adapter().backend(), "memory");
        assert!(kit.settings().uses_ephemeral_store());
        assert_eq!(kit.settings().mail.email_type.as_deref(), Some("stub"));

        let db = kit.settings().db.as_ref().unwrap();
        assert_eq!(db.url, "sqlite://");
        assert_eq!(db.name, ":memory:");
        assert_eq!(db.collection, "my_user_table");
    }

    #[tokio::test]
    async fn test_falsy_db_uses_ephemeral_store() {
        for db in [json!(null), json!(false), json!("")] {
            let kit = AuthKit::builder(json!({ "db": db })).build().await.unwrap();

            assert_eq!(kit.state(), ComposeState::Ready);
            assert_eq!(kit.adapter().backend(), "memory");
            assert!(kit.settings().uses_ephemeral_store());
        }
    }

    #[tokio::test]
    async fn test_relative_route_is_rejected() {
        for config in [
            json!({ "signup": { "route": "signup" } }),
            json!({ "login": { "route": "" } }),
            json!({ "deleteAccount": { "route": "/delete/{name}" } }),
        ] {
            let result = AuthKit::builder(config.clone()).build().await;
            assert!(
                matches!(result, Err(AuthKitError::InvalidConfig(_))),
                "config: {config}"
            );
        }
    }

    #[tokio::test]
    async fn test_empty_two_factor_route_is_ignored() {
        let kit = AuthKit::builder(json!({ "login": { "twoFactorRoute": "" }, "rest": {} }))
            .build()
            .await
            .unwrap();

        assert_eq!(kit.state(), ComposeState::Ready);
        assert_eq!(kit.settings().login.two_factor_route, None);
    }

    #[tokio::test]
    async fn test_modules_in_mount_order_share_one_adapter() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();

        let kinds: Vec<_> = kit.modules().iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, FeatureKind::MOUNT_ORDER.to_vec());

        for module in kit.modules() {
            assert!(Arc::ptr_eq(module.adapter(), kit.adapter()));
            assert!(Arc::ptr_eq(module.settings(), kit.settings()));
        }
        assert!(kit.module(FeatureKind::ChangeEmail).is_some());
    }

    #[tokio::test]
    async fn test_supplied_instance_is_used_as_is() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let supplied: SharedAdapter = Arc::new(MemoryStore::new("external"));

        let kit = AuthKit::builder(json!({}))
            .with_backend("memory", move |settings| {
                counter.fetch_add(1, Ordering::SeqCst);
                MemoryStore::connect(settings).boxed()
            })
            .with_adapter(supplied.clone())
            .build()
            .await
            .unwrap();

        assert!(Arc::ptr_eq(kit.adapter(), &supplied));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // no ephemeral substitution when an instance is supplied
        assert!(kit.settings().db.is_none());
    }

    #[tokio::test]
    async fn test_constructor_invoked_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let kit = AuthKit::builder(json!({ "db": { "url": "postgres://db", "name": "app" } }))
            .with_backend("sql", move |settings| {
                counter.fetch_add(1, Ordering::SeqCst);
                MemoryStore::connect(settings).boxed()
            })
            .build()
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!kit.settings().uses_ephemeral_store());
    }

    #[tokio::test]
    async fn test_unknown_backend_fails() {
        let result = AuthKit::builder(json!({ "db": { "url": "mongodb://db", "name": "app" } }))
            .build()
            .await;

        assert!(matches!(result, Err(AuthKitError::UnknownBackend(id)) if id == "mongodb"));
    }

    #[tokio::test]
    async fn test_empty_registry_fails_even_for_ephemeral() {
        let result = AuthKit::builder(json!({}))
            .with_registry(BackendRegistry::empty())
            .build()
            .await;

        assert!(matches!(result, Err(AuthKitError::UnknownBackend(_))));
    }

    #[tokio::test]
    async fn test_failing_constructor_surfaces_error() {
        let result = AuthKit::builder(json!({ "db": { "url": "http://couch:5984", "name": "app" } }))
            .with_backend("couchdb", |_| {
                async { Err(AuthKitError::AdapterInit("unreachable".to_string())) }.boxed()
            })
            .build()
            .await;

        assert!(matches!(result, Err(AuthKitError::AdapterInit(msg)) if msg == "unreachable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_adapter_timeout() {
        let result = AuthKit::builder(json!({}))
            .with_backend("memory", |settings| {
                async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    MemoryStore::connect(settings).await
                }
                .boxed()
            })
            .with_adapter_timeout(Duration::from_secs(2))
            .build()
            .await;

        assert!(matches!(result, Err(AuthKitError::AdapterTimeout(_))));
    }

    #[tokio::test]
    async fn test_builds_are_independent() {
        let first = AuthKit::builder(json!({})).build().await.unwrap();
        let second = AuthKit::builder(json!({})).build().await.unwrap();

        assert!(!Arc::ptr_eq(first.adapter(), second.adapter()));
    }

    #[tokio::test]
    async fn test_explicit_mail_type_is_kept() {
        let kit = AuthKit::builder(json!({ "mail": { "emailType": "smtp" } }))
            .build()
            .await
            .unwrap();

        assert_eq!(kit.settings().mail.email_type.as_deref(), Some("smtp"));
    }
}

#[cfg(test)]
mod event_tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::broadcast;
    use tokio::time::timeout;

    use super::support::*;
    use crate::{AuthEvent, AuthKit};

    async fn next(rx: &mut broadcast::Receiver<AuthEvent>) -> AuthEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event not forwarded")
            .unwrap()
    }

    #[tokio::test]
    async fn test_signup_events_forwarded_in_order() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let mut rx = kit.subscribe();

        verified_user(&kit, "alice", "alice@example.com").await;

        let first = next(&mut rx).await;
        let second = next(&mut rx).await;
        assert_eq!(first.name(), "signup::post");
        assert_eq!(second.name(), "signup::confirm");
        assert!(first.user().signup_token.is_some());
        assert!(second.user().email_verified);
    }

    #[tokio::test]
    async fn test_every_module_is_fanned_in() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let mut rx = kit.subscribe();
        let mut module_rxs: Vec<_> = kit
            .modules()
            .iter()
            .map(|module| module.events().subscribe())
            .collect();
        let router = kit.router();

        verified_user(&kit, "alice", "alice@example.com").await;
        let cookie = sign_in(&kit, "alice", PASSWORD).await;

        send(
            &router,
            json_request("POST", "/forgot-password", json!({ "email": "alice@example.com" }), None),
        )
        .await;
        send(
            &router,
            json_request(
                "POST",
                "/change-email",
                json!({ "email": "alice@new.example.com" }),
                Some(&cookie),
            ),
        )
        .await;
        send(
            &router,
            json_request(
                "POST",
                "/delete-account",
                json!({
                    "name": "alice",
                    "phrase": "please delete my account forever",
                    "password": PASSWORD
                }),
                Some(&cookie),
            ),
        )
        .await;

        let mut unified = Vec::new();
        for _ in 0..6 {
            unified.push(next(&mut rx).await);
        }

        let mut emitted = Vec::new();
        for module_rx in module_rxs.iter_mut() {
            while let Ok(event) = module_rx.try_recv() {
                emitted.push(event);
            }
        }
        assert_eq!(unified.len(), emitted.len());

        for event in &unified {
            let position = emitted
                .iter()
                .position(|candidate| candidate == event)
                .unwrap_or_else(|| panic!("{} differs from the module event", event.name()));
            emitted.remove(position);
        }

        let names: BTreeSet<_> = unified.iter().map(AuthEvent::name).collect();
        let expected: BTreeSet<_> = [
            "signup::post",
            "signup::confirm",
            "login",
            "forgot::sent",
            "email::request",
            "delete",
        ]
        .into_iter()
        .collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_module_bus_still_observable() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let signup = kit.module(crate::FeatureKind::Signup).unwrap();
        let mut module_rx = signup.events().subscribe();

        verified_user(&kit, "bob", "bob@example.com").await;

        assert_eq!(next(&mut module_rx).await.name(), "signup::post");
    }
}

#[cfg(test)]
mod log_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use super::support::*;
    use crate::AuthKit;
    use crate::infra::memory::MemoryStore;

    async fn signup_alice(kit: &AuthKit) -> String {
        let mut rx = kit.subscribe();
        let response = send(
            &kit.router(),
            json_request(
                "POST",
                "/signup",
                json!({ "name": "alice", "email": "alice@example.com", "password": PASSWORD }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), 201);

        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event not forwarded")
            .unwrap();
        assert_eq!(event.name(), "signup::post");

        stored(kit, "alice").await.unwrap().signup_token.unwrap()
    }

    #[tokio::test]
    async fn test_ephemeral_composition_notices() {
        let logs = LogCapture::default();
        let _guard = logs.install();

        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let token = signup_alice(&kit).await;

        let output = logs.contents();
        assert!(output.contains("no db config found, using in-memory store"), "{output}");
        assert!(output.contains("no email config found, check your database for tokens"), "{output}");
        assert!(output.contains("AuthKit ready"), "{output}");
        assert!(output.contains(&format!("http://localhost:3000/signup/{token}")), "{output}");
    }

    #[tokio::test]
    async fn test_link_uses_configured_url() {
        let logs = LogCapture::default();
        let _guard = logs.install();

        let kit = AuthKit::builder(json!({ "url": "http://localhost:8080/auth/" }))
            .build()
            .await
            .unwrap();
        let token = signup_alice(&kit).await;

        let output = logs.contents();
        assert!(output.contains(&format!("http://localhost:8080/auth/signup/{token}")), "{output}");
    }

    #[tokio::test]
    async fn test_supplied_adapter_logs_no_link() {
        let logs = LogCapture::default();
        let _guard = logs.install();

        let kit = AuthKit::builder(json!({ "mail": { "emailType": "smtp" } }))
            .with_adapter(Arc::new(MemoryStore::new("external")))
            .with_mail_transport(RecordingTransport::shared())
            .build()
            .await
            .unwrap();
        let token = signup_alice(&kit).await;

        let output = logs.contents();
        assert!(output.contains("AuthKit ready"), "{output}");
        assert!(!output.contains("no db config found"), "{output}");
        assert!(!output.contains("no email config found"), "{output}");
        assert!(!output.contains(&token), "{output}");
    }
}

#[cfg(test)]
mod feature_tests {
    use axum::http::{StatusCode, header};
    use serde_json::json;

    use super::support::*;
    use crate::AuthKit;
    use crate::domain::user::Lookup;

    #[tokio::test]
    async fn test_signup_sends_confirmation_mail() {
        let mailer = RecordingTransport::shared();
        let kit = AuthKit::builder(json!({ "appname": "demo", "url": "https://auth.example.com" }))
            .with_mail_transport(mailer.clone())
            .build()
            .await
            .unwrap();

        let response = send(
            &kit.router(),
            json_request(
                "POST",
                "/signup",
                json!({ "name": "alice", "email": "Alice@Example.com", "password": PASSWORD }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["emailVerified"], false);
        assert!(body.get("passwordHash").is_none());

        let token = stored(&kit, "alice").await.unwrap().signup_token.unwrap();
        let messages = mailer.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to, "alice@example.com");
        assert_eq!(messages[0].subject, "[demo] Confirm your email");
        assert!(
            messages[0]
                .body
                .contains(&format!("https://auth.example.com/signup/{token}"))
        );
    }

    #[tokio::test]
    async fn test_signup_rejects_duplicates_and_bad_input() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let router = kit.router();
        verified_user(&kit, "alice", "alice@example.com").await;

        let cases = [
            (json!({ "name": "alice", "email": "other@example.com", "password": PASSWORD }), StatusCode::CONFLICT),
            (json!({ "name": "bob", "email": "ALICE@example.com", "password": PASSWORD }), StatusCode::CONFLICT),
            (json!({ "name": "bob", "email": "not-an-email", "password": PASSWORD }), StatusCode::BAD_REQUEST),
            (json!({ "name": "bob", "email": "bob@example.com", "password": "short" }), StatusCode::BAD_REQUEST),
            (json!({ "name": "  ", "email": "bob@example.com", "password": PASSWORD }), StatusCode::BAD_REQUEST),
        ];

        for (body, expected) in cases {
            let response = send(&router, json_request("POST", "/signup", body.clone(), None)).await;
            assert_eq!(response.status(), expected, "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_confirmation_token_errors() {
        let kit = AuthKit::builder(json!({ "signup": { "tokenExpiration": 0 } }))
            .build()
            .await
            .unwrap();
        let router = kit.router();

        let response = send(&router, get_request("/signup/unknown", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        send(
            &router,
            json_request(
                "POST",
                "/signup",
                json!({ "name": "alice", "email": "alice@example.com", "password": PASSWORD }),
                None,
            ),
        )
        .await;
        let token = stored(&kit, "alice").await.unwrap().signup_token.unwrap();

        let response = send(&router, get_request(&format!("/signup/{token}"), None)).await;
        assert_eq!(response.status(), StatusCode::GONE);
        let problem = body_json(response).await;
        assert_eq!(problem["status"], 410);
        assert_eq!(problem["action"], "Request a new link");
    }

    #[tokio::test]
    async fn test_resend_issues_new_token() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let router = kit.router();

        send(
            &router,
            json_request(
                "POST",
                "/signup",
                json!({ "name": "alice", "email": "alice@example.com", "password": PASSWORD }),
                None,
            ),
        )
        .await;
        let first = stored(&kit, "alice").await.unwrap().signup_token;

        let response = send(
            &router,
            json_request(
                "POST",
                "/signup/resend-verification",
                json!({ "email": "alice@example.com" }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let second = stored(&kit, "alice").await.unwrap().signup_token;
        assert!(second.is_some());
        assert_ne!(first, second);

        // unknown addresses get the same answer
        let response = send(
            &router,
            json_request(
                "POST",
                "/signup/resend-verification",
                json!({ "email": "nobody@example.com" }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_requires_verified_email() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let router = kit.router();

        send(
            &router,
            json_request(
                "POST",
                "/signup",
                json!({ "name": "alice", "email": "alice@example.com", "password": PASSWORD }),
                None,
            ),
        )
        .await;

        let response = send(
            &router,
            json_request("POST", "/login", json!({ "login": "alice", "password": PASSWORD }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_login_by_name_or_email_sets_cookie() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        verified_user(&kit, "alice", "alice@example.com").await;

        let by_name = sign_in(&kit, "alice", PASSWORD).await;
        let by_email = sign_in(&kit, "ALICE@example.com", PASSWORD).await;

        assert!(by_name.starts_with("authkit_session="));
        assert_ne!(by_name, by_email);
        assert_eq!(kit.sessions().len().await, 2);
    }

    #[tokio::test]
    async fn test_lockout_after_failed_attempts() {
        let kit = AuthKit::builder(json!({ "login": { "failedLoginAttempts": 3 } }))
            .build()
            .await
            .unwrap();
        let router = kit.router();
        verified_user(&kit, "alice", "alice@example.com").await;

        let wrong = json!({ "login": "alice", "password": "wrong password!" });
        for expected in [
            StatusCode::UNAUTHORIZED,
            StatusCode::UNAUTHORIZED,
            StatusCode::LOCKED,
        ] {
            let response = send(&router, json_request("POST", "/login", wrong.clone(), None)).await;
            assert_eq!(response.status(), expected);
        }

        let response = send(
            &router,
            json_request("POST", "/login", json!({ "login": "alice", "password": PASSWORD }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::LOCKED);
        assert!(stored(&kit, "alice").await.unwrap().account_locked_until.is_some());
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let router = kit.router();
        verified_user(&kit, "alice", "alice@example.com").await;
        let cookie = sign_in(&kit, "alice", PASSWORD).await;

        let response = send(&router, json_request("POST", "/logout", json!({}), Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(set_cookie.to_str().unwrap().contains("Max-Age=0"));
        assert!(kit.sessions().is_empty().await);

        // the old cookie no longer authenticates
        let response = send(
            &router,
            json_request("POST", "/change-email", json!({ "email": "x@example.com" }), Some(&cookie)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_forgot_password_flow() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let router = kit.router();
        verified_user(&kit, "alice", "alice@example.com").await;
        sign_in(&kit, "alice", PASSWORD).await;

        let response = send(
            &router,
            json_request("POST", "/forgot-password", json!({ "email": "alice@example.com" }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let token = stored(&kit, "alice").await.unwrap().pw_token.unwrap();
        let response = send(
            &router,
            json_request(
                "POST",
                &format!("/forgot-password/{token}"),
                json!({ "password": "a brand new secret" }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // reset closes existing sessions and consumes the token
        assert!(kit.sessions().is_empty().await);
        assert!(
            kit.adapter()
                .find(Lookup::PasswordToken, &token)
                .await
                .unwrap()
                .is_none()
        );

        sign_in(&kit, "alice", "a brand new secret").await;
        let response = send(
            &router,
            json_request("POST", "/login", json!({ "login": "alice", "password": PASSWORD }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_is_silent() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let response = send(
            &kit.router(),
            json_request("POST", "/forgot-password", json!({ "email": "ghost@example.com" }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_change_email_flow() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let router = kit.router();
        verified_user(&kit, "alice", "alice@example.com").await;
        verified_user(&kit, "bob", "bob@example.com").await;
        let cookie = sign_in(&kit, "alice", PASSWORD).await;

        let response = send(
            &router,
            json_request("POST", "/change-email", json!({ "email": "bob@example.com" }), Some(&cookie)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = send(
            &router,
            json_request(
                "POST",
                "/change-email",
                json!({ "email": "alice@new.example.com" }),
                Some(&cookie),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let pending = stored(&kit, "alice").await.unwrap();
        assert_eq!(pending.email, "alice@example.com");
        assert_eq!(pending.pending_email.as_deref(), Some("alice@new.example.com"));

        let token = pending.email_token.unwrap();
        let response = send(&router, get_request(&format!("/change-email/{token}"), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["email"], "alice@new.example.com");

        let user = stored(&kit, "alice").await.unwrap();
        assert_eq!(user.email, "alice@new.example.com");
        assert!(user.pending_email.is_none());
    }

    #[tokio::test]
    async fn test_change_email_requires_session() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        let response = send(
            &kit.router(),
            json_request("POST", "/change-email", json!({ "email": "a@example.com" }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_delete_account_checks_phrase_and_password() {
        let kit = AuthKit::builder(json!({ "deleteAccount": { "phrase": "bye" } }))
            .build()
            .await
            .unwrap();
        let router = kit.router();
        verified_user(&kit, "alice", "alice@example.com").await;
        let cookie = sign_in(&kit, "alice", PASSWORD).await;

        let cases = [
            (json!({ "name": "bob", "phrase": "bye", "password": PASSWORD }), StatusCode::BAD_REQUEST),
            (json!({ "name": "alice", "phrase": "please", "password": PASSWORD }), StatusCode::BAD_REQUEST),
            (json!({ "name": "alice", "phrase": "bye", "password": "not my password" }), StatusCode::UNAUTHORIZED),
        ];
        for (body, expected) in cases {
            let response =
                send(&router, json_request("POST", "/delete-account", body.clone(), Some(&cookie))).await;
            assert_eq!(response.status(), expected, "body: {body}");
        }

        let response = send(
            &router,
            json_request(
                "POST",
                "/delete-account",
                json!({ "name": "alice", "phrase": "bye", "password": PASSWORD }),
                Some(&cookie),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(stored(&kit, "alice").await.is_none());
        assert!(kit.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn test_host_inserted_session_user_is_kept() {
        use axum::Extension;

        use crate::features::SessionUser;

        let kit = AuthKit::builder(json!({})).build().await.unwrap();
        verified_user(&kit, "alice", "alice@example.com").await;
        let user = stored(&kit, "alice").await.unwrap();

        let router = kit.router().layer(Extension(SessionUser { user, token: None }));
        let response = send(
            &router,
            json_request("POST", "/change-email", json!({ "email": "alice@other.example.com" }), None),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[cfg(test)]
mod fallback_tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    use super::support::*;
    use crate::domain::feature::FeatureKind;
    use crate::domain::view::ViewEngine;
    use crate::error::AuthKitResult;
    use crate::presentation::RouteOrigin;
    use crate::AuthKit;

    const INDEX: &str = "<!doctype html><title>app</title>";

    fn app_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), INDEX).unwrap();
        dir
    }

    struct EchoEngine;

    impl ViewEngine for EchoEngine {
        fn render(&self, template: &str, context: &Value) -> AuthKitResult<String> {
            Ok(format!(
                "{}|{}|{}",
                template,
                context["basedir"].as_str().unwrap_or_default(),
                context["name"].as_str().unwrap_or_default()
            ))
        }
    }

    #[tokio::test]
    async fn test_no_rest_means_no_fallback() {
        let kit = AuthKit::builder(json!({})).build().await.unwrap();

        assert!(kit.route_table().iter().all(|r| r.origin != RouteOrigin::Fallback));
        let response = send(&kit.router(), get_request("/login", None)).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_static_entry_document() {
        let dir = app_dir();
        let kit = AuthKit::builder(json!({ "rest": { "useViewEngine": false, "index": "index.html" } }))
            .with_app_dir(dir.path())
            .build()
            .await
            .unwrap();
        let router = kit.router();

        for path in ["/login", "/signup", "/forgot-password/abc", "/signup/resend-verification/xyz"] {
            let response = send(&router, get_request(path, None)).await;
            assert_eq!(response.status(), StatusCode::OK, "path: {path}");
            assert_eq!(body_text(response).await, INDEX);
        }
    }

    #[tokio::test]
    async fn test_feature_routes_take_precedence() {
        let dir = app_dir();
        let kit = AuthKit::builder(json!({ "rest": {} }))
            .with_app_dir(dir.path())
            .build()
            .await
            .unwrap();
        let router = kit.router();

        // GET logout belongs to the login module
        let response = send(&router, get_request("/logout", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Signed out");

        // email confirmation links belong to the change-email module
        let response = send(&router, get_request("/change-email/nope", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let owner = |method: Method, path: &str| {
            kit.route_table()
                .iter()
                .find(|r| r.method == method && r.path == path)
                .map(|r| r.origin)
        };
        assert_eq!(
            owner(Method::GET, "/logout"),
            Some(RouteOrigin::Feature(FeatureKind::Login))
        );
        assert_eq!(
            owner(Method::GET, "/change-email/{token}"),
            Some(RouteOrigin::Feature(FeatureKind::ChangeEmail))
        );
        assert_eq!(owner(Method::GET, "/change-email"), Some(RouteOrigin::Fallback));
        assert_eq!(
            owner(Method::POST, "/change-email"),
            Some(RouteOrigin::Feature(FeatureKind::ChangeEmail))
        );

        // the fallback appears after every feature route
        let first_fallback = kit
            .route_table()
            .iter()
            .position(|r| r.origin == RouteOrigin::Fallback)
            .unwrap();
        assert!(
            kit.route_table()[first_fallback..]
                .iter()
                .all(|r| r.origin == RouteOrigin::Fallback)
        );
    }

    #[tokio::test]
    async fn test_overlapping_module_routes() {
        // login and delete-account configured on the same path
        let kit = AuthKit::builder(json!({ "deleteAccount": { "route": "/login" } }))
            .build()
            .await
            .unwrap();

        let owners: Vec<_> = kit
            .route_table()
            .iter()
            .filter(|r| r.path == "/login" && r.method == Method::POST)
            .map(|r| r.origin)
            .collect();
        assert_eq!(owners, vec![RouteOrigin::Feature(FeatureKind::Login)]);
    }

    #[tokio::test]
    async fn test_view_engine_rendering() {
        let kit = AuthKit::builder(json!({ "rest": { "useViewEngine": true, "index": "entry" } }))
            .with_view_engine(Arc::new(EchoEngine), "/srv/views")
            .build()
            .await
            .unwrap();
        verified_user(&kit, "alice", "alice@example.com").await;
        let cookie = sign_in(&kit, "alice", PASSWORD).await;
        let router = kit.router();

        let response = send(&router, get_request("/delete-account", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "entry|/srv/views|");

        let response = send(&router, get_request("/delete-account", Some(&cookie))).await;
        assert_eq!(body_text(response).await, "entry|/srv/views|alice");
    }

    #[tokio::test]
    async fn test_view_engine_missing() {
        let kit = AuthKit::builder(json!({ "rest": { "useViewEngine": true } }))
            .build()
            .await
            .unwrap();

        let response = send(&kit.router(), get_request("/signup", None)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_two_factor_route_served_when_configured() {
        let dir = app_dir();
        let kit = AuthKit::builder(json!({
            "login": { "twoFactorRoute": "/login/second-factor" },
            "rest": {}
        }))
        .with_app_dir(dir.path())
        .build()
        .await
        .unwrap();

        let response = send(&kit.router(), get_request("/login/second-factor", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, INDEX);
    }
}
