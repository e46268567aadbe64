use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bigdecimal::BigDecimal;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use nakliyenet::auth::jwt::JwtService;
use nakliyenet::auth::password::hash_password;
use nakliyenet::config::AppConfig;
use nakliyenet::db::{self, PgPool};
use nakliyenet::models::NewUser;
use nakliyenet::oauth::{ExternalIdentity, IdentityProvider};
use nakliyenet::routes;
use nakliyenet::routes::auth::create_account;
use nakliyenet::schema::{user_profiles, users};
use nakliyenet::state::AppState;
use nakliyenet::status::UserType;
use nakliyenet::storage::{NewObject, ObjectStorage};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const PASSWORD: &str = "sifre123";
#[allow(dead_code)]
pub const TEST_IBAN: &str = "TR330006100519786457841326";

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, NewObject>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn store(&self, object: NewObject) -> Result<()> {
        self.objects.lock().await.insert(object.key.clone(), object);
        Ok(())
    }

    async fn download_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        let guard = self.objects.lock().await;
        ensure!(guard.contains_key(key), "object {key} missing");
        Ok(format!(
            "https://fake-storage/{key}?expires_in={}",
            expires_in.as_secs()
        ))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.objects.lock().await.remove(key);
        Ok(())
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<NewObject> {
        self.objects.lock().await.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

/// Answers every code with a fixed identity; the code "bad" fails.
pub struct FakeIdentityProvider {
    pub identity: ExternalIdentity,
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    fn authorize_url(&self, state: &str) -> Result<String> {
        Ok(format!("https://accounts.example.test/auth?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity> {
        ensure!(code != "bad", "provider rejected the code");
        Ok(self.identity.clone())
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
}

#[allow(dead_code)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            oauth_state_expiry_minutes: 10,
            refresh_token_expiry_days: 30,
            refresh_cookie_secure: false,
            refresh_cookie_domain: None,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "eu-central-1".to_string(),
            s3_bucket: "test-bucket".to_string(),
            site_base_url: "https://nakliyenet.test".to_string(),
            platform_fee_percent: BigDecimal::from(10),
            payment_provider: "test-provider".to_string(),
            google_oauth: None,
        };

        let pool = db::init_pool(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let jwt = JwtService::from_config(&config)?;
        let identity: Arc<dyn IdentityProvider> = Arc::new(FakeIdentityProvider {
            identity: ExternalIdentity {
                email: Some("Google.User@Example.com".to_string()),
                given_name: Some("Deniz".to_string()),
                family_name: Some("Kaya".to_string()),
            },
        });
        let state = AppState::new(pool, config, storage_for_state, jwt, Some(identity));
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            storage,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(|conn| truncate_all(conn)).await
    }

    #[allow(dead_code)]
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    /// Creates an account with a profile of the given type.
    pub async fn insert_user(&self, email: &str, user_type: UserType, is_admin: bool) -> Result<Uuid> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            let user = create_account(
                conn,
                NewUser {
                    id: Uuid::new_v4(),
                    email,
                    password_hash: Some(hash_password(PASSWORD)?),
                    first_name: "Test".to_string(),
                    last_name: "Kullanıcı".to_string(),
                    is_admin,
                },
                user_type,
                "05551234567".to_string(),
            )
            .map_err(|err| anyhow!("failed to create account: {}", err.message()))?;
            Ok(user.id)
        })
        .await
    }

    /// Carrier with phone, IBAN and verified documents, ready to bid.
    #[allow(dead_code)]
    pub async fn verified_carrier(&self, email: &str) -> Result<TestUser> {
        let id = self.insert_user(email, UserType::Carrier, false).await?;
        self.with_conn(move |conn| {
            diesel::update(user_profiles::table.filter(user_profiles::user_id.eq(id)))
                .set((
                    user_profiles::iban.eq(TEST_IBAN),
                    user_profiles::profile_completed.eq(true),
                    user_profiles::documents_verified.eq(true),
                ))
                .execute(conn)
                .context("failed to complete carrier profile")?;
            Ok(())
        })
        .await?;
        let token = self.login_token(email, PASSWORD).await?;
        Ok(TestUser {
            id,
            email: email.to_string(),
            token,
        })
    }

    #[allow(dead_code)]
    pub async fn shipper(&self, email: &str) -> Result<TestUser> {
        let id = self.insert_user(email, UserType::Shipper, false).await?;
        let token = self.login_token(email, PASSWORD).await?;
        Ok(TestUser {
            id,
            email: email.to_string(),
            token,
        })
    }

    #[allow(dead_code)]
    pub async fn admin(&self, email: &str) -> Result<TestUser> {
        let id = self.insert_user(email, UserType::Shipper, true).await?;
        let token = self.login_token(email, PASSWORD).await?;
        Ok(TestUser {
            id,
            email: email.to_string(),
            token,
        })
    }

    #[allow(dead_code)]
    pub async fn deactivate(&self, user_id: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            diesel::update(users::table.find(user_id))
                .set(users::is_active.eq(false))
                .execute(conn)
                .context("failed to deactivate user")?;
            Ok(())
        })
        .await
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/api/auth/login", &LoginPayload { email, password }, None)
            .await?;
        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body: Value = json_body(response).await?;
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("login response carried no access_token"))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn post_empty(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::POST, path, Body::empty(), None, token).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, Body::empty(), None, token).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, Body::empty(), None, token).await
    }

    /// Empty POST carrying a `Cookie` header, for the refresh-token endpoints.
    #[allow(dead_code)]
    pub async fn post_with_cookie(
        &self,
        path: &str,
        cookie: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_with_cookie(Method::POST, path, cookie, token).await
    }

    /// GET carrying a `Cookie` header, as a browser following a redirect would.
    #[allow(dead_code)]
    pub async fn get_with_cookie(&self, path: &str, cookie: &str) -> Result<hyper::Response<Body>> {
        self.send_with_cookie(Method::GET, path, cookie, None).await
    }

    async fn send_with_cookie(
        &self,
        method: Method,
        path: &str,
        cookie: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("cookie", cookie);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    /// Multipart upload with one `file` part plus plain text fields.
    #[allow(dead_code)]
    pub async fn upload(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        filename: &str,
        content_type: &str,
        data: &[u8],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
            body.extend(value.as_bytes());
            body.extend(b"\r\n");
        }
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        body.extend(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        self.send(
            Method::POST,
            path,
            Body::from(body),
            Some(format!("multipart/form-data; boundary={boundary}")),
            Some(token),
        )
        .await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(
            method,
            path,
            Body::from(body),
            Some("application/json".to_string()),
            token,
        )
        .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Body,
        content_type: Option<String>,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(body)?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn json_body<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let bytes = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&bytes).with_context(|| {
        format!(
            "response was not the expected JSON: {}",
            String::from_utf8_lossy(&bytes)
        )
    })
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        nakliyenet::run_migrations(&mut conn)?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE admin_activities, bid_comments, reviews, payments, delivery_proofs, \
         shipment_tracking, bids, shipments, vehicles, user_documents, user_profiles, \
         refresh_tokens, oauth_state_nonces, blog_posts, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
