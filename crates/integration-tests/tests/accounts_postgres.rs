//! Google sign-in against `PostgreSQL`.
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/novare \
//!     cargo test -p novare-integration-tests --test accounts_postgres -- --ignored
//! ```

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use secrecy::SecretString;
use sqlx::PgPool;

use novare_api::config::JwtConfig;
use novare_api::services::auth::{AuthError, AuthService, RegisterRequest, TokenService};
use novare_api::services::google::GoogleProfile;

fn tokens() -> TokenService {
    TokenService::new(&JwtConfig {
        access_secret: SecretString::from("k3Jd9_Qz!vT2mW8#pL5xR1@bN7cY4hF0"),
        refresh_secret: SecretString::from("Zq8!Lm2#Tx7pV4@Rc1bN9wK3yH6sD0fG"),
        access_ttl: Duration::from_secs(900),
        refresh_ttl: Duration::from_secs(604_800),
    })
}

fn profile(subject: &str, email: &str) -> GoogleProfile {
    GoogleProfile {
        subject: subject.to_owned(),
        email: email.to_owned(),
        email_verified: true,
        name: Some("Ada Obi".to_owned()),
        picture: Some("https://lh3.googleusercontent.com/a/ada".to_owned()),
    }
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_google_sign_in_creates_then_reuses_account(pool: PgPool) {
    let tokens = tokens();
    let auth = AuthService::new(&pool, &tokens);

    let first = auth
        .google_sign_in(&profile("g-1", "ada@gmail.com"))
        .await
        .unwrap();
    assert!(first.user.username.starts_with("adaobi"));
    assert_eq!(first.user.email.as_str(), "ada@gmail.com");
    assert_eq!(
        first.user.avatar.as_deref(),
        Some("https://lh3.googleusercontent.com/a/ada")
    );

    let again = auth
        .google_sign_in(&profile("g-1", "ada@gmail.com"))
        .await
        .unwrap();
    assert_eq!(again.user.id, first.user.id);

    assert!(auth.refresh(&again.tokens.refresh_token).await.is_ok());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_google_sign_in_links_existing_email(pool: PgPool) {
    let tokens = tokens();
    let auth = AuthService::new(&pool, &tokens);
    let registered = auth
        .register(RegisterRequest {
            username: "ada".to_owned(),
            email: "Ada@Gmail.com".to_owned(),
            phone_number: "+2348000000000".to_owned(),
            password: "correct horse".to_owned(),
        })
        .await
        .unwrap();

    let linked = auth
        .google_sign_in(&profile("g-1", "ada@gmail.com"))
        .await
        .unwrap();
    assert_eq!(linked.user.id, registered.user.id);
    assert_eq!(linked.user.username, "ada");

    // Password login keeps working
    assert!(auth.login("ada", "correct horse").await.is_ok());

    // A different Google account cannot take over the linked e-mail
    let err = auth
        .google_sign_in(&profile("g-2", "ada@gmail.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UserAlreadyExists));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_unverified_google_email_is_refused(pool: PgPool) {
    let tokens = tokens();
    let auth = AuthService::new(&pool, &tokens);
    let mut unverified = profile("g-1", "ada@gmail.com");
    unverified.email_verified = false;

    let err = auth.google_sign_in(&unverified).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.user")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(users, 0);
}
