use super::*;

fn settings(secret: &str) -> JwtSettings {
    JwtSettings {
        secret: secret.into(),
        issuer: "doghub".into(),
        audience: "doghub-client".into(),
        access_lifetime: Duration::minutes(15),
        refresh_lifetime: Duration::days(30),
    }
}

fn subject() -> TokenSubject<'static> {
    TokenSubject { member_id: 42, email: "ann@example.com", full_name: "Ann Lee", role: Role::Trainer }
}

const SECRET: &str = "0123456789abcdef0123456789abcdef";

#[test]
fn issued_token_verifies_with_same_claims() {
    let service = TokenService::new(&settings(SECRET));
    let (token, expires_at) = service.issue(&subject()).unwrap();

    let claims = service.verify(&token).unwrap();
    assert_eq!(claims.sub, "42");
    assert_eq!(claims.member_id().unwrap(), 42);
    assert_eq!(claims.email, "ann@example.com");
    assert_eq!(claims.name, "Ann Lee");
    assert_eq!(claims.role, Role::Trainer);
    assert_eq!(claims.exp, expires_at.unix_timestamp());
    assert_eq!(claims.exp - claims.iat, 15 * 60);
}

#[test]
fn token_has_three_segments() {
    let service = TokenService::new(&settings(SECRET));
    let (token, _) = service.issue(&subject()).unwrap();
    assert_eq!(token.split('.').count(), 3);
}

#[test]
fn expired_token_is_rejected() {
    let service = TokenService::new(&settings(SECRET));
    let long_ago = OffsetDateTime::now_utc() - Duration::hours(2);
    let (token, _) = service.issue_at(&subject(), long_ago).unwrap();
    assert!(matches!(service.verify(&token), Err(TokenError::Invalid(_))));
}

#[test]
fn token_signed_with_other_secret_is_rejected() {
    let issuer = TokenService::new(&settings("ffffffffffffffffffffffffffffffff"));
    let verifier = TokenService::new(&settings(SECRET));
    let (token, _) = issuer.issue(&subject()).unwrap();
    assert!(verifier.verify(&token).is_err());
}

#[test]
fn wrong_audience_is_rejected() {
    let issuer = TokenService::new(&settings(SECRET));
    let mut other = settings(SECRET);
    other.audience = "someone-else".into();
    let verifier = TokenService::new(&other);
    let (token, _) = issuer.issue(&subject()).unwrap();
    assert!(verifier.verify(&token).is_err());
}

#[test]
fn wrong_issuer_is_rejected() {
    let issuer = TokenService::new(&settings(SECRET));
    let mut other = settings(SECRET);
    other.issuer = "elsewhere".into();
    let verifier = TokenService::new(&other);
    let (token, _) = issuer.issue(&subject()).unwrap();
    assert!(verifier.verify(&token).is_err());
}

#[test]
fn garbage_token_is_rejected() {
    let service = TokenService::new(&settings(SECRET));
    assert!(service.verify("not-a-jwt").is_err());
    assert!(service.verify("").is_err());
}

#[test]
fn non_numeric_subject_is_bad_subject() {
    let claims = Claims {
        sub: "abc".into(),
        email: String::new(),
        name: String::new(),
        role: Role::Member,
        iss: String::new(),
        aud: String::new(),
        iat: 0,
        nbf: 0,
        exp: 0,
    };
    assert!(matches!(claims.member_id(), Err(TokenError::BadSubject)));
    assert!(claims.actor().is_err());
}

#[test]
fn actor_from_claims() {
    let service = TokenService::new(&settings(SECRET));
    let (token, _) = service.issue(&subject()).unwrap();
    let actor = service.verify(&token).unwrap().actor().unwrap();
    assert_eq!(actor, Actor::new(42, Role::Trainer));
}
