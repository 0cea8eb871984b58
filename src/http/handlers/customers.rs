//! A customer's users: paginated listing and account creation.

use crate::auth::authorize_customer;
use crate::backend::CacheBackend;
use crate::conditional::{CachedResponse, RequestConditions};
use crate::document::{Document, PagedDocument};
use crate::error::Error;
use crate::http::error::ApiError;
use crate::http::extract::{Authenticated, PageQuery};
use crate::http::AppState;
use crate::key::{Endpoint, Mutation};
use crate::models::{NewUser, UserSummary, EMAIL_MAX_LEN};
use crate::pagination::{paginate, PageRequest};
use crate::repository::{CustomerRepository, Store, UserRepository};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Map, Value};

const FORBIDDEN_CUSTOMER: &str = "You are not allowed to access users of this customer";

/// `GET /api/customers/{id}/users?page&limit`
pub async fn list_customer_users<S: Store, B: CacheBackend>(
    Authenticated(identity): Authenticated,
    State(state): State<AppState<S, B>>,
    Path(customer_id): Path<i64>,
    PageQuery(page): PageQuery,
    conditions: RequestConditions,
) -> Result<CachedResponse, ApiError> {
    if state.store.find_customer(customer_id).await?.is_none() {
        return Err(ApiError::not_found("Customer not found"));
    }
    if !authorize_customer(&identity, customer_id) {
        return Err(ApiError::forbidden(FORBIDDEN_CUSTOMER));
    }

    users_page(&state, customer_id, page, &conditions).await
}

/// `GET /api/customers/get-users?page&limit`: the caller's own customer.
pub async fn list_own_users<S: Store, B: CacheBackend>(
    Authenticated(identity): Authenticated,
    State(state): State<AppState<S, B>>,
    PageQuery(page): PageQuery,
    conditions: RequestConditions,
) -> Result<CachedResponse, ApiError> {
    let customer_id = identity
        .customer_id
        .ok_or_else(|| ApiError::forbidden("User does not have a customer"))?;
    if state.store.find_customer(customer_id).await?.is_none() {
        return Err(ApiError::not_found("Customer not found"));
    }

    users_page(&state, customer_id, page, &conditions).await
}

async fn users_page<S: Store, B: CacheBackend>(
    state: &AppState<S, B>,
    customer_id: i64,
    page: PageRequest,
    conditions: &RequestConditions,
) -> Result<CachedResponse, ApiError> {
    let policy = Endpoint::CustomerUsers { customer_id, page }.policy(state.ttls.customer_users);
    let store = state.store.clone();
    let links = state.links.clone();

    let document: PagedDocument<UserSummary> = state
        .cache
        .get_or_compute(&policy, || async move {
            let (total, users) = futures::try_join!(
                store.count_users_by_customer(customer_id),
                store.find_users_by_customer(customer_id, page.offset(), page.limit())
            )?;
            let window = paginate(total, page);
            let summaries = users.iter().map(|u| u.summary()).collect();
            Ok::<_, ApiError>(PagedDocument::from_window(summaries, &window, |p, l| {
                links.customer_users_page(customer_id, p, l)
            }))
        })
        .await?;

    Ok(CachedResponse::build(
        &document,
        StatusCode::OK,
        policy.ttl,
        conditions,
    )?)
}

/// Email and password of an add-user request body.
#[derive(Debug)]
struct AddUserRequest {
    email: String,
    password: String,
}

fn required_string(body: &Map<String, Value>, key: &str) -> Result<String, ApiError> {
    match body.get(key) {
        None | Some(Value::Null) => Err(ApiError::validation(format!("Missing key: {}", key))),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(ApiError::validation(format!(
            "Invalid value for key: {}",
            key
        ))),
    }
}

impl AddUserRequest {
    fn parse(body: &[u8]) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| ApiError::validation("Request body must be a JSON object"))?;
        let Value::Object(fields) = value else {
            return Err(ApiError::validation("Request body must be a JSON object"));
        };

        let email = required_string(&fields, "email")?.trim().to_string();
        let password = required_string(&fields, "password")?;

        if email.is_empty() || !email.contains('@') {
            return Err(ApiError::validation("Invalid email address"));
        }
        if email.len() > EMAIL_MAX_LEN {
            return Err(ApiError::validation(format!(
                "Email must be at most {} characters",
                EMAIL_MAX_LEN
            )));
        }
        if password.is_empty() {
            return Err(ApiError::validation("Password must not be empty"));
        }

        Ok(AddUserRequest { email, password })
    }
}

/// `POST /api/customers/{id}/add-user`
pub async fn add_user<S: Store, B: CacheBackend>(
    Authenticated(identity): Authenticated,
    State(state): State<AppState<S, B>>,
    Path(customer_id): Path<i64>,
    conditions: RequestConditions,
    body: Bytes,
) -> Result<CachedResponse, ApiError> {
    let customer = state
        .store
        .find_customer(customer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;
    if !authorize_customer(&identity, customer.id) {
        return Err(ApiError::forbidden(FORBIDDEN_CUSTOMER));
    }

    let request = AddUserRequest::parse(&body)?;
    if state
        .store
        .find_user_by_email(&request.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let password_hash = state.authenticator.hash_password(request.password).await?;
    let user = state
        .store
        .save_user(NewUser {
            email: request.email,
            password_hash,
            roles: Vec::new(),
            customer_id: Some(customer.id),
        })
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent insert of the same email
            Error::Conflict(_) => ApiError::Conflict("User already exists".to_string()),
            other => other.into(),
        })?;
    info!(
        "User {} added to customer {} by {}",
        user.id, customer.id, identity.email
    );

    state
        .invalidator
        .invalidate(Mutation::UserAdded {
            customer_id: customer.id,
        })
        .await;

    let document = Document::new(user.view(), state.links.user_links(user.id, user.customer_id));
    Ok(CachedResponse::build(
        &document,
        StatusCode::CREATED,
        state.ttls.user,
        &conditions,
    )?
    .with_location(state.links.user(user.id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<AddUserRequest, ApiError> {
        AddUserRequest::parse(body.as_bytes())
    }

    fn message(result: Result<AddUserRequest, ApiError>) -> String {
        match result {
            Err(ApiError::Validation(msg)) => msg,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_valid_body() {
        let request = parse(r#"{"email": " new@acme.test ", "password": "pw"}"#)
            .expect("Failed to parse");
        assert_eq!(request.email, "new@acme.test");
        assert_eq!(request.password, "pw");
    }

    #[test]
    fn test_missing_keys_are_reported_in_order() {
        assert_eq!(message(parse(r#"{}"#)), "Missing key: email");
        assert_eq!(
            message(parse(r#"{"email": "a@b.test"}"#)),
            "Missing key: password"
        );
        assert_eq!(
            message(parse(r#"{"email": "a@b.test", "password": null}"#)),
            "Missing key: password"
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert_eq!(
            message(parse(r#"{"email": 5, "password": "pw"}"#)),
            "Invalid value for key: email"
        );
        assert_eq!(
            message(parse(r#"{"email": "nope", "password": "pw"}"#)),
            "Invalid email address"
        );
        let long = format!(r#"{{"email": "{}@b.test", "password": "pw"}}"#, "a".repeat(180));
        assert!(message(parse(&long)).contains("at most 180"));
        assert_eq!(
            message(parse("[1, 2]")),
            "Request body must be a JSON object"
        );
        assert_eq!(message(parse("not json")), "Request body must be a JSON object");
    }
}
