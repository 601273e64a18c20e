use crate::store::{StoreError, UserStore, LOCKOUT, MAX_FAILED_LOGINS};
use crate::{password, NewUser};
use auth::RequestExt;
use proto_commerce::identity as pb;
use proto_grpc::identity::identity_service_server::IdentityService;
use std::sync::Arc;
use tokens::Clock;
use tonic::{Request, Response, Status};

/// Implementation of `commerce.identity.IdentityService`. Authentication
/// and per-method authorization run in the interceptor chain before any
/// of these handlers; handlers only add checks that need request fields.
pub struct IdentityApi {
    store: Arc<UserStore>,
    codec: Arc<tokens::Codec>,
    clock: Arc<dyn Clock>,
}

impl IdentityApi {
    pub fn new(store: Arc<UserStore>, codec: Arc<tokens::Codec>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            codec,
            clock,
        }
    }
}

fn store_status(err: StoreError) -> Status {
    match err {
        StoreError::NotFound => Status::not_found("user not found"),
        StoreError::AlreadyExists => Status::already_exists("username or email is already taken"),
        StoreError::VersionConflict => Status::aborted("user was concurrently modified"),
    }
}

fn validate_signup(req: &pb::CreateUserRequest) -> Result<(), Status> {
    if req.username.is_empty() {
        return Err(Status::invalid_argument("username must not be empty"));
    }
    if !req.email.contains('@') {
        return Err(Status::invalid_argument("email must contain '@'"));
    }
    if req.password.len() < 8 {
        return Err(Status::invalid_argument(
            "password must be at least 8 characters",
        ));
    }
    Ok(())
}

#[tonic::async_trait]
impl IdentityService for IdentityApi {
    #[tracing::instrument(skip_all, fields(username = %request.get_ref().username))]
    async fn create_user(
        &self,
        request: Request<pb::CreateUserRequest>,
    ) -> Result<Response<pb::CreateUserResponse>, Status> {
        let req = request.into_inner();
        validate_signup(&req)?;

        let user = self
            .store
            .insert(NewUser {
                username: req.username,
                email: req.email,
                password_hash: password::hash(&req.password),
                first_name: req.first_name,
                last_name: req.last_name,
                phone: req.phone,
            })
            .map_err(store_status)?;

        tracing::info!(user_id = %user.user_id, "created user");

        Ok(Response::new(pb::CreateUserResponse {
            user_id: user.user_id.clone(),
            created_at_unix_ms: user.created_at.timestamp_millis(),
            profile: Some(user.profile()),
            message: "user created".to_string(),
        }))
    }

    #[tracing::instrument(skip_all, fields(username = %request.get_ref().username))]
    async fn login(
        &self,
        request: Request<pb::LoginRequest>,
    ) -> Result<Response<pb::LoginResponse>, Status> {
        let req = request.into_inner();
        let now = self.clock.now();

        let Some(mut user) = self.store.get_by_username(&req.username) else {
            return Err(Status::unauthenticated("invalid credentials"));
        };
        if user.is_locked(now) {
            return Err(Status::unauthenticated("account is temporarily locked"));
        }

        if !password::verify(&req.password, &user.password_hash) {
            user.failed_login_attempts += 1;
            if user.failed_login_attempts >= MAX_FAILED_LOGINS {
                user.locked_until = Some(now + LOCKOUT);
                tracing::warn!(user_id = %user.user_id, "account locked after repeated failures");
            }
            if let Err(err) = self.store.save(user) {
                tracing::warn!(error = %err, "failed to record login failure");
            }
            return Err(Status::unauthenticated("invalid credentials"));
        }

        if user.failed_login_attempts > 0 || user.locked_until.is_some() {
            user.failed_login_attempts = 0;
            user.locked_until = None;
            user = self.store.save(user).map_err(store_status)?;
        }

        let ttl = self.codec.default_ttl();
        let token = self
            .codec
            .issue(&user.username, Some(&user.user_id), &user.roles, ttl)
            .map_err(|err| {
                tracing::error!(error = %err, "token issuance failed");
                Status::internal("could not issue token")
            })?;

        Ok(Response::new(pb::LoginResponse {
            token,
            expires_at_unix_ms: (now + ttl).timestamp_millis(),
            profile: Some(user.profile()),
        }))
    }

    async fn get_user(
        &self,
        request: Request<pb::GetUserRequest>,
    ) -> Result<Response<pb::GetUserResponse>, Status> {
        let user = self
            .store
            .get(&request.get_ref().user_id)
            .ok_or_else(|| Status::not_found("user not found"))?;

        Ok(Response::new(pb::GetUserResponse {
            profile: Some(user.profile()),
        }))
    }

    async fn update_user_profile(
        &self,
        request: Request<pb::UpdateUserProfileRequest>,
    ) -> Result<Response<pb::UpdateUserProfileResponse>, Status> {
        // The target user may edit themselves; administrators may edit anyone.
        request.require_self_or_authority(&request.get_ref().user_id, &["ROLE_ADMIN"])?;
        let req = request.into_inner();

        let mut user = self
            .store
            .get(&req.user_id)
            .ok_or_else(|| Status::not_found("user not found"))?;

        if let Some(first_name) = req.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            user.last_name = last_name;
        }
        if let Some(phone) = req.phone {
            user.phone = Some(phone);
        }

        let user = self.store.save(user).map_err(store_status)?;

        Ok(Response::new(pb::UpdateUserProfileResponse {
            profile: Some(user.profile()),
        }))
    }

    #[tracing::instrument(skip_all, fields(user_id = %request.get_ref().user_id))]
    async fn validate_user(
        &self,
        request: Request<pb::ValidateUserRequest>,
    ) -> Result<Response<pb::ValidateUserResponse>, Status> {
        let user_id = request.into_inner().user_id;

        let (valid, message) = match self.store.get(&user_id) {
            None => (false, "user not found"),
            Some(user) if user.is_valid_for_order() => (true, "user may place orders"),
            Some(_) => (false, "user is not eligible to place orders"),
        };

        Ok(Response::new(pb::ValidateUserResponse {
            valid,
            user_id,
            message: message.to_string(),
        }))
    }

    async fn health_check(
        &self,
        _request: Request<pb::HealthCheckRequest>,
    ) -> Result<Response<pb::HealthCheckResponse>, Status> {
        Ok(Response::new(pb::HealthCheckResponse {
            status: "SERVING".to_string(),
            message: String::new(),
        }))
    }
}
