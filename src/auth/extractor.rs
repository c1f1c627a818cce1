//! Actix-web extractor for the requesting user.

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use std::future::{Ready, ready};
use uuid::Uuid;

use crate::config::USER_ID_HEADER;
use crate::error::AppError;

/// The user on whose behalf the request is made.
///
/// Use `Option<CurrentUser>` in handlers where an anonymous caller is allowed:
/// ```ignore
/// async fn handler(user: Option<CurrentUser>) -> impl Responder { ... }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
}

impl CurrentUser {
    fn from_header(req: &HttpRequest) -> Result<Self, AppError> {
        let raw = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(format!("Missing {} header", USER_ID_HEADER))
            })?;

        let id = Uuid::parse_str(raw.trim()).map_err(|_| {
            AppError::Unauthorized(format!("{} header is not a valid user id", USER_ID_HEADER))
        })?;

        Ok(CurrentUser { id })
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_header(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_reads_user_id_header() {
        let id = Uuid::now_v7();
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, id.to_string()))
            .to_http_request();
        assert_eq!(CurrentUser::from_header(&req).unwrap().id, id);
    }

    #[test]
    fn test_missing_or_malformed_header_is_unauthorized() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            CurrentUser::from_header(&req),
            Err(AppError::Unauthorized(_))
        ));

        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "not-a-uuid"))
            .to_http_request();
        assert!(matches!(
            CurrentUser::from_header(&req),
            Err(AppError::Unauthorized(_))
        ));
    }
}
