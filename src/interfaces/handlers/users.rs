use actix_web::{web, HttpResponse, Responder, ResponseError};

use crate::{use_cases::extractors::AuthClaims, AppState};


pub async fn me(
    state: web::Data<AppState>,
    claims: AuthClaims,
) -> impl Responder {
    let user_id = match claims.user_id() {
        Ok(id) => id,
        Err(e) => return e.error_response(),
    };

    match state.auth_handler.current_user(&user_id).await {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(e) => e.to_http_response(),
    }
}
