use actix_multipart::form::MultipartForm;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::image::{ImageContentUpload, ImageResponse, ImageUpdate, ImageUpload, ListQuery, SearchQuery},
    errors::AppError,
    use_cases::extractors::AuthClaims,
    AppState,
};

macro_rules! owner_or_return {
    ($claims:expr) => {
        match $claims.user_id() {
            Ok(id) => id,
            Err(e) => return e.error_response(),
        }
    };
}

fn image_list(records: Vec<crate::entities::image::ImageRecord>) -> HttpResponse {
    let body: Vec<ImageResponse> = records.into_iter().map(ImageResponse::from).collect();
    HttpResponse::Ok().json(body)
}

pub async fn upload_image(
    claims: AuthClaims,
    state: web::Data<AppState>,
    form: MultipartForm<ImageUpload>,
) -> impl Responder {
    let owner = owner_or_return!(claims);
    let form = form.into_inner();

    match state.image_handler.upload(owner, form.request()).await {
        Ok(record) => HttpResponse::Created().json(ImageResponse::from(record)),
        Err(e) => e.to_http_response(),
    }
}

pub async fn list_images(
    claims: AuthClaims,
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> impl Responder {
    let owner = owner_or_return!(claims);

    match state.image_handler.list(owner, query.into_inner()).await {
        Ok(records) => image_list(records),
        Err(e) => e.to_http_response(),
    }
}

pub async fn search_images(
    claims: AuthClaims,
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> impl Responder {
    let owner = owner_or_return!(claims);
    if let Err(e) = query.validate() {
        return AppError::from(e).to_http_response();
    }

    match state.image_handler.search(owner, &query.q).await {
        Ok(records) => image_list(records),
        Err(e) => e.to_http_response(),
    }
}

pub async fn get_image(
    claims: AuthClaims,
    state: web::Data<AppState>,
    image_id: web::Path<Uuid>,
) -> impl Responder {
    let owner = owner_or_return!(claims);

    match state.image_handler.get(owner, image_id.into_inner()).await {
        Ok(record) => HttpResponse::Ok().json(ImageResponse::from(record)),
        Err(e) => e.to_http_response(),
    }
}

pub async fn update_image(
    claims: AuthClaims,
    state: web::Data<AppState>,
    image_id: web::Path<Uuid>,
    update: web::Json<ImageUpdate>,
) -> impl Responder {
    let owner = owner_or_return!(claims);

    match state
        .image_handler
        .update_metadata(owner, image_id.into_inner(), update.into_inner())
        .await
    {
        Ok(record) => HttpResponse::Ok().json(ImageResponse::from(record)),
        Err(e) => e.to_http_response(),
    }
}

pub async fn replace_image_content(
    claims: AuthClaims,
    state: web::Data<AppState>,
    image_id: web::Path<Uuid>,
    form: MultipartForm<ImageContentUpload>,
) -> impl Responder {
    let owner = owner_or_return!(claims);
    let form = form.into_inner();

    match state
        .image_handler
        .replace_content(owner, image_id.into_inner(), form.request())
        .await
    {
        Ok(record) => HttpResponse::Ok().json(ImageResponse::from(record)),
        Err(e) => e.to_http_response(),
    }
}

pub async fn delete_image(
    claims: AuthClaims,
    state: web::Data<AppState>,
    image_id: web::Path<Uuid>,
) -> impl Responder {
    let owner = owner_or_return!(claims);

    match state.image_handler.delete(owner, image_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => e.to_http_response(),
    }
}
