use axum::{
    extract::{Path, State},
    Json,
};
use devconnect_api::{
    EducationInput, ExperienceInput, Post, PostInput, Profile, ProfileInput, Success,
};

use crate::{extractors::*, posts, profiles, Error};

fn parse_id<T: std::str::FromStr>(raw: &str) -> Option<T> {
    raw.parse().ok()
}

pub async fn test() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "msg": "Post works" }))
}

pub async fn create_post(
    Auth(author): Auth,
    State(store): State<Store>,
    Payload(input): Payload<PostInput>,
) -> Result<Json<Post>, Error> {
    Ok(Json(posts::create(&*store, &author, input).await?))
}

pub async fn list_posts(State(store): State<Store>) -> Result<Json<Vec<Post>>, Error> {
    Ok(Json(posts::list(&*store).await?))
}

pub async fn get_post(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<Json<Post>, Error> {
    Ok(Json(posts::get(&*store, parse_id(&id)).await?))
}

pub async fn delete_post(
    Auth(author): Auth,
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<Json<Success>, Error> {
    posts::delete(&*store, &author, parse_id(&id)).await?;
    Ok(Json(Success { success: true }))
}

pub async fn like_post(
    Auth(user): Auth,
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<Json<Post>, Error> {
    Ok(Json(posts::like(&*store, &user, parse_id(&id)).await?))
}

pub async fn unlike_post(
    Auth(user): Auth,
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<Json<Post>, Error> {
    Ok(Json(posts::unlike(&*store, &user, parse_id(&id)).await?))
}

pub async fn comment_post(
    Auth(author): Auth,
    State(store): State<Store>,
    Path(id): Path<String>,
    Payload(input): Payload<PostInput>,
) -> Result<Json<Post>, Error> {
    Ok(Json(
        posts::add_comment(&*store, &author, parse_id(&id), input).await?,
    ))
}

pub async fn uncomment_post(
    Auth(_): Auth,
    State(store): State<Store>,
    Path((id, comment_id)): Path<(String, String)>,
) -> Result<Json<Post>, Error> {
    Ok(Json(
        posts::remove_comment(&*store, parse_id(&id), parse_id(&comment_id)).await?,
    ))
}

pub async fn profile_test() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "msg": "Profile Works" }))
}

pub async fn current_profile(
    Auth(user): Auth,
    State(store): State<Profiles>,
) -> Result<Json<Profile>, Error> {
    Ok(Json(profiles::current(&*store, user.id).await?))
}

pub async fn save_profile(
    Auth(user): Auth,
    State(store): State<Profiles>,
    Payload(input): Payload<ProfileInput>,
) -> Result<Json<Profile>, Error> {
    Ok(Json(profiles::save(&*store, user.id, input).await?))
}

pub async fn delete_profile(
    Auth(user): Auth,
    State(store): State<Profiles>,
) -> Result<Json<Success>, Error> {
    profiles::delete(&*store, user.id).await?;
    Ok(Json(Success { success: true }))
}

pub async fn all_profiles(State(store): State<Profiles>) -> Result<Json<Vec<Profile>>, Error> {
    Ok(Json(profiles::all(&*store).await?))
}

pub async fn profile_by_handle(
    State(store): State<Profiles>,
    Path(handle): Path<String>,
) -> Result<Json<Profile>, Error> {
    Ok(Json(profiles::by_handle(&*store, &handle).await?))
}

pub async fn profile_by_user(
    State(store): State<Profiles>,
    Path(user): Path<String>,
) -> Result<Json<Profile>, Error> {
    Ok(Json(profiles::by_user(&*store, parse_id(&user)).await?))
}

pub async fn add_experience(
    Auth(user): Auth,
    State(store): State<Profiles>,
    Payload(input): Payload<ExperienceInput>,
) -> Result<Json<Profile>, Error> {
    Ok(Json(profiles::add_experience(&*store, user.id, input).await?))
}

pub async fn remove_experience(
    Auth(user): Auth,
    State(store): State<Profiles>,
    Path(id): Path<String>,
) -> Result<Json<Profile>, Error> {
    Ok(Json(
        profiles::remove_experience(&*store, user.id, parse_id(&id)).await?,
    ))
}

pub async fn add_education(
    Auth(user): Auth,
    State(store): State<Profiles>,
    Payload(input): Payload<EducationInput>,
) -> Result<Json<Profile>, Error> {
    Ok(Json(profiles::add_education(&*store, user.id, input).await?))
}

pub async fn remove_education(
    Auth(user): Auth,
    State(store): State<Profiles>,
    Path(id): Path<String>,
) -> Result<Json<Profile>, Error> {
    Ok(Json(
        profiles::remove_education(&*store, user.id, parse_id(&id)).await?,
    ))
}
