// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify proxy routes for authenticated users.
//!
//! Thin handlers: extract the session user, delegate to `SpotifyService`,
//! return JSON. The auth middleware is applied in routes/mod.rs.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::spotify::{
    Artist, Category, NowPlaying, Paging, PlayHistory, Playlist, PlaylistSummary, PublicUser,
    Queue, SavedTrack, SearchResults, Track,
};
use crate::services::spotify::PlaylistEdit;
use crate::services::video::VideoResult;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/spotify/playlists", get(get_playlists))
        .route("/spotify/playlist", post(create_playlist))
        .route(
            "/spotify/playlist/{id}",
            get(get_playlist).put(edit_playlist).delete(delete_playlist),
        )
        .route("/spotify/search", get(search))
        .route("/spotify/top-tracks", get(get_top_tracks))
        .route("/spotify/saved-tracks", get(get_saved_tracks))
        .route("/spotify/check-saved/{id}", get(check_saved))
        .route("/spotify/save-track/{id}", put(save_track))
        .route("/spotify/remove-track/{id}", delete(remove_track))
        .route("/spotify/artist/{id}", get(get_artist))
        .route("/spotify/artist/{id}/top-tracks", get(get_artist_top_tracks))
        .route("/spotify/artist/{id}/is-following", get(check_following))
        .route(
            "/spotify/artist/{id}/follow",
            put(follow_artist).delete(unfollow_artist),
        )
        .route("/spotify/token", get(get_token))
        .route("/spotify/play", put(play))
        .route("/spotify/transfer", put(transfer))
        .route("/spotify/currently-playing", get(currently_playing))
        .route("/spotify/recently-played", get(recently_played))
        .route("/spotify/seek", put(seek))
        .route("/spotify/pause", put(pause))
        .route("/spotify/resume", put(resume))
        .route("/spotify/next", post(next_track))
        .route("/spotify/previous", post(previous_track))
        .route("/spotify/volume", put(set_volume))
        .route("/spotify/queue", get(get_queue).post(add_to_queue))
        .route("/spotify/categories", get(get_categories))
        .route(
            "/spotify/categories/{id}/playlists",
            get(get_category_playlists),
        )
        .route("/spotify/featured", get(get_featured))
        .route("/spotify/video", get(get_video))
        .route("/spotify/user-profile/{id}", get(get_public_profile))
        .route(
            "/spotify/user-profile/{id}/playlists",
            get(get_public_playlists),
        )
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn success(success: bool) -> Json<SuccessResponse> {
    Json(SuccessResponse { success })
}

// ─── Playlists ───────────────────────────────────────────────────────────

async fn get_playlists(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<PlaylistSummary>>> {
    Ok(Json(state.spotify.get_user_playlists(user.user_id).await?))
}

async fn get_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Playlist>> {
    Ok(Json(state.spotify.get_playlist(user.user_id, &id).await?))
}

#[derive(Deserialize, Validate)]
pub struct CreatePlaylistRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[serde(default)]
    description: Option<String>,
    /// Base64 JPEG cover image
    #[serde(default)]
    image: Option<String>,
}

async fn create_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreatePlaylistRequest>,
) -> Result<Json<PlaylistSummary>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let playlist = state
        .spotify
        .create_playlist(
            user.user_id,
            &payload.name,
            payload.description.as_deref().unwrap_or(""),
            payload.image.as_deref(),
        )
        .await?;
    Ok(Json(playlist))
}

#[derive(Deserialize)]
pub struct EditPlaylistRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

async fn edit_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(payload): Json<EditPlaylistRequest>,
) -> Result<Json<SuccessResponse>> {
    state
        .spotify
        .edit_playlist(
            user.user_id,
            &id,
            PlaylistEdit {
                name: payload.name,
                description: payload.description,
                image: payload.image,
            },
        )
        .await?;
    Ok(success(true))
}

async fn delete_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state.spotify.delete_playlist(user.user_id, &id).await?;
    Ok(success(true))
}

// ─── Search & library ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SearchQuery {
    q: String,
}

async fn search(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResults>> {
    Ok(Json(state.spotify.search(user.user_id, &params.q).await?))
}

async fn get_top_tracks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Track>>> {
    Ok(Json(state.spotify.get_top_tracks(user.user_id).await?))
}

#[derive(Deserialize)]
pub struct SavedTracksQuery {
    #[serde(default)]
    offset: Option<u32>,
}

async fn get_saved_tracks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<SavedTracksQuery>,
) -> Result<Json<Paging<SavedTrack>>> {
    Ok(Json(
        state
            .spotify
            .get_saved_tracks(user.user_id, params.offset.unwrap_or(0))
            .await?,
    ))
}

async fn check_saved(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<bool>> {
    Ok(Json(state.spotify.is_track_saved(user.user_id, &id).await?))
}

async fn save_track(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state.spotify.save_track(user.user_id, &id).await?;
    Ok(success(true))
}

async fn remove_track(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state.spotify.remove_track(user.user_id, &id).await?;
    Ok(success(true))
}

// ─── Artists ─────────────────────────────────────────────────────────────

async fn get_artist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Artist>> {
    Ok(Json(state.spotify.get_artist(user.user_id, &id).await?))
}

async fn get_artist_top_tracks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Track>>> {
    Ok(Json(
        state.spotify.get_artist_top_tracks(user.user_id, &id).await?,
    ))
}

async fn check_following(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<bool>> {
    Ok(Json(
        state.spotify.is_following_artist(user.user_id, &id).await?,
    ))
}

async fn follow_artist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state.spotify.follow_artist(user.user_id, &id).await?;
    Ok(success(true))
}

async fn unfollow_artist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state.spotify.unfollow_artist(user.user_id, &id).await?;
    Ok(success(true))
}

// ─── Playback ────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct TokenBody {
    pub token: String,
}

/// Raw access token for the frontend's Web Playback SDK.
async fn get_token(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TokenBody>> {
    let token = state.spotify.get_access_token(user.user_id).await?;
    Ok(Json(TokenBody { token }))
}

#[derive(Deserialize)]
pub struct PlayRequest {
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    uris: Vec<String>,
    #[serde(default)]
    context_uri: Option<String>,
}

async fn play(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<PlayRequest>,
) -> Result<Json<SuccessResponse>> {
    state
        .spotify
        .play(
            user.user_id,
            payload.device_id.as_deref(),
            &payload.uris,
            payload.context_uri.as_deref(),
        )
        .await?;
    Ok(success(true))
}

#[derive(Deserialize)]
pub struct TransferRequest {
    device_id: String,
}

async fn transfer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<TransferRequest>,
) -> Result<Json<SuccessResponse>> {
    state
        .spotify
        .transfer_playback(user.user_id, &payload.device_id)
        .await?;
    Ok(success(true))
}

async fn currently_playing(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Option<NowPlaying>>> {
    Ok(Json(state.spotify.get_currently_playing(user.user_id).await?))
}

async fn recently_played(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<PlayHistory>>> {
    Ok(Json(state.spotify.get_recently_played(user.user_id).await?))
}

#[derive(Deserialize)]
pub struct SeekRequest {
    position_ms: u64,
    #[serde(default)]
    device_id: Option<String>,
}

async fn seek(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SeekRequest>,
) -> Result<Json<SuccessResponse>> {
    state
        .spotify
        .seek(user.user_id, payload.position_ms, payload.device_id.as_deref())
        .await?;
    Ok(success(true))
}

#[derive(Deserialize)]
pub struct DeviceRequest {
    #[serde(default)]
    device_id: Option<String>,
}

async fn pause(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<DeviceRequest>,
) -> Result<Json<SuccessResponse>> {
    let ok = state
        .spotify
        .pause(user.user_id, payload.device_id.as_deref())
        .await?;
    Ok(success(ok))
}

async fn resume(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<DeviceRequest>,
) -> Result<Json<SuccessResponse>> {
    state
        .spotify
        .resume(user.user_id, payload.device_id.as_deref())
        .await?;
    Ok(success(true))
}

async fn next_track(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<DeviceRequest>,
) -> Result<Json<SuccessResponse>> {
    state
        .spotify
        .next_track(user.user_id, payload.device_id.as_deref())
        .await?;
    Ok(success(true))
}

async fn previous_track(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<DeviceRequest>,
) -> Result<Json<SuccessResponse>> {
    state
        .spotify
        .previous_track(user.user_id, payload.device_id.as_deref())
        .await?;
    Ok(success(true))
}

#[derive(Deserialize, Validate)]
pub struct VolumeRequest {
    #[validate(range(max = 100))]
    volume_percent: u8,
    #[serde(default)]
    device_id: Option<String>,
}

async fn set_volume(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<VolumeRequest>,
) -> Result<Json<SuccessResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let ok = state
        .spotify
        .set_volume(
            user.user_id,
            payload.volume_percent,
            payload.device_id.as_deref(),
        )
        .await?;
    Ok(success(ok))
}

// ─── Queue ───────────────────────────────────────────────────────────────

async fn get_queue(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Queue>> {
    Ok(Json(state.spotify.get_queue(user.user_id).await?))
}

#[derive(Deserialize)]
pub struct AddToQueueRequest {
    uri: String,
    #[serde(default)]
    device_id: Option<String>,
}

async fn add_to_queue(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AddToQueueRequest>,
) -> Result<Json<SuccessResponse>> {
    state
        .spotify
        .add_to_queue(user.user_id, &payload.uri, payload.device_id.as_deref())
        .await?;
    Ok(success(true))
}

// ─── Browse ──────────────────────────────────────────────────────────────

async fn get_categories(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.spotify.get_categories(user.user_id).await?))
}

async fn get_category_playlists(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PlaylistSummary>>> {
    Ok(Json(
        state
            .spotify
            .get_category_playlists(user.user_id, &id)
            .await?,
    ))
}

async fn get_featured(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<PlaylistSummary>>> {
    Ok(Json(state.spotify.get_featured_playlists(user.user_id).await?))
}

// ─── Misc ────────────────────────────────────────────────────────────────

async fn get_video(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Option<VideoResult>>> {
    Ok(Json(state.spotify.find_video(&params.q).await?))
}

async fn get_public_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>> {
    Ok(Json(
        state.spotify.get_public_profile(user.user_id, &id).await?,
    ))
}

async fn get_public_playlists(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PlaylistSummary>>> {
    Ok(Json(
        state.spotify.get_public_playlists(user.user_id, &id).await?,
    ))
}
