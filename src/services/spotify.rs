// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! High-level Spotify operations: playback control, library, playlists,
//! search and browsing.
//!
//! Every method goes through the [`SpotifyGateway`]. State-changing calls
//! surface failures; polling and read-heavy calls degrade gracefully
//! (empty/neutral fallbacks, stale cache values) so a UI poll loop never
//! breaks on an upstream hiccup. A missing Spotify connection always
//! surfaces as `NotConnected`, even on best-effort reads.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use crate::db::UserStore;
use crate::error::AppError;
use crate::models::spotify::{
    Artist, ArtistTopTracksResponse, CategoriesResponse, Category, CategoryPlaylistsResponse,
    CurrentlyPlaying, CursorPage, NowPlaying, Paging, PlayBody, PlayHistory, PlayOffset, Playlist,
    PlaylistSearchResults, PlaylistSummary, PublicUser, Queue, SavedTrack, SearchResults, Track,
    UserProfile,
};
use crate::services::cache::{ttl, ResponseCache};
use crate::services::gateway::{ApiRequest, SpotifyGateway};
use crate::services::video::{VideoClient, VideoResult};

/// Spotify caps play-request bodies at 50 track URIs.
const MAX_PLAY_URIS: usize = 50;

/// Changes to a playlist's metadata.
#[derive(Debug, Clone, Default)]
pub struct PlaylistEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Base64 JPEG cover image
    pub image: Option<String>,
}

#[derive(Clone)]
pub struct SpotifyService {
    gateway: SpotifyGateway,
    cache: ResponseCache,
    store: Arc<dyn UserStore>,
    video: VideoClient,
}

impl SpotifyService {
    pub fn new(
        gateway: SpotifyGateway,
        cache: ResponseCache,
        store: Arc<dyn UserStore>,
        video: VideoClient,
    ) -> Self {
        Self {
            gateway,
            cache,
            store,
            video,
        }
    }

    // ─── Playlists ───────────────────────────────────────────────────────

    pub async fn get_user_playlists(&self, user_id: i64) -> Result<Vec<PlaylistSummary>, AppError> {
        let page: Paging<PlaylistSummary> = self
            .gateway
            .json(user_id, ApiRequest::get("/me/playlists"))
            .await?;
        Ok(page.items)
    }

    pub async fn get_playlist(
        &self,
        user_id: i64,
        playlist_id: &str,
    ) -> Result<Playlist, AppError> {
        self.gateway
            .json(user_id, ApiRequest::get(format!("/playlists/{}", playlist_id)))
            .await
    }

    /// Create a private playlist, then upload the cover image when one was
    /// supplied. A failed upload does not cancel the creation.
    pub async fn create_playlist(
        &self,
        user_id: i64,
        name: &str,
        description: &str,
        image_base64: Option<&str>,
    ) -> Result<PlaylistSummary, AppError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;
        let spotify_id = user.spotify_id.ok_or(AppError::NotConnected)?;

        let playlist: PlaylistSummary = self
            .gateway
            .json(
                user_id,
                ApiRequest::post(format!("/users/{}/playlists", spotify_id)).json(json!({
                    "name": name,
                    "description": description,
                    "public": false,
                })),
            )
            .await?;

        if let Some(image) = image_base64 {
            if let Err(err) = self.upload_playlist_image(user_id, &playlist.id, image).await {
                tracing::warn!(user_id, playlist_id = %playlist.id, error = %err, "Cover upload failed");
            }
        }

        Ok(playlist)
    }

    pub async fn edit_playlist(
        &self,
        user_id: i64,
        playlist_id: &str,
        edit: PlaylistEdit,
    ) -> Result<(), AppError> {
        if edit.name.is_some() || edit.description.is_some() {
            // Only send the fields being changed; nulls would blank them.
            let mut body = serde_json::Map::new();
            if let Some(name) = &edit.name {
                body.insert("name".to_string(), json!(name));
            }
            if let Some(description) = &edit.description {
                body.insert("description".to_string(), json!(description));
            }
            self.gateway
                .empty(
                    user_id,
                    ApiRequest::put(format!("/playlists/{}", playlist_id))
                        .json(serde_json::Value::Object(body)),
                )
                .await?;
        }

        if let Some(image) = edit.image.as_deref() {
            self.upload_playlist_image(user_id, playlist_id, image).await?;
        }

        Ok(())
    }

    /// "Deleting" a playlist is unfollowing it; Spotify has no hard delete.
    pub async fn delete_playlist(&self, user_id: i64, playlist_id: &str) -> Result<(), AppError> {
        self.gateway
            .empty(
                user_id,
                ApiRequest::delete(format!("/playlists/{}/followers", playlist_id)),
            )
            .await
    }

    /// Spotify wants the raw base64 string as the body with an image/jpeg
    /// content type, not a JSON envelope.
    async fn upload_playlist_image(
        &self,
        user_id: i64,
        playlist_id: &str,
        image_base64: &str,
    ) -> Result<(), AppError> {
        self.gateway
            .empty(
                user_id,
                ApiRequest::put(format!("/playlists/{}/images", playlist_id))
                    .raw_body("image/jpeg", image_base64.as_bytes().to_vec()),
            )
            .await
    }

    // ─── Search & browse ─────────────────────────────────────────────────

    pub async fn search(&self, user_id: i64, query: &str) -> Result<SearchResults, AppError> {
        self.gateway
            .json(
                user_id,
                ApiRequest::get("/search")
                    .query("q", query)
                    .query("type", "track,artist")
                    .query("limit", "10"),
            )
            .await
    }

    pub async fn get_top_tracks(&self, user_id: i64) -> Result<Vec<Track>, AppError> {
        let result: Result<Paging<Track>, _> = self
            .gateway
            .json(
                user_id,
                ApiRequest::get("/me/top/tracks").query("limit", "10"),
            )
            .await;
        soften(result.map(|page| page.items), Vec::new, "top tracks")
    }

    pub async fn get_categories(&self, user_id: i64) -> Result<Vec<Category>, AppError> {
        let region = self.get_user_region(user_id).await?;
        let gateway = self.gateway.clone();
        self.cache
            .get_or_fetch(user_id, "categories", ttl::CATEGORIES, move || async move {
                let response: CategoriesResponse = gateway
                    .json(
                        user_id,
                        ApiRequest::get("/browse/categories")
                            .query("country", region)
                            .query("limit", "50"),
                    )
                    .await?;
                Ok(response.categories.items)
            })
            .await
    }

    pub async fn get_category_playlists(
        &self,
        user_id: i64,
        category_id: &str,
    ) -> Result<Vec<PlaylistSummary>, AppError> {
        let region = self.get_user_region(user_id).await?;
        let key = format!("category-playlists:{}", category_id);
        let gateway = self.gateway.clone();
        let path = format!("/browse/categories/{}/playlists", category_id);
        self.cache
            .get_or_fetch(user_id, &key, ttl::CATEGORY_PLAYLISTS, move || async move {
                let response: CategoryPlaylistsResponse = gateway
                    .json(
                        user_id,
                        ApiRequest::get(path)
                            .query("country", region)
                            .query("limit", "50"),
                    )
                    .await?;
                Ok(response.playlists.items)
            })
            .await
    }

    /// Editorial playlists for the user's region. `author:spotify` forces
    /// the search to only return playlists curated by Spotify itself.
    pub async fn get_featured_playlists(
        &self,
        user_id: i64,
    ) -> Result<Vec<PlaylistSummary>, AppError> {
        let region = self.get_user_region(user_id).await?;
        let result: Result<PlaylistSearchResults, _> = self
            .gateway
            .json(
                user_id,
                ApiRequest::get("/search")
                    .query("q", "Top Hits author:spotify")
                    .query("type", "playlist")
                    .query("market", region.as_str())
                    .query("limit", "15"),
            )
            .await;
        soften(
            result.map(|r| r.playlists.items),
            Vec::new,
            "featured playlists",
        )
    }

    /// The account's country, cached for a day; it only changes when the
    /// user physically moves.
    pub async fn get_user_region(&self, user_id: i64) -> Result<String, AppError> {
        let gateway = self.gateway.clone();
        let result = self
            .cache
            .get_or_fetch(user_id, "region", ttl::REGION, move || async move {
                let profile: UserProfile = gateway.json(user_id, ApiRequest::get("/me")).await?;
                Ok(profile.country.unwrap_or_else(|| "US".to_string()))
            })
            .await;
        soften(result, || "US".to_string(), "user region")
    }

    // ─── Saved tracks ────────────────────────────────────────────────────

    pub async fn get_saved_tracks(
        &self,
        user_id: i64,
        offset: u32,
    ) -> Result<Paging<SavedTrack>, AppError> {
        self.gateway
            .json(
                user_id,
                ApiRequest::get("/me/tracks")
                    .query("limit", "50")
                    .query("offset", offset.to_string()),
            )
            .await
    }

    pub async fn is_track_saved(&self, user_id: i64, track_id: &str) -> Result<bool, AppError> {
        let result: Result<Vec<bool>, _> = self
            .gateway
            .json(
                user_id,
                ApiRequest::get("/me/tracks/contains").query("ids", track_id),
            )
            .await;
        soften(
            result.map(|flags| flags.first().copied().unwrap_or(false)),
            || false,
            "saved check",
        )
    }

    pub async fn save_track(&self, user_id: i64, track_id: &str) -> Result<(), AppError> {
        self.gateway
            .empty(user_id, ApiRequest::put("/me/tracks").query("ids", track_id))
            .await
    }

    pub async fn remove_track(&self, user_id: i64, track_id: &str) -> Result<(), AppError> {
        self.gateway
            .empty(
                user_id,
                ApiRequest::delete("/me/tracks").query("ids", track_id),
            )
            .await
    }

    // ─── Artists ─────────────────────────────────────────────────────────

    pub async fn get_artist(&self, user_id: i64, artist_id: &str) -> Result<Artist, AppError> {
        let key = format!("artist:{}", artist_id);
        let gateway = self.gateway.clone();
        let path = format!("/artists/{}", artist_id);
        self.cache
            .get_or_fetch(user_id, &key, ttl::ARTIST, move || async move {
                gateway.json(user_id, ApiRequest::get(path)).await
            })
            .await
    }

    pub async fn get_artist_top_tracks(
        &self,
        user_id: i64,
        artist_id: &str,
    ) -> Result<Vec<Track>, AppError> {
        let region = self.get_user_region(user_id).await?;
        let result: Result<ArtistTopTracksResponse, _> = self
            .gateway
            .json(
                user_id,
                ApiRequest::get(format!("/artists/{}/top-tracks", artist_id))
                    .query("market", region.as_str()),
            )
            .await;
        soften(result.map(|r| r.tracks), Vec::new, "artist top tracks")
    }

    pub async fn is_following_artist(
        &self,
        user_id: i64,
        artist_id: &str,
    ) -> Result<bool, AppError> {
        let key = format!("follow:{}", artist_id);
        let gateway = self.gateway.clone();
        let artist_id = artist_id.to_string();
        let result = self
            .cache
            .get_or_fetch(user_id, &key, ttl::FOLLOW_STATUS, move || async move {
                let flags: Vec<bool> = gateway
                    .json(
                        user_id,
                        ApiRequest::get("/me/following/contains")
                            .query("type", "artist")
                            .query("ids", artist_id),
                    )
                    .await?;
                Ok(flags.first().copied().unwrap_or(false))
            })
            .await;
        soften(result, || false, "follow status")
    }

    pub async fn follow_artist(&self, user_id: i64, artist_id: &str) -> Result<(), AppError> {
        self.gateway
            .empty(
                user_id,
                ApiRequest::put("/me/following")
                    .query("type", "artist")
                    .query("ids", artist_id),
            )
            .await
    }

    pub async fn unfollow_artist(&self, user_id: i64, artist_id: &str) -> Result<(), AppError> {
        self.gateway
            .empty(
                user_id,
                ApiRequest::delete("/me/following")
                    .query("type", "artist")
                    .query("ids", artist_id),
            )
            .await
    }

    // ─── Playback ────────────────────────────────────────────────────────

    pub async fn play(
        &self,
        user_id: i64,
        device_id: Option<&str>,
        uris: &[String],
        context_uri: Option<&str>,
    ) -> Result<(), AppError> {
        let body = build_play_body(context_uri, uris);
        let mut req = ApiRequest::put("/me/player/play").json(
            serde_json::to_value(&body)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("play body: {}", e)))?,
        );
        if let Some(device) = device_id {
            req = req.query("device_id", device);
        }
        self.gateway.empty(user_id, req).await
    }

    pub async fn transfer_playback(&self, user_id: i64, device_id: &str) -> Result<(), AppError> {
        self.gateway
            .empty(
                user_id,
                ApiRequest::put("/me/player").json(json!({
                    "device_ids": [device_id],
                    "play": true,
                })),
            )
            .await
    }

    /// Playback state for the poll loop. Cached for two seconds, zero
    /// retry budget: a throttled poll fails fast and the frontend just
    /// polls again.
    pub async fn get_currently_playing(
        &self,
        user_id: i64,
    ) -> Result<Option<NowPlaying>, AppError> {
        let gateway = self.gateway.clone();
        let result = self
            .cache
            .get_or_fetch(user_id, "now-playing", ttl::NOW_PLAYING, move || async move {
                let state: Option<CurrentlyPlaying> = gateway
                    .optional_json(
                        user_id,
                        ApiRequest::get("/me/player/currently-playing").retry_budget(0),
                    )
                    .await?;
                Ok(state.and_then(|playing| {
                    let item = playing.item?;
                    Some(NowPlaying {
                        item,
                        is_playing: playing.is_playing.unwrap_or(false),
                        device_id: playing.device.and_then(|d| d.id),
                        progress_ms: playing.progress_ms,
                    })
                }))
            })
            .await;
        soften(result, || None, "currently playing")
    }

    pub async fn seek(
        &self,
        user_id: i64,
        position_ms: u64,
        device_id: Option<&str>,
    ) -> Result<(), AppError> {
        let mut req =
            ApiRequest::put("/me/player/seek").query("position_ms", position_ms.to_string());
        if let Some(device) = device_id {
            req = req.query("device_id", device);
        }
        self.gateway.empty(user_id, req).await
    }

    /// Pausing an already-paused player is an upstream error; treat it as
    /// a no-op and report `false`.
    pub async fn pause(&self, user_id: i64, device_id: Option<&str>) -> Result<bool, AppError> {
        let mut req = ApiRequest::put("/me/player/pause");
        if let Some(device) = device_id {
            req = req.query("device_id", device);
        }
        soften(
            self.gateway.empty(user_id, req).await.map(|_| true),
            || false,
            "pause",
        )
    }

    pub async fn resume(&self, user_id: i64, device_id: Option<&str>) -> Result<(), AppError> {
        let mut req = ApiRequest::put("/me/player/play");
        if let Some(device) = device_id {
            req = req.query("device_id", device);
        }
        self.gateway.empty(user_id, req).await
    }

    pub async fn next_track(&self, user_id: i64, device_id: Option<&str>) -> Result<(), AppError> {
        let mut req = ApiRequest::post("/me/player/next");
        if let Some(device) = device_id {
            req = req.query("device_id", device);
        }
        self.gateway.empty(user_id, req).await
    }

    pub async fn previous_track(
        &self,
        user_id: i64,
        device_id: Option<&str>,
    ) -> Result<(), AppError> {
        let mut req = ApiRequest::post("/me/player/previous");
        if let Some(device) = device_id {
            req = req.query("device_id", device);
        }
        self.gateway.empty(user_id, req).await
    }

    /// Some devices reject remote volume changes; report `false` instead
    /// of failing.
    pub async fn set_volume(
        &self,
        user_id: i64,
        volume_percent: u8,
        device_id: Option<&str>,
    ) -> Result<bool, AppError> {
        let mut req = ApiRequest::put("/me/player/volume")
            .query("volume_percent", volume_percent.to_string());
        if let Some(device) = device_id {
            req = req.query("device_id", device);
        }
        soften(
            self.gateway.empty(user_id, req).await.map(|_| true),
            || false,
            "volume",
        )
    }

    pub async fn get_queue(&self, user_id: i64) -> Result<Queue, AppError> {
        self.gateway
            .json(user_id, ApiRequest::get("/me/player/queue"))
            .await
    }

    pub async fn add_to_queue(
        &self,
        user_id: i64,
        uri: &str,
        device_id: Option<&str>,
    ) -> Result<(), AppError> {
        let mut req = ApiRequest::post("/me/player/queue").query("uri", uri);
        if let Some(device) = device_id {
            req = req.query("device_id", device);
        }
        self.gateway.empty(user_id, req).await
    }

    /// Listening history with repeats collapsed: the same track played
    /// five times in a row shows up once.
    pub async fn get_recently_played(&self, user_id: i64) -> Result<Vec<PlayHistory>, AppError> {
        let result: Result<CursorPage<PlayHistory>, _> = self
            .gateway
            .json(
                user_id,
                ApiRequest::get("/me/player/recently-played").query("limit", "50"),
            )
            .await;
        soften(
            result.map(|page| dedup_history(page.items)),
            Vec::new,
            "recently played",
        )
    }

    // ─── Users & misc ────────────────────────────────────────────────────

    pub async fn get_public_profile(
        &self,
        user_id: i64,
        public_user_id: &str,
    ) -> Result<PublicUser, AppError> {
        self.gateway
            .json(user_id, ApiRequest::get(format!("/users/{}", public_user_id)))
            .await
    }

    pub async fn get_public_playlists(
        &self,
        user_id: i64,
        public_user_id: &str,
    ) -> Result<Vec<PlaylistSummary>, AppError> {
        let result: Result<Paging<PlaylistSummary>, _> = self
            .gateway
            .json(
                user_id,
                ApiRequest::get(format!("/users/{}/playlists", public_user_id))
                    .query("limit", "20"),
            )
            .await;
        soften(result.map(|page| page.items), Vec::new, "public playlists")
    }

    /// The raw access token, for the frontend's Web Playback SDK.
    pub async fn get_access_token(&self, user_id: i64) -> Result<String, AppError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;
        user.spotify_access_token.ok_or(AppError::NotConnected)
    }

    /// Force a token refresh (manual refresh endpoint).
    pub async fn refresh_access_token(&self, user_id: i64) -> Result<String, AppError> {
        self.gateway.force_refresh(user_id).await
    }

    /// Music-video lookup for the current track. Purely best-effort.
    pub async fn find_video(&self, query: &str) -> Result<Option<VideoResult>, AppError> {
        match self.video.find_video(query).await {
            Ok(result) => Ok(result),
            Err(err) => {
                tracing::warn!(error = %err, query, "Video lookup failed");
                Ok(None)
            }
        }
    }
}

/// Best-effort wrapper: upstream failures become a neutral fallback, but a
/// missing Spotify connection always propagates.
fn soften<T>(
    result: Result<T, AppError>,
    fallback: impl FnOnce() -> T,
    what: &str,
) -> Result<T, AppError> {
    match result {
        Err(AppError::NotConnected) => Err(AppError::NotConnected),
        Err(err) => {
            tracing::warn!(error = %err, what, "Best-effort read failed, returning fallback");
            Ok(fallback())
        }
        ok => ok,
    }
}

/// Translate a play intent into one of the two upstream body shapes.
///
/// With a context, an offset is only attached when the supplied starting
/// point is syntactically a valid track URI. An invalid offset breaks
/// playback entirely upstream, while a bare context just starts at the top.
pub fn build_play_body(context_uri: Option<&str>, uris: &[String]) -> PlayBody {
    if let Some(context) = context_uri {
        let offset = uris
            .first()
            .filter(|uri| is_track_uri(uri))
            .map(|uri| PlayOffset { uri: uri.clone() });
        PlayBody {
            context_uri: Some(context.to_string()),
            offset,
            uris: None,
        }
    } else if !uris.is_empty() {
        PlayBody {
            context_uri: None,
            offset: None,
            uris: Some(uris.iter().take(MAX_PLAY_URIS).cloned().collect()),
        }
    } else {
        // Resume in place.
        PlayBody {
            context_uri: None,
            offset: None,
            uris: None,
        }
    }
}

fn is_track_uri(uri: &str) -> bool {
    match uri.strip_prefix("spotify:track:") {
        Some(id) => !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()),
        None => false,
    }
}

fn dedup_history(items: Vec<PlayHistory>) -> Vec<PlayHistory> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|entry| {
            let key = entry
                .track
                .id
                .clone()
                .unwrap_or_else(|| entry.track.uri.clone());
            seen.insert(key)
        })
        .collect()
}
