// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed shapes for Spotify Web API resources.
//!
//! Only the fields the frontend consumes are modeled; everything else is
//! dropped at deserialization. Most fields are optional because Spotify
//! omits them freely depending on market, licensing, and endpoint.

use serde::{Deserialize, Serialize};

/// Standard offset-based page wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub total: Option<u64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub next: Option<String>,
}

/// Cursor-based page wrapper (recently played).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Followers {
    pub total: Option<u64>,
}

/// Slim artist reference embedded in tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: Option<String>,
    pub name: String,
    pub uri: Option<String>,
}

/// Slim album reference embedded in tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumRef {
    pub id: Option<String>,
    pub name: String,
    pub uri: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: Option<String>,
    pub name: String,
    pub uri: String,
    pub duration_ms: Option<u64>,
    pub explicit: Option<bool>,
    pub preview_url: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    pub album: Option<AlbumRef>,
}

/// Full artist object (browse/artist pages).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub uri: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    pub followers: Option<Followers>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    pub followers: Option<Followers>,
}

/// The authenticated user's own profile (`GET /me`). Includes the
/// account's country, which drives market-scoped browse queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Track count stub inside playlist listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackCount {
    pub total: Option<u64>,
}

/// Playlist as it appears in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub uri: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    pub owner: Option<PublicUser>,
    pub tracks: Option<TrackCount>,
}

/// Full playlist with its track page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub uri: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    pub owner: Option<PublicUser>,
    pub tracks: Paging<PlaylistTrack>,
}

/// Entry in a playlist's track page. `track` is null for removed or
/// region-locked entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistTrack {
    pub added_at: Option<String>,
    pub track: Option<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTrack {
    pub added_at: Option<String>,
    pub track: Track,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub tracks: Option<Paging<Track>>,
    pub artists: Option<Paging<Artist>>,
    pub playlists: Option<Paging<PlaylistSummary>>,
}

/// Playlist-only search response (featured playlists query).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSearchResults {
    pub playlists: Paging<PlaylistSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: Option<String>,
    pub volume_percent: Option<u32>,
}

/// Raw playback state from `GET /me/player/currently-playing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentlyPlaying {
    pub item: Option<Track>,
    pub is_playing: Option<bool>,
    pub progress_ms: Option<u64>,
    pub device: Option<Device>,
}

/// Reshaped now-playing view the frontend polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlaying {
    pub item: Track,
    pub is_playing: bool,
    pub device_id: Option<String>,
    pub progress_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayHistory {
    pub track: Track,
    pub played_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Queue {
    pub currently_playing: Option<Track>,
    #[serde(default)]
    pub queue: Vec<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icons: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Paging<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPlaylistsResponse {
    pub playlists: Paging<PlaylistSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistTopTracksResponse {
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Body for `PUT /me/player/play`. Exactly one of the two mutually
/// exclusive shapes is sent: a context (playlist/album) with an optional
/// track offset, or a bare list of track URIs. All fields absent means
/// resume-in-place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<PlayOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayOffset {
    pub uri: String,
}

/// Response from the accounts-service token endpoint (both the
/// authorization-code exchange and `grant_type=refresh_token`).
/// `refresh_token` is only present when the upstream rotates it.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
}
