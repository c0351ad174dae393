// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Music-video lookup via the YouTube Data API.
//!
//! Optional feature: without an API key every lookup resolves to `None`
//! and the frontend simply hides the video tab.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoResult {
    pub video_id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub url: String,
}

#[derive(Clone)]
pub struct VideoClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl VideoClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Search for "<query> official video" and return the first hit.
    pub async fn find_video(&self, query: &str) -> Result<Option<VideoResult>, AppError> {
        let Some(key) = self.api_key.as_deref() else {
            tracing::debug!("No YouTube API key configured, skipping video lookup");
            return Ok(None);
        };

        let q = format!("{} official video", query);
        let response = self
            .http
            .get(format!("{}/search", YOUTUBE_API_URL))
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", "1"),
                ("q", q.as_str()),
                ("key", key),
            ])
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable {
                status: None,
                body: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamUnavailable {
                status: Some(status.as_u16()),
                body,
            });
        }

        let results: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::UpstreamUnavailable {
                    status: None,
                    body: format!("JSON decode error: {}", e),
                })?;

        Ok(results.items.into_iter().find_map(|item| {
            let video_id = item.id.video_id?;
            let snippet = item.snippet?;
            let thumbnail = snippet
                .thumbnails
                .and_then(|t| t.high.or(t.default_thumb))
                .map(|t| t.url);
            Some(VideoResult {
                url: format!("https://www.youtube.com/watch?v={}", video_id),
                video_id,
                title: snippet.title,
                thumbnail,
            })
        }))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: VideoId,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
struct VideoId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    #[serde(rename = "default")]
    default_thumb: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}
