// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Movie value object and its remote favorite document.

use serde::{Deserialize, Serialize};

/// Sentinel rating meaning "the provider did not rate this movie".
pub const UNKNOWN_RATING: f64 = -1.0;

fn unknown_rating() -> f64 {
    UNKNOWN_RATING
}

/// Movie as returned by a movie provider. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    /// Provider-assigned id (unique within the provider namespace)
    pub id: String,
    pub title: String,
    /// Poster URI
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub plot: String,
    /// Rating, or `UNKNOWN_RATING`
    #[serde(default = "unknown_rating")]
    pub rating: f64,
    #[serde(default)]
    pub release_date: String,
}

impl Movie {
    /// Minimal movie with unknown rating and no metadata.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            image: None,
            plot: String::new(),
            rating: UNKNOWN_RATING,
            release_date: String::new(),
        }
    }

    pub fn has_rating(&self) -> bool {
        self.rating >= 0.0
    }
}

/// Favorite document stored at `favorites/{userId}/movies/{movieId}`.
///
/// Field names match documents written by the mobile clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteDocument {
    #[serde(rename = "movieId")]
    pub movie_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    #[serde(rename = "releaseDate", default)]
    pub release_date: String,
    #[serde(default)]
    pub plot: String,
    #[serde(default = "unknown_rating")]
    pub rating: f64,
}

impl From<&Movie> for FavoriteDocument {
    fn from(movie: &Movie) -> Self {
        Self {
            movie_id: movie.id.clone(),
            title: movie.title.clone(),
            image_url: movie.image.clone(),
            release_date: movie.release_date.clone(),
            plot: movie.plot.clone(),
            rating: movie.rating,
        }
    }
}

impl From<FavoriteDocument> for Movie {
    fn from(doc: FavoriteDocument) -> Self {
        Self {
            id: doc.movie_id,
            title: doc.title,
            image: doc.image_url,
            plot: doc.plot,
            rating: doc.rating,
            release_date: doc.release_date,
        }
    }
}
