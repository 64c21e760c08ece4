//! Response shapes of the CORSA AppSync API plus the effort records imported from CSV.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Anything that can put a pin on the live map.
pub trait Located {
    fn live_location(&self) -> Option<LatLng>;
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LiveStream {
    pub stream_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub live: bool,
    #[serde(default)]
    pub current_location: Option<LatLng>,
    // opaque to the client; handed to the map as-is
    #[serde(default)]
    pub full_route_data: Option<serde_json::Value>,
    #[serde(default)]
    pub route_gpx_url: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub mile_marker: Option<f64>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub finish_time: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub waypoints: Vec<Waypoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chat_messages: Vec<ChatMessage>,
}

impl LiveStream {
    pub fn belongs_to(&self, username: &str) -> bool {
        self.username.as_deref() == Some(username)
    }
}

impl Located for LiveStream {
    fn live_location(&self) -> Option<LatLng> {
        if self.live { self.current_location } else { None }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<LatLng>,
    #[serde(default)]
    pub mile_marker: Option<f64>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackerGroup {
    pub group_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub current_location: Option<LatLng>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub livestreams: Vec<LiveStream>,
}

impl TrackerGroup {
    pub fn is_live(&self) -> bool {
        self.livestreams.iter().any(|s| s.live)
    }
}

impl Located for TrackerGroup {
    fn live_location(&self) -> Option<LatLng> {
        self.livestreams
            .iter()
            .find_map(Located::live_location)
            .or_else(|| if self.is_live() { self.current_location } else { None })
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub segment_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub location: Option<LatLng>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub live: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub posts: Vec<Post>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub stream_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// One completion record of a segment, as exported from Strava.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SegmentEffort {
    pub segment_id: String,
    pub activity_id: String,
    pub activity_name: String,
    pub activity_type: String,
    pub created_at: String,
    pub distance: Option<f64>,
    pub elapsed_time: Option<u64>,
    pub moving_time: Option<u64>,
    pub segment_completions: Option<u32>,
    pub sport_type: String,
    pub start_date: String,
    pub start_date_local: String,
    pub user_id: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentStats {
    pub segment_id: String,
    pub total_efforts: usize,
    pub unique_athletes: usize,
    pub total_completions: u64,
    pub total_distance: f64,
    pub best_elapsed_time: Option<u64>,
    pub average_elapsed_time: Option<f64>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSegmentStats {
    pub segment_id: String,
    pub user_id: String,
    pub rank: u32,
    pub efforts: usize,
    pub completions: u64,
    pub total_distance: f64,
    pub best_elapsed_time: Option<u64>,
    pub best_activity_id: Option<String>,
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}
