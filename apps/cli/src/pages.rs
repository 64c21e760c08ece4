//! One loader per route. Each fetches once; a failed or empty fetch is logged
//! and rendered as the page's not-found state instead of an error.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use analysis as an;
use corsa_sync_core::{queries, run, FetchError, Transport};
use model::*;

use crate::session::Preferences;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", content = "page", rename_all = "snake_case")]
pub enum Page<T> {
    Ready(T),
    NotFound(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HomeView {
    pub streams: Vec<LiveStream>,
    pub groups: Vec<TrackerGroup>,
    pub center: LatLng,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamView {
    pub stream: LiveStream,
    pub center: LatLng,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileView {
    pub user: User,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LeagueView {
    pub segment: Segment,
    pub leaderboard: Vec<UserSegmentStats>,
    pub summary: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LoginView {
    pub segment: Segment,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PreferencesView {
    pub username: String,
    pub preferences: Preferences,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StaticView {
    pub title: &'static str,
    pub body: &'static str,
}

pub const PRIVACY: StaticView = StaticView {
    title: "Privacy",
    body: "Your live location is shared only while a stream is live. \
           Finished streams keep their route; turn off location sharing in account preferences.",
};

pub const SUPPORT: StaticView = StaticView {
    title: "Support",
    body: "Questions or problems with tracking or the Burrito League? Reach the team through the app's feedback form.",
};

/// Every stream and group, both lists paged concurrently.
pub async fn fetch_home<X: Transport + ?Sized>(
    t: &X,
) -> Result<(Vec<LiveStream>, Vec<TrackerGroup>), FetchError> {
    use queries::{collect_all, list_live_streams, list_tracker_groups, DEFAULT_LIST_LIMIT};
    tokio::try_join!(
        collect_all(t, |tok| list_live_streams(DEFAULT_LIST_LIMIT, tok)),
        collect_all(t, |tok| list_tracker_groups(DEFAULT_LIST_LIMIT, tok)),
    )
}

pub async fn load_home<X: Transport + ?Sized>(t: &X, center: LatLng) -> HomeView {
    let (streams, groups) = fetch_home(t).await.unwrap_or_else(|e| {
        warn!(error = %e, "home fetch failed, showing empty map");
        (Vec::new(), Vec::new())
    });
    let center = an::map_center(&streams, an::map_center(&groups, center));
    HomeView { streams, groups, center }
}

/// `/live/{username}/{id}` and `/profile/{username}/{id}`: the stream must belong to `username`.
pub async fn load_stream<X: Transport + ?Sized>(
    t: &X,
    username: &str,
    stream_id: &str,
    center: LatLng,
) -> Page<StreamView> {
    let found = settle(run(t, &queries::get_live_stream(stream_id)).await, "stream", stream_id);
    match found {
        Some(stream) if stream.belongs_to(username) => {
            let center = stream.live_location().unwrap_or(center);
            Page::Ready(StreamView { stream, center })
        }
        Some(_) => {
            warn!(username, stream_id, "stream belongs to someone else");
            Page::NotFound("Stream not found".into())
        }
        None => Page::NotFound("Stream not found".into()),
    }
}

pub async fn load_profile<X: Transport + ?Sized>(t: &X, username: &str) -> Page<ProfileView> {
    match settle(run(t, &queries::get_user(username)).await, "user", username) {
        Some(user) => Page::Ready(ProfileView { user }),
        None => Page::NotFound("User not found".into()),
    }
}

/// Leaderboard comes from imported efforts; the API only knows the course.
pub async fn load_league<X: Transport + ?Sized>(
    t: &X,
    segment_id: &str,
    efforts: &[SegmentEffort],
) -> Page<LeagueView> {
    match settle(run(t, &queries::get_segment(segment_id)).await, "segment", segment_id) {
        Some(segment) => {
            let leaderboard = an::leaderboard(efforts, segment_id);
            let summary = an::leaderboard_summary(&leaderboard);
            Page::Ready(LeagueView { segment, leaderboard, summary })
        }
        None => Page::NotFound("Segment not found".into()),
    }
}

pub async fn load_league_login<X: Transport + ?Sized>(t: &X, segment_id: &str) -> Page<LoginView> {
    match settle(run(t, &queries::get_segment(segment_id)).await, "segment", segment_id) {
        Some(segment) => {
            let title = segment.title.clone().unwrap_or_else(|| segment_id.to_string());
            Page::Ready(LoginView {
                message: format!("Connect Strava to enter {title} in the Burrito League."),
                segment,
            })
        }
        None => Page::NotFound("Segment not found".into()),
    }
}

pub async fn load_preferences<X: Transport + ?Sized>(
    t: &X,
    username: &str,
    preferences: Preferences,
) -> Page<PreferencesView> {
    match settle(run(t, &queries::get_user(username)).await, "user", username) {
        Some(user) => Page::Ready(PreferencesView { username: user.username, preferences }),
        None => Page::NotFound("User not found".into()),
    }
}

fn settle<T>(res: Result<Option<T>, FetchError>, entity: &'static str, key: &str) -> Option<T> {
    match res {
        Ok(found) => found,
        Err(e) => {
            warn!(entity, key, error = %e, "fetch failed, rendering not-found");
            None
        }
    }
}
