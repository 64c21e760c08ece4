//! Query documents for every view. Documents are fixed text; route values are
//! bound through `$variables` only.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use corsa_model::{LiveStream, Segment, TrackerGroup, User};

use crate::{run, FetchError, GraphQlRequest, Operation, Transport};

/// AppSync list envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub items: Option<Vec<T>>,
    pub next_token: Option<String>,
}

impl<T> Connection<T> {
    pub fn into_items(self) -> Vec<T> {
        self.items.unwrap_or_default()
    }
}

pub const DEFAULT_LIST_LIMIT: u32 = 100;

macro_rules! stream_summary {
    () => {
        "streamId title username profilePicture live currentLocation { lat lng } slug mileMarker startTime finishTime"
    };
}

macro_rules! stream_detail {
    () => {
        concat!(
            stream_summary!(),
            " fullRouteData routeGpxUrl",
            " waypoints { name location { lat lng } mileMarker }",
            " chatMessages { username message createdAt }"
        )
    };
}

pub const LIST_LIVE_STREAMS: &str = concat!(
    "query ListLiveStreams($limit: Int, $nextToken: String) { ",
    "listLiveStreams(limit: $limit, nextToken: $nextToken) { items { ",
    stream_summary!(),
    " } nextToken } }"
);

pub const LIST_TRACKER_GROUPS: &str = concat!(
    "query ListTrackerGroups($limit: Int, $nextToken: String) { ",
    "listTrackerGroups(limit: $limit, nextToken: $nextToken) { items { ",
    "groupId name currentLocation { lat lng } user livestreams { ",
    stream_summary!(),
    " } } nextToken } }"
);

pub const GET_LIVE_STREAM: &str = concat!(
    "query GetLiveStream($streamId: ID!) { getLiveStream(streamId: $streamId) { ",
    stream_detail!(),
    " } }"
);

pub const GET_USER: &str = "query GetUser($username: String!) { getUser(username: $username) { \
    username userId bio profilePicture live posts { postId streamId title createdAt } } }";

pub const GET_SEGMENT: &str = "query GetSegment($segmentId: ID!) { getSegment(segmentId: $segmentId) { \
    segmentId title description city state country location { lat lng } link } }";

pub const LIST_SEGMENTS: &str = "query ListSegments($limit: Int, $nextToken: String) { \
    listSegments(limit: $limit, nextToken: $nextToken) { items { \
    segmentId title description city state country location { lat lng } link } nextToken } }";

pub fn list_live_streams(limit: u32, next_token: Option<&str>) -> Operation<Connection<LiveStream>> {
    Operation::new(
        page(GraphQlRequest::new(LIST_LIVE_STREAMS), limit, next_token),
        "listLiveStreams",
    )
}

pub fn list_tracker_groups(limit: u32, next_token: Option<&str>) -> Operation<Connection<TrackerGroup>> {
    Operation::new(
        page(GraphQlRequest::new(LIST_TRACKER_GROUPS), limit, next_token),
        "listTrackerGroups",
    )
}

pub fn list_segments(limit: u32, next_token: Option<&str>) -> Operation<Connection<Segment>> {
    Operation::new(
        page(GraphQlRequest::new(LIST_SEGMENTS), limit, next_token),
        "listSegments",
    )
}

fn page(request: GraphQlRequest, limit: u32, next_token: Option<&str>) -> GraphQlRequest {
    let request = request.var("limit", limit);
    match next_token {
        Some(token) => request.var("nextToken", token),
        None => request,
    }
}

/// Follows `nextToken` until the list is exhausted. A repeated token ends the walk.
pub async fn collect_all<T, X, F>(transport: &X, list: F) -> Result<Vec<T>, FetchError>
where
    T: DeserializeOwned,
    X: Transport + ?Sized,
    F: Fn(Option<&str>) -> Operation<Connection<T>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let op = list(token.as_deref());
        let Some(conn) = run(transport, &op).await? else {
            break;
        };
        items.extend(conn.items.unwrap_or_default());
        match conn.next_token {
            Some(next) if token.as_deref() != Some(next.as_str()) => {
                debug!(field = op.field, fetched = items.len(), "following nextToken");
                token = Some(next);
            }
            _ => break,
        }
    }
    Ok(items)
}

pub fn get_live_stream(stream_id: &str) -> Operation<LiveStream> {
    Operation::new(
        GraphQlRequest::new(GET_LIVE_STREAM).var("streamId", stream_id),
        "getLiveStream",
    )
}

pub fn get_user(username: &str) -> Operation<User> {
    Operation::new(
        GraphQlRequest::new(GET_USER).var("username", username),
        "getUser",
    )
}

pub fn get_segment(segment_id: &str) -> Operation<Segment> {
    Operation::new(
        GraphQlRequest::new(GET_SEGMENT).var("segmentId", segment_id),
        "getSegment",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract;
    use serde_json::{json, Value};

    /// Two pages of streams, chained by `nextToken`.
    struct Paged;

    #[async_trait::async_trait]
    impl Transport for Paged {
        async fn execute(&self, request: &GraphQlRequest) -> Result<Value, FetchError> {
            let page = match request.variables.get("nextToken").and_then(Value::as_str) {
                None => json!({ "items": [{ "streamId": "a" }], "nextToken": "t2" }),
                Some("t2") => json!({ "items": [{ "streamId": "b" }], "nextToken": null }),
                Some(other) => return Err(FetchError::Transport(format!("bad token {other}"))),
            };
            Ok(json!({ "data": { "listLiveStreams": page } }))
        }
    }

    /// Always hands back the same token.
    struct Stuck;

    #[async_trait::async_trait]
    impl Transport for Stuck {
        async fn execute(&self, _request: &GraphQlRequest) -> Result<Value, FetchError> {
            Ok(json!({ "data": { "listLiveStreams": { "items": [{ "streamId": "x" }], "nextToken": "same" } } }))
        }
    }

    #[test]
    fn route_values_never_reach_query_text() {
        let hostile = "x\") { __schema { types { name } } } #";
        let op = get_user(hostile);
        assert_eq!(op.request.query, GET_USER);
        assert!(!op.request.query.contains("__schema"));
        assert_eq!(op.request.variables["username"], hostile);
    }

    #[test]
    fn documents_declare_their_variables() {
        assert!(GET_LIVE_STREAM.contains("$streamId: ID!"));
        assert!(GET_LIVE_STREAM.contains("chatMessages { username message createdAt }"));
        assert!(LIST_TRACKER_GROUPS.contains("livestreams { streamId"));
        assert_eq!(get_segment("101").request.variables["segmentId"], "101");
        assert_eq!(list_live_streams(25, None).request.variables["limit"], 25);
        assert!(list_live_streams(25, None).request.variables.get("nextToken").is_none());
        assert_eq!(list_segments(10, Some("t2")).request.variables["nextToken"], "t2");
    }

    #[test]
    fn connection_tolerates_null_items() {
        let c: Option<Connection<LiveStream>> = extract(
            json!({ "data": { "listLiveStreams": { "items": null, "nextToken": null } } }),
            "listLiveStreams",
        )
        .unwrap();
        assert!(c.unwrap().into_items().is_empty());
    }

    #[test]
    fn connection_decodes_streams() {
        let c: Option<Connection<LiveStream>> = extract(
            json!({ "data": { "listLiveStreams": { "items": [
                { "streamId": "s1", "live": true, "currentLocation": { "lat": 1.0, "lng": 2.0 } }
            ] } } }),
            "listLiveStreams",
        )
        .unwrap();
        let items = c.unwrap().into_items();
        assert_eq!(items.len(), 1);
        assert!(items[0].live);
    }

    #[tokio::test]
    async fn collect_all_follows_next_token() {
        let streams = collect_all(&Paged, |tok| list_live_streams(1, tok)).await.unwrap();
        let ids: Vec<&str> = streams.iter().map(|s| s.stream_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn collect_all_stops_on_repeated_token() {
        let streams = collect_all(&Stuck, |tok| list_live_streams(1, tok)).await.unwrap();
        assert_eq!(streams.len(), 2);
    }
}
