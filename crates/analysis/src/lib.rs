use corsa_model::*;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// First item (in array order) with a live location, or `current` when none has one.
pub fn map_center<T: Located>(items: &[T], current: LatLng) -> LatLng {
    items
        .iter()
        .find_map(Located::live_location)
        .unwrap_or(current)
}

/// Aggregates per segment, sorted by segment id.
pub fn segment_stats(efforts: &[SegmentEffort]) -> Vec<SegmentStats> {
    let mut by_segment: BTreeMap<&str, Vec<&SegmentEffort>> = BTreeMap::new();
    for e in efforts {
        by_segment.entry(e.segment_id.as_str()).or_default().push(e);
    }

    by_segment
        .into_iter()
        .map(|(segment_id, es)| {
            let athletes: HashSet<&str> = es.iter().map(|e| e.user_id.as_str()).collect();
            let times: Vec<u64> = es.iter().filter_map(|e| e.elapsed_time).collect();
            let average_elapsed_time = if times.is_empty() {
                None
            } else {
                Some(times.iter().sum::<u64>() as f64 / times.len() as f64)
            };
            SegmentStats {
                segment_id: segment_id.to_string(),
                total_efforts: es.len(),
                unique_athletes: athletes.len(),
                total_completions: es.iter().map(|e| completions(e)).sum(),
                total_distance: es.iter().filter_map(|e| e.distance).sum(),
                best_elapsed_time: times.iter().copied().min(),
                average_elapsed_time,
            }
        })
        .collect()
}

/// Burrito League standings for one segment: most completions first, then
/// fastest single effort, then user id.
pub fn leaderboard(efforts: &[SegmentEffort], segment_id: &str) -> Vec<UserSegmentStats> {
    let mut by_user: BTreeMap<&str, UserSegmentStats> = BTreeMap::new();
    for e in efforts.iter().filter(|e| e.segment_id == segment_id) {
        let row = by_user.entry(e.user_id.as_str()).or_insert_with(|| UserSegmentStats {
            segment_id: segment_id.to_string(),
            user_id: e.user_id.clone(),
            rank: 0,
            efforts: 0,
            completions: 0,
            total_distance: 0.0,
            best_elapsed_time: None,
            best_activity_id: None,
        });
        row.efforts += 1;
        row.completions += completions(e);
        row.total_distance += e.distance.unwrap_or(0.0);
        if let Some(t) = e.elapsed_time {
            if row.best_elapsed_time.map_or(true, |best| t < best) {
                row.best_elapsed_time = Some(t);
                row.best_activity_id = Some(e.activity_id.clone());
            }
        }
    }

    let mut rows: Vec<UserSegmentStats> = by_user.into_values().collect();
    rows.sort_by(|a, b| {
        b.completions
            .cmp(&a.completions)
            .then_with(|| faster(a.best_elapsed_time, b.best_elapsed_time))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    for (i, r) in rows.iter_mut().enumerate() {
        r.rank = (i + 1) as u32;
    }
    rows
}

pub fn leaderboard_summary(rows: &[UserSegmentStats]) -> Value {
    let leader = rows.first();
    json!({
        "athletes": rows.len(),
        "total_completions": rows.iter().map(|r| r.completions).sum::<u64>(),
        "total_distance": rows.iter().map(|r| r.total_distance).sum::<f64>(),
        "leader": leader.map(|r| r.user_id.clone()),
        "leader_completions": leader.map(|r| r.completions),
        "fastest_elapsed": rows.iter().filter_map(|r| r.best_elapsed_time).min(),
    })
}

// a row without a count is still one completion
fn completions(e: &SegmentEffort) -> u64 {
    e.segment_completions.map(u64::from).unwrap_or(1)
}

fn faster(a: Option<u64>, b: Option<u64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(id: &str, live: bool, loc: Option<(f64, f64)>) -> LiveStream {
        LiveStream {
            stream_id: id.into(),
            live,
            current_location: loc.map(|(lat, lng)| LatLng::new(lat, lng)),
            ..Default::default()
        }
    }

    fn effort(segment: &str, user: &str, activity: &str, elapsed: Option<u64>, done: Option<u32>) -> SegmentEffort {
        SegmentEffort {
            segment_id: segment.into(),
            user_id: user.into(),
            activity_id: activity.into(),
            elapsed_time: elapsed,
            segment_completions: done,
            distance: Some(1.5),
            ..Default::default()
        }
    }

    #[test]
    fn center_unchanged_without_live_location() {
        let prev = LatLng::new(39.7, -104.9);
        let streams = vec![
            stream("a", false, Some((1.0, 1.0))),
            stream("b", true, None),
        ];
        assert_eq!(map_center(&streams, prev), prev);
        assert_eq!(map_center::<LiveStream>(&[], prev), prev);
    }

    #[test]
    fn center_takes_first_live_in_array_order() {
        let streams = vec![
            stream("idle", false, Some((9.0, 9.0))),
            stream("first", true, Some((1.0, 2.0))),
            stream("second", true, Some((3.0, 4.0))),
        ];
        assert_eq!(map_center(&streams, LatLng::default()), LatLng::new(1.0, 2.0));
    }

    #[test]
    fn center_works_over_groups() {
        let groups = vec![TrackerGroup {
            group_id: "g".into(),
            livestreams: vec![stream("a", true, Some((5.0, 6.0)))],
            ..Default::default()
        }];
        assert_eq!(map_center(&groups, LatLng::default()), LatLng::new(5.0, 6.0));
    }

    #[test]
    fn leaderboard_ranks_by_completions_then_time() {
        let efforts = vec![
            effort("101", "U1", "A1", Some(1800), Some(2)),
            effort("101", "U2", "A2", Some(1700), Some(2)),
            effort("101", "U3", "A3", Some(1600), Some(2)),
            effort("101", "U1", "A4", Some(1750), Some(1)),
            effort("999", "U9", "A9", Some(100), Some(10)),
        ];
        let rows = leaderboard(&efforts, "101");
        let order: Vec<&str> = rows.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(order, vec!["U1", "U3", "U2"]);
        assert_eq!(rows[0].completions, 3);
        assert_eq!(rows[0].efforts, 2);
        assert_eq!(rows[0].best_elapsed_time, Some(1750));
        assert_eq!(rows[0].best_activity_id.as_deref(), Some("A4"));
        assert_eq!(rows[1].rank, 2);
        assert_eq!(rows[2].rank, 3);
    }

    #[test]
    fn missing_times_sort_last() {
        let efforts = vec![
            effort("1", "slow", "A1", None, Some(1)),
            effort("1", "fast", "A2", Some(10), Some(1)),
        ];
        let rows = leaderboard(&efforts, "1");
        assert_eq!(rows[0].user_id, "fast");
        assert_eq!(rows[1].best_elapsed_time, None);
    }

    #[test]
    fn segment_stats_per_segment() {
        let efforts = vec![
            effort("b", "U1", "A1", Some(100), Some(2)),
            effort("a", "U1", "A2", Some(300), None),
            effort("a", "U2", "A3", Some(100), Some(1)),
        ];
        let stats = segment_stats(&efforts);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].segment_id, "a");
        assert_eq!(stats[0].total_efforts, 2);
        assert_eq!(stats[0].unique_athletes, 2);
        assert_eq!(stats[0].total_completions, 2);
        assert_eq!(stats[0].best_elapsed_time, Some(100));
        assert_eq!(stats[0].average_elapsed_time, Some(200.0));
        assert_eq!(stats[1].total_completions, 2);
    }

    #[test]
    fn summary_names_leader() {
        let rows = leaderboard(&[effort("1", "U1", "A1", Some(50), Some(4))], "1");
        let s = leaderboard_summary(&rows);
        assert_eq!(s["leader"], "U1");
        assert_eq!(s["leader_completions"], 4);
        assert_eq!(s["fastest_elapsed"], 50);
        assert!(leaderboard_summary(&[])["leader"].is_null());
    }
}
