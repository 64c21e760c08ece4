use anyhow::{Context, Result};
use corsa_model::*;
use serde::Deserialize;
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Read, Write},
    path::Path,
};
use tracing::debug;

/// Column names of a Strava segment-effort export, in export order.
pub const EFFORT_COLUMNS: [&str; 13] = [
    "SegmentId", "ActivityId", "ActivityName", "ActivityType", "CreatedAt",
    "Distance", "ElapsedTime", "MovingTime", "SegmentCompletions",
    "SportType", "StartDate", "StartDateLocal", "UserId",
];

pub fn import_segment_efforts(path: &Path) -> Result<Vec<SegmentEffort>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_segment_efforts(f)
}

pub fn parse_segment_efforts(text: &str) -> Result<Vec<SegmentEffort>> {
    read_segment_efforts(text.as_bytes())
}

/// Reads an effort export keyed by header name, so column order does not matter.
/// Short rows are padded with empty values; blank lines are skipped.
pub fn read_segment_efforts<R: Read>(rdr: R) -> Result<Vec<SegmentEffort>> {
    let mut lines = BufReader::new(rdr).lines().enumerate();
    let headers = loop {
        let Some((_, line)) = lines.next() else {
            return Ok(Vec::new());
        };
        let line = line.context("read effort header row")?;
        if !line.trim().is_empty() {
            let names: Vec<String> = split_line(&line).iter().map(|h| h.trim().to_string()).collect();
            break csv::StringRecord::from(names);
        }
    };

    let mut efforts = Vec::new();
    for (i, line) in lines {
        let line = line.with_context(|| format!("read effort line {}", i + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let mut rec = csv::StringRecord::from(split_line(&line));
        rec.truncate(headers.len());
        while rec.len() < headers.len() {
            rec.push_field("");
        }
        let r: EffortRow = rec
            .deserialize(Some(&headers))
            .with_context(|| format!("effort line {}", i + 1))?;
        efforts.push(r.into_effort());
    }
    debug!(count = efforts.len(), "parsed segment efforts");
    Ok(efforts)
}

/// Splits one line on commas outside quotes. Every `"` flips the quoted state
/// and is dropped, so `""` is not an escaped quote.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

pub fn export_leaderboard_csv(rows: &[UserSegmentStats], path: &Path) -> Result<()> {
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_leaderboard_csv(rows, f)
}

pub fn write_leaderboard_csv<W: Write>(rows: &[UserSegmentStats], out: W) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    for r in rows {
        w.serialize(r)?;
    }
    w.flush()?;
    Ok(())
}

pub fn import_ndjson(path: &Path) -> Result<Vec<SegmentEffort>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = BufReader::new(f);
    let mut efforts = vec![];
    for line in rdr.lines() {
        let s = line?;
        if s.trim().is_empty() { continue; }
        efforts.push(serde_json::from_str(&s)?);
    }
    Ok(efforts)
}

pub fn export_ndjson(efforts: &[SegmentEffort], path: &Path) -> Result<()> {
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    for e in efforts {
        let s = serde_json::to_string(e)?;
        writeln!(w, "{}", s)?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct EffortRow {
    #[serde(rename = "SegmentId")] segment_id: String,
    #[serde(rename = "ActivityId")] activity_id: String,
    #[serde(rename = "ActivityName")] activity_name: String,
    #[serde(rename = "ActivityType")] activity_type: String,
    #[serde(rename = "CreatedAt")] created_at: String,
    #[serde(rename = "Distance")] distance: String,
    #[serde(rename = "ElapsedTime")] elapsed_time: String,
    #[serde(rename = "MovingTime")] moving_time: String,
    #[serde(rename = "SegmentCompletions")] segment_completions: String,
    #[serde(rename = "SportType")] sport_type: String,
    #[serde(rename = "StartDate")] start_date: String,
    #[serde(rename = "StartDateLocal")] start_date_local: String,
    #[serde(rename = "UserId")] user_id: String,
}

impl EffortRow {
    fn into_effort(self) -> SegmentEffort {
        SegmentEffort {
            distance: number(&self.distance, "Distance"),
            elapsed_time: count(&self.elapsed_time, "ElapsedTime"),
            moving_time: count(&self.moving_time, "MovingTime"),
            segment_completions: count(&self.segment_completions, "SegmentCompletions")
                .and_then(|n| u32::try_from(n).ok()),
            segment_id: self.segment_id,
            activity_id: self.activity_id,
            activity_name: self.activity_name,
            activity_type: self.activity_type,
            created_at: self.created_at,
            sport_type: self.sport_type,
            start_date: self.start_date,
            start_date_local: self.start_date_local,
            user_id: self.user_id,
        }
    }
}

fn number(raw: &str, column: &str) -> Option<f64> {
    let v = raw.trim();
    if v.is_empty() {
        return None;
    }
    match v.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            debug!(column, value = v, "non-numeric effort value");
            None
        }
    }
}

// Strava sometimes writes whole seconds as "1800.0"
fn count(raw: &str, column: &str) -> Option<u64> {
    let v = raw.trim();
    if let Ok(n) = v.parse::<u64>() {
        return Some(n);
    }
    number(v, column).filter(|n| *n >= 0.0).map(|n| n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "SegmentId,ActivityId,ActivityName,ActivityType,CreatedAt,Distance,ElapsedTime,MovingTime,SegmentCompletions,SportType,StartDate,StartDateLocal,UserId";

    #[test]
    fn parses_quoted_example_row() {
        let text = format!(
            "{}\n\"101\",\"A1\",\"Morning Run\",\"Run\",\"2024-01-01\",\"5.2\",\"1800\",\"1750\",\"3\",\"Run\",\"2024-01-01\",\"2024-01-01T08:00:00\",\"U1\"\n",
            HEADER
        );
        let efforts = parse_segment_efforts(&text).unwrap();
        assert_eq!(efforts.len(), 1);
        let e = &efforts[0];
        assert_eq!(e.segment_id, "101");
        assert_eq!(e.activity_id, "A1");
        assert_eq!(e.activity_name, "Morning Run");
        assert_eq!(e.distance, Some(5.2));
        assert_eq!(e.elapsed_time, Some(1800));
        assert_eq!(e.moving_time, Some(1750));
        assert_eq!(e.segment_completions, Some(3));
        assert_eq!(e.start_date_local, "2024-01-01T08:00:00");
        assert_eq!(e.user_id, "U1");
    }

    #[test]
    fn quoted_comma_stays_in_one_field() {
        let text = format!("{}\n102,A2,\"1,234\",Ride,,10,600,590,1,Ride,,,U2\n", HEADER);
        let efforts = parse_segment_efforts(&text).unwrap();
        assert_eq!(efforts[0].activity_name, "1,234");
        assert_eq!(efforts[0].activity_type, "Ride");
        assert_eq!(efforts[0].user_id, "U2");
    }

    #[test]
    fn returns_one_record_per_data_row() {
        let mut text = String::from(HEADER);
        for i in 0..5 {
            text.push_str(&format!("\n1,A{i},Run {i},Run,,1.0,60,60,1,Run,,,U{i}"));
        }
        text.push('\n');
        assert_eq!(parse_segment_efforts(&text).unwrap().len(), 5);
    }

    #[test]
    fn column_order_does_not_matter() {
        let text = "UserId, SegmentId, ElapsedTime, ActivityId\nU9,77,42,A9\n";
        let efforts = parse_segment_efforts(text).unwrap();
        assert_eq!(efforts[0].user_id, "U9");
        assert_eq!(efforts[0].segment_id, "77");
        assert_eq!(efforts[0].elapsed_time, Some(42));
        assert_eq!(efforts[0].activity_id, "A9");
        assert_eq!(efforts[0].distance, None);
    }

    #[test]
    fn short_rows_and_bad_numbers_become_none() {
        let text = format!("{}\n103,A3,Walk,Walk,,abc\n", HEADER);
        let efforts = parse_segment_efforts(&text).unwrap();
        let e = &efforts[0];
        assert_eq!(e.distance, None);
        assert_eq!(e.elapsed_time, None);
        assert_eq!(e.segment_completions, None);
        assert_eq!(e.user_id, "");
    }

    #[test]
    fn every_quote_toggles_and_is_dropped() {
        let text = "SegmentId,ActivityName,UserId\n1,\"a\"\"b\",U1\n2,ab\"c,d\"e,U2\n";
        let efforts = parse_segment_efforts(text).unwrap();
        assert_eq!(efforts.len(), 2);
        assert_eq!(efforts[0].activity_name, "ab");
        assert_eq!(efforts[0].user_id, "U1");
        assert_eq!(efforts[1].segment_id, "2");
        assert_eq!(efforts[1].activity_name, "abc,de");
        assert_eq!(efforts[1].user_id, "U2");
    }

    #[test]
    fn blank_lines_and_crlf_are_tolerated() {
        let text = "\r\nSegmentId,UserId\r\n1,U1\r\n\r\n2,U2\r\n";
        let efforts = parse_segment_efforts(text).unwrap();
        let users: Vec<&str> = efforts.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(users, vec!["U1", "U2"]);
        assert!(parse_segment_efforts("").unwrap().is_empty());
    }

    #[test]
    fn fractional_seconds_truncate() {
        let text = "SegmentId,ElapsedTime\n1,1800.0\n";
        assert_eq!(parse_segment_efforts(text).unwrap()[0].elapsed_time, Some(1800));
    }

    #[test]
    fn leaderboard_csv_has_header_and_rows() {
        let rows = vec![UserSegmentStats {
            segment_id: "101".into(),
            user_id: "U1".into(),
            rank: 1,
            efforts: 2,
            completions: 5,
            total_distance: 10.4,
            best_elapsed_time: Some(1700),
            best_activity_id: Some("A1".into()),
        }];
        let mut buf = Vec::new();
        write_leaderboard_csv(&rows, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let mut lines = out.lines();
        assert!(lines.next().unwrap().starts_with("segmentId,userId,rank"));
        assert_eq!(lines.next().unwrap(), "101,U1,1,2,5,10.4,1700,A1");
    }

    #[test]
    fn ndjson_file_round_trip() {
        let path = std::env::temp_dir().join(format!("corsa-efforts-{}.ndjson", std::process::id()));
        let efforts = vec![SegmentEffort {
            segment_id: "1".into(),
            user_id: "U1".into(),
            distance: Some(3.0),
            ..Default::default()
        }];
        export_ndjson(&efforts, &path).unwrap();
        let back = import_ndjson(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back, efforts);
    }
}
