use anyhow::{bail, Context as _, Result};
use serde_json::{json, Value};
use std::{path::Path, sync::Arc};
use tracing::info;

use analysis as an;
use model::{LiveStream, TrackerGroup};
use corsa_sync_core::{AppSyncConfig, Transport};
use corsa_sync_http::AppSyncClient;
use corsa_sync_poll::spawn_poller;

use crate::pages::{self, PRIVACY, SUPPORT};
use crate::route::Route;
use crate::session::{AppSession, Preferences, Theme, Units};

/// Everything a page needs to talk to AppSync.
pub struct Context {
    pub config: AppSyncConfig,
    pub transport: Arc<dyn Transport>,
    pub session: Arc<AppSession>,
}

impl Context {
    pub fn from_env(preferences: Preferences) -> Result<Self> {
        let config = AppSyncConfig::from_env().context("AppSync is not configured")?;
        let transport: Arc<dyn Transport> = Arc::new(AppSyncClient::new(&config)?);
        let session = Arc::new(AppSession::new(config.default_center, preferences));
        Ok(Self { config, transport, session })
    }
}

/// Renders the page at `path`. Static pages never touch the network.
pub async fn open(path: &str, preferences: Preferences, efforts_csv: Option<&Path>) -> Result<Value> {
    let route = Route::parse(path)?;
    if route.is_static() {
        return static_page(&route);
    }

    let ctx = Context::from_env(preferences)?;
    let t = &*ctx.transport;
    let center = ctx.config.default_center;
    info!(%route, "loading page");

    let rendered = match &route {
        Route::Home => serde_json::to_value(pages::load_home(t, center).await)?,
        Route::Live { username, stream_id } | Route::ProfileStream { username, stream_id } => {
            serde_json::to_value(pages::load_stream(t, username, stream_id, center).await)?
        }
        Route::Profile { username } => serde_json::to_value(pages::load_profile(t, username).await)?,
        Route::League { segment_id } => {
            let efforts = match efforts_csv {
                Some(p) => iox::import_segment_efforts(p)?,
                None => Vec::new(),
            };
            serde_json::to_value(pages::load_league(t, segment_id, &efforts).await)?
        }
        Route::LeagueLogin { segment_id } => {
            serde_json::to_value(pages::load_league_login(t, segment_id).await)?
        }
        Route::Preferences { username } => {
            let prefs = ctx.session.preferences();
            serde_json::to_value(pages::load_preferences(t, username, prefs).await)?
        }
        Route::Privacy | Route::Support => static_page(&route)?,
    };
    Ok(rendered)
}

fn static_page(route: &Route) -> Result<Value> {
    let page = if *route == Route::Privacy { PRIVACY } else { SUPPORT };
    Ok(serde_json::to_value(page)?)
}

/// Keeps the home map current until Ctrl+C.
pub async fn watch(preferences: Preferences) -> Result<()> {
    let ctx = Context::from_env(preferences)?;
    let transport = ctx.transport.clone();
    let session = ctx.session.clone();

    let handle = spawn_poller(
        ctx.config.poll_interval,
        move || {
            let t = transport.clone();
            async move { pages::fetch_home(&*t).await }
        },
        move |(streams, groups): (Vec<LiveStream>, Vec<TrackerGroup>)| {
            let moved = session.apply_home(streams, groups);
            let view = session.view();
            info!(
                streams = view.streams.len(),
                live = view.live_count(),
                groups = view.groups.len(),
                lat = view.center.lat,
                lng = view.center.lng,
                moved,
                "map refreshed"
            );
        },
    );

    tokio::signal::ctrl_c().await.context("install Ctrl+C handler")?;
    info!("shutting down");
    handle.shutdown().await;
    Ok(())
}

/// Offline Burrito League standings from a Strava effort export.
pub fn league(csv: &Path, segment: Option<&str>, out: Option<&Path>) -> Result<Value> {
    let efforts = iox::import_segment_efforts(csv)?;
    info!(efforts = efforts.len(), file = %csv.display(), "imported efforts");

    let Some(segment_id) = segment else {
        return Ok(json!({ "segments": an::segment_stats(&efforts) }));
    };
    let rows = an::leaderboard(&efforts, segment_id);
    if rows.is_empty() {
        bail!("no efforts for segment {segment_id} in {}", csv.display());
    }
    if let Some(out) = out {
        iox::export_leaderboard_csv(&rows, out)?;
        info!(file = %out.display(), "leaderboard written");
    }
    Ok(json!({
        "segmentId": segment_id,
        "summary": an::leaderboard_summary(&rows),
        "leaderboard": rows,
    }))
}

/// Shows, and optionally updates, the saved display preferences.
pub fn prefs(path: &Path, theme: Option<&str>, units: Option<&str>) -> Result<Value> {
    let mut p = Preferences::load(path)?;
    let mut changed = false;
    if let Some(t) = theme {
        p.theme = match t {
            "light" => Theme::Light,
            "dark" => Theme::Dark,
            other => bail!("unknown theme `{other}` (light|dark)"),
        };
        changed = true;
    }
    if let Some(u) = units {
        p.units = match u {
            "imperial" => Units::Imperial,
            "metric" => Units::Metric,
            other => bail!("unknown units `{other}` (imperial|metric)"),
        };
        changed = true;
    }
    if changed {
        p.save(path)?;
        info!(file = %path.display(), "preferences saved");
    }
    Ok(serde_json::to_value(p)?)
}
