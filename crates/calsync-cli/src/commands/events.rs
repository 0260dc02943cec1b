//! Event listing and creation commands.

use calsync_core::{CalendarEvent, Granularity, ViewRange, local_midnight};
use calsync_session::SignInState;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// JSON output of `calsync events`.
#[derive(Debug, Serialize)]
struct EventListing<'a> {
    view: &'a str,
    range: ViewRange,
    events: &'a [CalendarEvent],
}

/// Lists the events of a view anchored on `date` (today by default).
pub async fn list(
    view: Option<String>,
    date: Option<NaiveDate>,
    json: bool,
    config: &ClientConfig,
) -> ClientResult<()> {
    let session = super::session_from_config(config)?;

    let granularity = view
        .as_deref()
        .map(Granularity::parse)
        .unwrap_or(session.view().granularity);
    let anchor = match date {
        Some(date) => local_midnight(&Local, date).with_timezone(&Local),
        None => Local::now(),
    };

    // Not signed in yet, so this only moves the view and start() fetches it.
    let range = session.on_range_or_view_change(granularity, anchor);
    if session.start().await? != SignInState::SignedIn {
        return Err(ClientError::AuthRequired(
            "run `calsync auth` to sign in".to_string(),
        ));
    }

    let mut events = session.events().await;
    events.sort_by_key(|e| e.start);

    if json {
        let listing = EventListing {
            view: granularity.as_str(),
            range,
            events: &events,
        };
        let output = serde_json::to_string_pretty(&listing)
            .map_err(|e| ClientError::Input(format!("failed to serialize events: {}", e)))?;
        println!("{}", output);
    } else {
        println!(
            "{} view, {} - {}",
            granularity,
            format_local(range.start),
            format_local(range.end)
        );
        if events.is_empty() {
            println!("No events.");
        }
        for event in &events {
            println!("{}", format_event(event));
        }
    }
    Ok(())
}

/// Creates an event with a Meet link for the given slot.
pub async fn create(
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    title: String,
    config: &ClientConfig,
) -> ClientResult<()> {
    let (start, end) = validate_slot(start, end, &title)?;

    let session = super::session_from_config(config)?;
    if session.lifecycle().initialize().await != SignInState::SignedIn {
        return Err(ClientError::AuthRequired(
            "run `calsync auth` to sign in".to_string(),
        ));
    }

    let event = session.on_select_slot(start, end, &title).await?;
    println!("Created: {}", format_event(&event));
    Ok(())
}

fn validate_slot(
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    title: &str,
) -> ClientResult<(DateTime<Utc>, DateTime<Utc>)> {
    if title.trim().is_empty() {
        return Err(ClientError::Input("title must not be empty".to_string()));
    }
    if end <= start {
        return Err(ClientError::Input(
            "end must be after start".to_string(),
        ));
    }
    Ok((start.with_timezone(&Utc), end.with_timezone(&Utc)))
}

fn format_local(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn format_event(event: &CalendarEvent) -> String {
    let end = event.end.with_timezone(&Local);
    let end = if end.date_naive() == event.start.with_timezone(&Local).date_naive() {
        end.format("%H:%M").to_string()
    } else {
        end.format("%Y-%m-%d %H:%M").to_string()
    };
    format!("{} - {}  {}", format_local(event.start), end, event.title)
}
