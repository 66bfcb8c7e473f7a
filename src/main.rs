use std::error::Error;

use tracing::{info, warn};
use ulid::Ulid;

use slotbook::gateway::{BookingGateway, InMemoryGateway};
use slotbook::model::{local_datetime, BookingDraft};
use slotbook::schedule::{ScheduleError, SelectionMode};
use slotbook::session::{BookingForm, DateInput};
use slotbook::settings::{FacilitySettings, StaticSettings};

const USAGE: &str = "usage: slotbook <YYYY-MM-DD> [resource-ulid] [bookings.json]";

/// Print the slot grid for one resource and day.
///
/// Settings come from `SLOTBOOK_*` environment variables. An optional JSON
/// file of booking drafts is committed to an in-memory gateway first so the
/// grid shows which slots are taken.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let date = DateInput::parse(args.next().as_deref());
    let resource_id = match args.next() {
        Some(raw) => Ulid::from_string(&raw)?,
        None => Ulid::new(),
    };
    let bookings_path = args.next();

    let gateway = InMemoryGateway::default();
    if let Some(path) = bookings_path {
        let drafts: Vec<BookingDraft> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        let count = drafts.len();
        for draft in drafts {
            if let Err(e) = gateway.create(draft).await {
                warn!("skipping booking from {path}: {e}");
            }
        }
        info!("loaded {count} bookings from {path}");
    }

    let provider = StaticSettings(FacilitySettings::from_env()?);
    let mut form = BookingForm::new(SelectionMode::Range);
    form.load_settings(&provider).await?;
    form.set_resource(resource_id);

    match &date {
        DateInput::Absent => {
            eprintln!("{USAGE}");
            return Ok(());
        }
        DateInput::Malformed(raw) => {
            eprintln!("not a date: {raw:?}");
            eprintln!("{USAGE}");
            return Ok(());
        }
        DateInput::Valid(_) => {}
    }
    form.set_date(date)?;
    form.refresh(&gateway).await?;

    let views = match form.slot_views() {
        Ok(views) => views,
        Err(ScheduleError::SettingsPending) => {
            println!("facility settings not configured; set SLOTBOOK_DAY_START, SLOTBOOK_DAY_END and SLOTBOOK_SLOT_MINUTES");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let offset = form
        .settings()
        .ready()
        .map(FacilitySettings::offset)
        .ok_or(ScheduleError::SettingsPending)?;
    println!("resource {resource_id}");
    for view in views {
        let (Some(start), Some(end)) = (
            local_datetime(view.slot.start, &offset),
            local_datetime(view.slot.end, &offset),
        ) else {
            continue;
        };
        println!(
            "  {} - {}  {}",
            start.format("%H:%M"),
            end.format("%H:%M"),
            if view.selectable { "free" } else { "booked" }
        );
    }
    Ok(())
}
