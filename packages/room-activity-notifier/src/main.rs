use aws_lambda_events::event::dynamodb::{Event, EventRecord};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_dynamo::Item;
use shared::models::room::{room_activity, Room, RoomActivity, Winner};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    info!("Room activity notifier starting");

    run(service_fn(|event: LambdaEvent<Event>| async {
        let (event, _context) = event.into_parts();

        info!("Processing {} room records", event.records.len());

        for record in event.records {
            if let Err(e) = process_record(record) {
                error!("Failed to process record: {}", e);
            }
        }

        Ok::<(), Error>(())
    }))
    .await
}

fn process_record(record: EventRecord) -> Result<(), serde_dynamo::Error> {
    let decoded = activity_for(
        &record.event_name,
        record.change.old_image,
        record.change.new_image,
    )?;

    if let Some((room, activity)) = decoded {
        for entry in &activity {
            info!("{}", describe(&room, entry));
        }
    }

    Ok(())
}

/// Decodes a stream record of the rooms table into the room as written and
/// the lifecycle changes it carries. Rooms are never deleted, so a REMOVE is
/// only logged.
fn activity_for(
    event_name: &str,
    old_image: Item,
    new_image: Item,
) -> Result<Option<(Room, Vec<RoomActivity>)>, serde_dynamo::Error> {
    match event_name {
        "INSERT" => {
            let room: Room = serde_dynamo::from_item(new_image)?;
            let activity = room_activity(None, &room);
            Ok(Some((room, activity)))
        }
        "MODIFY" => {
            let room: Room = serde_dynamo::from_item(new_image)?;
            let decoded: Result<Room, _> = serde_dynamo::from_item(old_image);
            let previous = match decoded {
                Ok(previous) => Some(previous),
                Err(e) => {
                    warn!("Room {} has no usable old image: {}", room.room_id, e);
                    None
                }
            };
            let activity = room_activity(previous.as_ref(), &room);
            Ok(Some((room, activity)))
        }
        "REMOVE" => {
            warn!("Room record removed from the rooms table");
            Ok(None)
        }
        other => {
            info!("Unhandled event type: {}", other);
            Ok(None)
        }
    }
}

fn seat_name(room: &Room, winner: Winner) -> String {
    winner
        .color()
        .and_then(|color| room.players.get(color))
        .map(|player| player.display_name.clone())
        .unwrap_or_else(|| winner.as_str().to_string())
}

fn describe(room: &Room, activity: &RoomActivity) -> String {
    match activity {
        RoomActivity::Created => format!(
            "Room {} created with code {} ({})",
            room.room_id,
            room.code,
            room.mode.as_str()
        ),
        RoomActivity::OpponentJoined => format!(
            "Room {}: {} vs {}",
            room.room_id,
            seat_name(room, Winner::White),
            seat_name(room, Winner::Black)
        ),
        RoomActivity::MovePlayed { notation, total } => {
            format!("Room {}: move {} {}", room.room_id, total, notation)
        }
        RoomActivity::Finished(winner) => {
            let minutes = (room.last_move_at - room.created_at).num_minutes();
            match winner {
                Winner::Draw => format!(
                    "Room {} drawn after {} moves ({} min)",
                    room.room_id,
                    room.move_log.len(),
                    minutes
                ),
                _ => format!(
                    "Room {} won by {} after {} moves ({} min)",
                    room.room_id,
                    seat_name(room, *winner),
                    room.move_log.len(),
                    minutes
                ),
            }
        }
    }
}
