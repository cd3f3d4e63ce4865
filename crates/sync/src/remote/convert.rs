//! Row normalization: raw backend JSON to the application model.
//!
//! The backend's row shape drifted over time (numeric vs string ids,
//! missing optionals, out-of-range ratings from a bad import). Everything
//! is repaired here so the rest of the core sees one stable shape.
//!
//! Rules: unknown fields dropped, missing optionals defaulted, `rating`
//! clamped to `[0, 5]`, `review_count` floored at zero, timestamps default
//! to the epoch when absent.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use sugbo_core::{
    CatalogEntry, ChangeEvent, ChangeKind, Coordinates, Delicacy, Destination, DietaryFlag,
    EntityKind,
};

use crate::error::{Result, SyncError};

/// Normalize a raw row of the given kind.
///
/// # Errors
///
/// Returns `Internal` only when the row has no usable `id`; every other
/// defect is repaired.
pub fn entry_from_row(kind: EntityKind, row: &Value) -> Result<CatalogEntry> {
    match kind {
        EntityKind::Destination => destination_from_row(row).map(CatalogEntry::Destination),
        EntityKind::Delicacy => delicacy_from_row(row).map(CatalogEntry::Delicacy),
    }
}

/// Normalize a destination row.
pub fn destination_from_row(row: &Value) -> Result<Destination> {
    let id = require_id(row)?;
    Ok(Destination {
        id: id.into(),
        name: string_field(row, "name"),
        location: string_field(row, "location"),
        category: string_field(row, "category"),
        description: string_field(row, "description"),
        coordinates: coordinates_field(row),
        images: string_list_field(row, "images"),
        rating: rating_field(row),
        review_count: count_field(row, "review_count"),
        featured: bool_field(row, "featured"),
        is_active: row
            .get("is_active")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        created_at: datetime_field(row, "created_at"),
        updated_at: datetime_field(row, "updated_at"),
    })
}

/// Normalize a delicacy row.
pub fn delicacy_from_row(row: &Value) -> Result<Delicacy> {
    let id = require_id(row)?;
    Ok(Delicacy {
        id: id.into(),
        name: string_field(row, "name"),
        location: string_field(row, "location"),
        category: string_field(row, "category"),
        description: string_field(row, "description"),
        coordinates: coordinates_field(row),
        images: string_list_field(row, "images"),
        rating: rating_field(row),
        review_count: count_field(row, "review_count"),
        featured: bool_field(row, "featured"),
        is_active: row
            .get("is_active")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        restaurant: string_field(row, "restaurant"),
        price_range: string_field(row, "price_range"),
        ingredients: string_set_field(row, "ingredients"),
        allergens: string_set_field(row, "allergens"),
        dietary_flags: dietary_flags_field(row),
        created_at: datetime_field(row, "created_at"),
        updated_at: datetime_field(row, "updated_at"),
    })
}

/// Build a [`ChangeEvent`] from the realtime wire payload
/// `{eventType, new, old}`.
///
/// # Errors
///
/// Returns `Internal` for unknown event types or payloads missing both
/// rows.
pub fn event_from_wire(
    kind: EntityKind,
    event_type: &str,
    new: Option<&Value>,
    old: Option<&Value>,
) -> Result<ChangeEvent> {
    let change_kind = match event_type {
        "INSERT" => ChangeKind::Insert,
        "UPDATE" => ChangeKind::Update,
        "DELETE" => ChangeKind::Delete,
        other => {
            return Err(SyncError::Internal(format!(
                "unknown realtime event type: {other}"
            )));
        }
    };

    let before = old.and_then(|row| entry_from_row(kind, row).ok());
    let after = new.and_then(|row| entry_from_row(kind, row).ok());

    match change_kind {
        ChangeKind::Insert | ChangeKind::Update => {
            let after = after.ok_or_else(|| {
                SyncError::Internal("realtime insert/update payload has no new row".to_owned())
            })?;
            Ok(ChangeEvent {
                kind: change_kind,
                entity: kind,
                id: after.id().to_owned(),
                before,
                after: Some(after),
            })
        }
        ChangeKind::Delete => {
            let id = before
                .as_ref()
                .map(|e| e.id().to_owned())
                .or_else(|| old.and_then(row_id))
                .ok_or_else(|| {
                    SyncError::Internal("realtime delete payload has no old row".to_owned())
                })?;
            Ok(ChangeEvent::delete(kind, id, before))
        }
    }
}

// =============================================================================
// Field helpers
// =============================================================================

/// Extract the row id; accepts string or numeric ids.
fn row_id(row: &Value) -> Option<String> {
    match row.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn require_id(row: &Value) -> Result<String> {
    row_id(row).ok_or_else(|| SyncError::Internal("catalog row has no id".to_owned()))
}

fn string_field(row: &Value, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn bool_field(row: &Value, key: &str) -> bool {
    row.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn rating_field(row: &Value) -> f64 {
    row.get("rating")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 5.0)
}

fn count_field(row: &Value, key: &str) -> u32 {
    row.get(key)
        .and_then(Value::as_i64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn datetime_field(row: &Value, key: &str) -> DateTime<Utc> {
    row.get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or(DateTime::UNIX_EPOCH, |dt| dt.with_timezone(&Utc))
}

fn coordinates_field(row: &Value) -> Option<Coordinates> {
    let coords = row.get("coordinates")?;
    let lat = coords.get("lat").and_then(Value::as_f64)?;
    let lon = coords.get("lon").and_then(Value::as_f64)?;
    Some(Coordinates { lat, lon })
}

fn string_list_field(row: &Value, key: &str) -> Vec<String> {
    row.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn string_set_field(row: &Value, key: &str) -> BTreeSet<String> {
    row.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn dietary_flags_field(row: &Value) -> BTreeSet<DietaryFlag> {
    row.get("dietary_flags")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| serde_json::from_value::<DietaryFlag>(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_destination_full_row() {
        let row = json!({
            "id": "d-1",
            "name": "Kawasan Falls",
            "location": "Badian",
            "category": "nature",
            "description": "Canyoneering and turquoise water",
            "coordinates": {"lat": 9.81, "lon": 123.37},
            "images": ["https://img.example/kawasan.jpg"],
            "rating": 4.7,
            "review_count": 210,
            "featured": true,
            "is_active": true,
            "created_at": "2025-04-01T08:00:00Z",
            "updated_at": "2025-04-02T08:00:00Z",
        });
        let d = destination_from_row(&row).unwrap();
        assert_eq!(d.id.as_str(), "d-1");
        assert_eq!(d.name, "Kawasan Falls");
        assert!(d.featured);
        assert!((d.rating - 4.7).abs() < f64::EPSILON);
        assert_eq!(d.images.len(), 1);
        assert_eq!(d.coordinates.unwrap().lat, 9.81);
    }

    #[test]
    fn test_missing_optionals_default() {
        let row = json!({"id": "d-2"});
        let d = destination_from_row(&row).unwrap();
        assert_eq!(d.name, "");
        assert!(d.images.is_empty());
        assert!(d.coordinates.is_none());
        assert!(d.is_active, "missing is_active defaults to active");
        assert_eq!(d.created_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_rating_clamped_and_count_floored() {
        let row = json!({"id": "d-3", "rating": 9.4, "review_count": -5});
        let d = destination_from_row(&row).unwrap();
        assert!((d.rating - 5.0).abs() < f64::EPSILON);
        assert_eq!(d.review_count, 0);

        let row = json!({"id": "d-4", "rating": -1.0});
        let d = destination_from_row(&row).unwrap();
        assert!(d.rating.abs() < f64::EPSILON);
    }

    #[test]
    fn test_numeric_id_accepted() {
        let row = json!({"id": 17, "name": "Magellan's Cross"});
        let d = destination_from_row(&row).unwrap();
        assert_eq!(d.id.as_str(), "17");
    }

    #[test]
    fn test_missing_id_rejected() {
        assert!(destination_from_row(&json!({"name": "nameless"})).is_err());
    }

    #[test]
    fn test_unknown_fields_dropped() {
        let row = json!({"id": "d-5", "legacy_blob": {"nested": true}});
        assert!(destination_from_row(&row).is_ok());
    }

    #[test]
    fn test_delicacy_sets_and_flags() {
        let row = json!({
            "id": "f-1",
            "name": "Lechon",
            "restaurant": "Carcar Market",
            "price_range": "₱150-300",
            "ingredients": ["pork", "lemongrass", "pork"],
            "allergens": [],
            "dietary_flags": ["halal", "not_a_flag", "gluten_free"],
        });
        let d = delicacy_from_row(&row).unwrap();
        assert_eq!(d.ingredients.len(), 2, "sets deduplicate");
        assert!(d.dietary_flags.contains(&DietaryFlag::Halal));
        assert!(d.dietary_flags.contains(&DietaryFlag::GlutenFree));
        assert_eq!(d.dietary_flags.len(), 2, "unknown flags dropped");
    }

    #[test]
    fn test_event_from_wire_insert() {
        let new = json!({"id": "d-9", "name": "Bantayan"});
        let ev = event_from_wire(EntityKind::Destination, "INSERT", Some(&new), None).unwrap();
        assert_eq!(ev.kind, ChangeKind::Insert);
        assert_eq!(ev.id, "d-9");
        assert!(ev.after.is_some());
    }

    #[test]
    fn test_event_from_wire_delete_uses_old_row() {
        let old = json!({"id": "d-9"});
        let ev = event_from_wire(EntityKind::Destination, "DELETE", None, Some(&old)).unwrap();
        assert_eq!(ev.kind, ChangeKind::Delete);
        assert_eq!(ev.id, "d-9");
        assert!(ev.after.is_none());
    }

    #[test]
    fn test_event_from_wire_rejects_unknown_type() {
        assert!(event_from_wire(EntityKind::Destination, "TRUNCATE", None, None).is_err());
    }
}
