//! Canned generator responses used by the scenarios.

/// Four-step sun/earth/moon orbit with a flare emitter and labels.
pub const SOLAR_SYSTEM: &str = include_str!("../fixtures/solar_system.json");

/// Three-step eruption, wrapped in a markdown code fence.
pub const VOLCANO: &str = include_str!("../fixtures/volcano.json");

/// Every kind of bad value the document boundary has to coerce.
pub const MALFORMED: &str = include_str!("../fixtures/malformed.json");

/// Actors but no timeline.
pub const EMPTY_TIMELINE: &str = r#"{
    "meta_data": { "title": "Still Life" },
    "stage_assets": [
        { "id": "vase", "type": "cylinder", "pbr_material": { "material_class": "GLASS" } },
        { "id": "apple", "type": "sphere", "initial_transform": { "position": [1, 0, 0] } }
    ],
    "sync_timeline": []
}"#;
