//! Shared fixtures for unit tests

use crate::store::memory::Snapshot;
use crate::store::{MemoryStore, Rating, Tag, User, Vibe};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

pub fn ts(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

/// Fixed "now" the fixtures are dated against
pub fn now() -> DateTime<Utc> {
    ts(2024, 6, 1)
}

pub fn vibe(
    id: &str,
    title: &str,
    description: &str,
    tags: &[&str],
    created_by: &str,
    created_at: DateTime<Utc>,
) -> Vibe {
    Vibe {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        created_by: created_by.to_string(),
        created_at,
    }
}

pub fn user(id: &str, username: &str, full_name: Option<&str>, bio: Option<&str>) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        full_name: full_name.map(str::to_string),
        bio: bio.map(str::to_string),
        created_at: ts(2023, 1, 1),
    }
}

pub fn tag(id: &str, name: &str, count: u64) -> Tag {
    Tag {
        id: id.to_string(),
        name: name.to_string(),
        count,
    }
}

pub fn rating(
    id: &str,
    vibe_id: &str,
    user_id: &str,
    value: u8,
    emoji: &str,
    review: Option<&str>,
) -> Rating {
    Rating {
        id: id.to_string(),
        vibe_id: vibe_id.to_string(),
        user_id: user_id.to_string(),
        value,
        emoji: emoji.to_string(),
        review: review.map(str::to_string),
        created_at: ts(2024, 5, 31),
    }
}

/// Small community: three users, five vibes, seven tags, six ratings.
/// `v4` has no ratings.
pub fn seeded_snapshot() -> Snapshot {
    Snapshot {
        users: vec![
            user("u1", "alice", Some("Alice Liddell"), Some("Loves rust and tea")),
            user("u2", "bob", Some("Bob Builder"), Some("Builds things")),
            user("u3", "carol", None, None),
        ],
        vibes: vec![
            vibe(
                "v1",
                "Morning coffee ritual",
                "Slow pour-over before work",
                &["coffee", "morning"],
                "u1",
                ts(2024, 5, 20),
            ),
            vibe(
                "v2",
                "Rust borrow checker wins",
                "Finally understood lifetimes",
                &["rust", "programming"],
                "u1",
                ts(2024, 3, 15),
            ),
            vibe(
                "v3",
                "Rainy day jazz",
                "Jazz records and rain sounds",
                &["music", "chill"],
                "u2",
                ts(2024, 1, 10),
            ),
            vibe(
                "v4",
                "Learning C++ templates",
                "Template metaprogramming is wild",
                &["programming"],
                "u2",
                ts(2023, 11, 5),
            ),
            vibe(
                "v5",
                "Sunset at the pier",
                "Orange skies over the water",
                &["nature", "chill"],
                "u3",
                ts(2024, 5, 30),
            ),
        ],
        tags: vec![
            tag("t1", "coffee", 12),
            tag("t2", "rust", 40),
            tag("t3", "programming", 75),
            tag("t4", "music", 20),
            tag("t5", "chill", 55),
            tag("t6", "nature", 8),
            tag("t7", "morning", 3),
        ],
        ratings: vec![
            rating("r1", "v1", "u2", 5, "🔥", Some("Best way to start the day")),
            rating("r2", "v1", "u3", 4, "☕", None),
            rating("r3", "v2", "u2", 5, "🔥", Some("So relatable")),
            rating("r4", "v3", "u1", 3, "😌", Some("Nice but slow")),
            rating("r5", "v5", "u1", 5, "🌅", Some("Gorgeous colors")),
            rating("r6", "v5", "u2", 2, "😐", Some("Seen better")),
        ],
        ..Default::default()
    }
}

pub fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::from_snapshot(seeded_snapshot()))
}

/// Store holding only the given vibes
pub fn store_with_vibes(vibes: Vec<Vibe>) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::from_snapshot(Snapshot {
        vibes,
        ..Default::default()
    }))
}
