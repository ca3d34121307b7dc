//! Curated phrase tables.
//!
//! Keys are lowercase and trimmed. Several phrases intentionally point at the
//! same canonical name.

use crate::library::SESSION_COMPLETE;

/// Common plan phrasings mapped to canonical exercise names.
pub const ALIASES: &[(&str, &str)] = &[
    // warm-up
    ("warm up", "General Warm-Up"),
    ("warmup", "General Warm-Up"),
    ("warm-up", "General Warm-Up"),
    ("general warmup", "General Warm-Up"),
    ("traversing", "Easy Traversing"),
    ("easy traverse", "Easy Traversing"),
    ("mobility", "Joint Mobility Circuit"),
    ("joint mobility", "Joint Mobility Circuit"),
    // fingerboard
    ("fingerboard max hangs", "Fingerboard Max Hangs (Crimps)"),
    ("max hangs", "Fingerboard Max Hangs (Crimps)"),
    ("hangboard max hangs", "Fingerboard Max Hangs (Crimps)"),
    ("crimp hangs", "Fingerboard Max Hangs (Crimps)"),
    ("half crimp hangs", "Fingerboard Max Hangs (Crimps)"),
    ("open hand hangs", "Fingerboard Max Hangs (Open Hand)"),
    ("open hand max hangs", "Fingerboard Max Hangs (Open Hand)"),
    ("repeaters", "Fingerboard Repeaters"),
    ("hangboard repeaters", "Fingerboard Repeaters"),
    ("7:3 repeaters", "Fingerboard Repeaters"),
    ("one arm hangs", "One-Arm Hangs"),
    ("one-arm hang", "One-Arm Hangs"),
    ("min edge hangs", "Minimum Edge Hangs"),
    ("minimum edge", "Minimum Edge Hangs"),
    // campus
    ("campus board", "Campus Board Exercises"),
    ("campus", "Campus Board Exercises"),
    ("campusing", "Campus Board Exercises"),
    ("campus board exercise", "Campus Board Exercises"),
    ("ladders", "Campus Ladders"),
    ("campus ladder", "Campus Ladders"),
    ("double dynos", "Campus Double Dynos"),
    ("bumps", "Campus Bumps"),
    // strength
    ("weighted pullups", "Weighted Pull-Ups"),
    ("weighted pull ups", "Weighted Pull-Ups"),
    ("pull ups", "Weighted Pull-Ups"),
    ("pullups", "Weighted Pull-Ups"),
    ("lock offs", "Lock-Off Holds"),
    ("lockoffs", "Lock-Off Holds"),
    ("front lever", "Front Lever Progression"),
    // core & antagonist
    ("leg raises", "Hanging Leg Raises"),
    ("toes to bar", "Hanging Leg Raises"),
    ("pushups", "Push-Ups"),
    ("push ups", "Push-Ups"),
    ("wrist curls", "Reverse Wrist Curls"),
    ("reverse wrist curl", "Reverse Wrist Curls"),
    ("overhead press", "Shoulder Press"),
    // power endurance
    ("4x4s", "4x4 Boulders"),
    ("4x4", "4x4 Boulders"),
    ("four by fours", "4x4 Boulders"),
    ("circuits", "Linked Circuits"),
    ("boulder circuits", "Linked Circuits"),
    ("route laps", "Route Intervals"),
    // endurance
    ("arc", "ARC Training"),
    ("arcing", "ARC Training"),
    ("traverses", "Continuous Traverses"),
    ("mileage", "Easy Mileage"),
    ("volume climbing", "Easy Mileage"),
    // technique
    ("quiet feet", "Silent Feet"),
    ("precise footwork", "Silent Feet"),
    ("flagging", "Flagging Practice"),
    ("down climbing", "Downclimbing"),
    ("downclimb", "Downclimbing"),
    // cool-down
    ("cool down", "Cool-Down Stretching"),
    ("cooldown", "Cool-Down Stretching"),
    ("cool-down", "Cool-Down Stretching"),
    ("stretching", "Cool-Down Stretching"),
    ("stretch", "Cool-Down Stretching"),
    ("easy climbing cool down", "Easy Cool-Down Climbing"),
    ("flush", "Forearm Flush"),
    // sentinel
    ("session complete", SESSION_COMPLETE),
    ("complete session", SESSION_COMPLETE),
    ("mark session complete", SESSION_COMPLETE),
    ("session done", SESSION_COMPLETE),
];

/// Query keywords mapped to category names, checked in order.
///
/// `power` precedes `endurance` so "power endurance" lands in the right place.
pub const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("fingerboard", "Fingerboard Training"),
    ("hangboard", "Fingerboard Training"),
    ("campus", "Campus Board"),
    ("warm", "Warm-Up"),
    ("cool", "Cool-Down"),
    ("stretch", "Cool-Down"),
    ("antagonist", "Core & Antagonist"),
    ("core", "Core & Antagonist"),
    ("power", "Power Endurance"),
    ("endurance", "Endurance"),
];
