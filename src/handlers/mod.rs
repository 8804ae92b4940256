// handlers/mod.rs - Two handler tiers
//
// Public (no auth) → Protected (JWT auth + tenant database)

pub mod protected; // /api/*
pub mod public; // /, /health
