// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Route Prefix: /api/app-system/*, /api/customer-manual/*
// Middleware: JWT validation, then tenant pool resolution

pub mod app_system;
pub mod tree;
