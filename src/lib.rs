//! KitchenTech - marketplace API for kitchen rentals and sales
//!
//! This library provides listings with moderation, subscription plans,
//! favorites, lead intake (quotes and contact messages), site settings and
//! the admin surface, served over axum.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
