//! LearnHub - A learning-platform backend
//!
//! This library provides the core functionality for LearnHub: accounts and
//! authentication, the course catalogue, lesson feedback and course orders.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
