pub mod alarm_editor;
pub mod alarm_engine;
pub mod alarm_service;
pub mod alarm_store;
pub mod announcer;
pub mod app_error;
pub mod clock;
pub mod commands;
pub mod config;
pub mod data_manager;
pub mod events;
pub mod models;
pub mod ringing_session;
pub mod suggest;
