pub mod app;
pub mod bundle;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod file_entity;
pub mod fs_util;
pub mod grouping;
pub mod manifest;
pub mod output;
pub mod patterns;
pub mod prefix;
pub mod restricted;
pub mod rules;
pub mod store;
pub mod vocabulary;
