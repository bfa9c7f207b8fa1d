pub mod api;
pub mod bootstrap;
pub mod logger;
pub mod settings;

pub mod application_impl;
pub mod application_port;
pub mod domain_model;
pub mod domain_port;
pub mod infra_local;
pub mod infra_mysql;
pub mod infra_redis;
