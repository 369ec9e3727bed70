//! Сбор метрик по SNMP.
//!
//! Пул сессий с агентами, обход дерева MIB в режимах `single`, `walk` и
//! `table`, разрешение динамических элементов пространства имен и
//! параллельный сбор метрик через одну сессию.

pub mod collector;
pub mod config;
pub mod error;
pub mod formatter;
pub mod handlers;
pub mod models;
pub mod pool;
pub mod routes;
pub mod snmp;

pub use collector::{Collector, MetricCatalog, NamespacePattern};
pub use error::{Error, Result};
pub use pool::{ConnectionPool, PoolConfig};
