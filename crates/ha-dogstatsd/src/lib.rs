//! DogStatsD client for Home Assistant integrations
//!
//! This crate speaks the DogStatsD flavor of the statsd protocol: gauges
//! with tags and client-side sampling, and Datadog events. Datagrams are
//! batched in an internal buffer and shipped over UDP; IO failures are
//! logged (rate limited) and the datagram dropped, never surfaced to the
//! caller.

mod sink;

mod client;
pub use client::{DogstatsdClient, EventFormatter, MetricFormatter};

mod tag;
pub use tag::TagGroup;
