//! Publish/subscribe transport glue.

pub mod producer;

pub use producer::{
    CHART_REQS_TOPIC, PUBLIC_SUBS_TOPIC, Producer, RESPONSES_TOPIC, TRADES_TOPIC, connect_broker,
    nats_url,
};
