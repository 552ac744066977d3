//! `GET /metrics` scrape endpoint, default listen address `:2112`.

use crate::gauge::TimestampedGaugeCollector;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

pub async fn serve(collector: Arc<TimestampedGaugeCollector>, addr: SocketAddr) {
    let route = warp::path("metrics").map(move || {
        warp::reply::with_header(
            collector.collect(),
            "Content-Type",
            "text/plain; version=0.0.4",
        )
    });

    warp::serve(route).run(addr).await;
}
