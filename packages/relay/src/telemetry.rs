//! Logging bootstrap for the Lambda binaries
//!
//! `tracing-subscriber` fmt output filtered by `RUST_LOG`, plus a
//! `sentry-tracing` layer when `SENTRY_ENDPOINT` is set.

use sentry::ClientInitGuard;
use std::borrow::Cow;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const QUIET_DEPENDENCIES: [&str; 5] = [
    "hyper=warn",
    "hyper_util=warn",
    "rustls=warn",
    "h2=warn",
    "tower=warn",
];

/// `warn` overall, `info` for the relay and for `crates` (target names, e.g. `aws_notifier`)
pub fn default_filter(crates: &[&str]) -> EnvFilter {
    let directives = crates
        .iter()
        .map(|name| format!("{name}=info"))
        .chain(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));

    let mut filter = EnvFilter::new("warn,webhook_relay=info");
    for directive in directives {
        match directive.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring log directive '{directive}': {e}"),
        }
    }
    filter
}

/// Install the global subscriber. Hold the returned guard for the lifetime
/// of the process so Sentry flushes on shutdown.
///
/// Pass `sentry::release_name!()` from the binary so the release names it.
pub fn init(release: Option<Cow<'static, str>>, crates: &[&str]) -> Option<ClientInitGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(crates));
    let sentry_endpoint = std::env::var("SENTRY_ENDPOINT").unwrap_or_default();

    if sentry_endpoint.is_empty() {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
            .init();
        return None;
    }

    let guard = sentry::init((
        sentry_endpoint,
        sentry::ClientOptions {
            release,
            traces_sample_rate: 0.3,
            ..Default::default()
        },
    ));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .with(sentry_tracing::layer())
        .init();
    Some(guard)
}
