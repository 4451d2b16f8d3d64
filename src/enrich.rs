//! Per-channel enrichment: EPG entry counts and stream probing.
//!
//! Both lookups are best-effort. A failed lookup marks that channel's
//! field as unavailable and the batch continues; channels are processed
//! strictly in selection order and never affect one another.

use std::collections::HashMap;

use serde_json::Value;

use crate::api::XtreamClient;
use crate::config::Credentials;
use crate::models::{Category, Channel};
use crate::probe::{StreamProbeResult, StreamProber};

/// One selected channel with its enrichment results attached.
#[derive(Debug, Clone)]
pub struct EnrichedChannel {
    pub channel: Channel,
    pub category_name: String,
    /// EPG entry count. `Some(0)` covers both "no guide data" and a failed
    /// lookup (reported separately as a warning); `None` means the lookup
    /// was not requested.
    pub epg_count: Option<usize>,
    /// Probe result; `None` when probing was skipped or failed.
    pub probe: Option<StreamProbeResult>,
}

pub struct Enricher<'a> {
    client: &'a XtreamClient,
    creds: &'a Credentials,
    want_epg: bool,
    prober: Option<&'a dyn StreamProber>,
}

impl<'a> Enricher<'a> {
    pub fn new(
        client: &'a XtreamClient,
        creds: &'a Credentials,
        want_epg: bool,
        prober: Option<&'a dyn StreamProber>,
    ) -> Self {
        Self {
            client,
            creds,
            want_epg,
            prober,
        }
    }

    /// Enrich `channels` in order. Warnings for failed lookups are appended
    /// to `warnings`; they never abort the batch.
    pub fn enrich_all(
        &self,
        channels: &[&Channel],
        categories: &[Category],
        warnings: &mut Vec<String>,
    ) -> Vec<EnrichedChannel> {
        let names: HashMap<&str, &str> = categories
            .iter()
            .map(|cat| (cat.category_id.as_str(), cat.category_name.as_str()))
            .collect();

        channels
            .iter()
            .map(|channel| self.enrich_one(channel, &names, warnings))
            .collect()
    }

    fn enrich_one(
        &self,
        channel: &Channel,
        names: &HashMap<&str, &str>,
        warnings: &mut Vec<String>,
    ) -> EnrichedChannel {
        let category_name = channel
            .category_id
            .as_deref()
            .and_then(|id| names.get(id).copied())
            .unwrap_or("Unknown")
            .to_string();

        let epg_count = if self.want_epg {
            match self.client.short_epg(channel.stream_id) {
                Ok(payload) => Some(count_epg_entries(&payload)),
                Err(e) => {
                    warnings.push(format!("EPG lookup failed for '{}': {e}", channel.name));
                    Some(0)
                }
            }
        } else {
            None
        };

        let probe = self.prober.and_then(|prober| {
            let url = self
                .creds
                .live_stream_url(channel.stream_id, channel.container_extension.as_deref());
            match prober.probe(&url) {
                Ok(result) => Some(result),
                Err(e) => {
                    warnings.push(format!("probe failed for '{}': {e}", channel.name));
                    None
                }
            }
        });

        EnrichedChannel {
            channel: channel.clone(),
            category_name,
            epg_count,
            probe,
        }
    }
}

/// Count guide entries in a `get_short_epg` payload. Providers return
/// either an object carrying an `epg_listings` array or a bare array.
pub fn count_epg_entries(payload: &Value) -> usize {
    match payload {
        Value::Object(map) => map
            .get("epg_listings")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
        Value::Array(items) => items.len(),
        _ => 0,
    }
}
