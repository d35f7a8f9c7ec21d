//! Per-account holding fetchers.
//!
//! Each fetcher reads one account type and keeps only the entries that
//! carry a non-zero position. Spot failures propagate; margin accounts may
//! legitimately not exist, so their failures degrade to an empty set.

use tracing::{debug, warn};

use crate::domain::{IsolatedPair, MarginAsset, SpotBalance};
use crate::exchanges::{AccountApi, Result};

/// Spot balances with a non-zero free or locked quantity.
pub async fn fetch_spot(api: &dyn AccountApi) -> Result<Vec<SpotBalance>> {
    let balances: Vec<SpotBalance> = api
        .spot_balances()
        .await?
        .into_iter()
        .filter(|b| !b.is_empty())
        .collect();

    debug!(count = balances.len(), "non-zero spot balances");
    Ok(balances)
}

/// Cross margin assets with a non-zero net amount. Failures yield an empty set.
pub async fn fetch_cross_margin(api: &dyn AccountApi) -> Vec<MarginAsset> {
    match api.cross_margin_assets().await {
        Ok(assets) => {
            let assets: Vec<MarginAsset> = assets
                .into_iter()
                .filter(|a| !a.net_asset.is_zero())
                .collect();
            debug!(count = assets.len(), "non-zero cross margin assets");
            assets
        }
        Err(e) => {
            warn!(error = %e, "cross margin fetch failed, counting it as empty");
            Vec::new()
        }
    }
}

/// Isolated pairs with a non-zero base or quote net amount. Failures yield an empty set.
pub async fn fetch_isolated_margin(api: &dyn AccountApi) -> Vec<IsolatedPair> {
    match api.isolated_margin_pairs().await {
        Ok(pairs) => {
            let pairs: Vec<IsolatedPair> = pairs.into_iter().filter(|p| !p.is_empty()).collect();
            debug!(count = pairs.len(), "non-zero isolated margin pairs");
            pairs
        }
        Err(e) => {
            warn!(error = %e, "isolated margin fetch failed, counting it as empty");
            Vec::new()
        }
    }
}
