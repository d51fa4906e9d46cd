//! Demo price-feed oracle.
//!
//! Requests ask for the price of `token_a` in `token_b`; responses carry the
//! price with 18 decimals, or an error number when no quote exists.

use crate::{MessageHandler, WorkerError};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sbor::prelude::*;
use std::collections::HashMap;

/// Response type tag for price feeds.
pub const TYPE_FEED: u8 = 11;

/// No quote for the requested pair.
pub const ERR_NO_PRICE: u128 = 1;

/// Fixed-point scale of quoted prices.
pub const PRICE_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct PriceRequest {
    pub op_type: u8,
    pub trading_pair_id: u32,
    pub token_a: String,
    pub token_b: String,
}

#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct PriceResponse {
    pub resp_type: u8,
    pub trading_pair_id: u32,
    pub price: Option<u128>,
    pub err_no: Option<u128>,
}

/// Source of price quotes.
pub trait PriceSource: Send + Sync {
    /// Price of one `token_a` in `token_b`, scaled by 10^18.
    fn quote(&self, token_a: &str, token_b: &str) -> Option<u128>;
}

/// Quotes a fixed set of pairs with seeded random drift.
pub struct SimulatedPrices {
    base: HashMap<(String, String), u128>,
    rng: Mutex<ChaCha8Rng>,
}

impl SimulatedPrices {
    pub fn new(seed: u64) -> Self {
        Self {
            base: HashMap::new(),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Register a pair around a whole-unit base price.
    pub fn with_pair(mut self, token_a: &str, token_b: &str, units: u64) -> Self {
        let scaled = units as u128 * 10u128.pow(PRICE_DECIMALS);
        self.base
            .insert((token_a.to_string(), token_b.to_string()), scaled);
        self
    }
}

impl PriceSource for SimulatedPrices {
    fn quote(&self, token_a: &str, token_b: &str) -> Option<u128> {
        let base = *self
            .base
            .get(&(token_a.to_string(), token_b.to_string()))?;
        // +/- 1%
        let permille: i64 = self.rng.lock().gen_range(-10..=10);
        let delta = base / 1000 * permille.unsigned_abs() as u128;
        Some(if permille < 0 { base - delta } else { base + delta })
    }
}

/// Answers every request with one [`PriceResponse`].
pub struct PriceFeedHandler<S> {
    source: S,
}

impl<S: PriceSource> PriceFeedHandler<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

#[async_trait::async_trait]
impl<S: PriceSource> MessageHandler<PriceRequest, PriceResponse> for PriceFeedHandler<S> {
    async fn handle(&self, request: PriceRequest) -> Result<Vec<PriceResponse>, WorkerError> {
        let price = self.source.quote(&request.token_a, &request.token_b);
        if price.is_none() {
            tracing::warn!(
                trading_pair_id = request.trading_pair_id,
                token_a = %request.token_a,
                token_b = %request.token_b,
                "No price for trading pair"
            );
        }
        Ok(vec![PriceResponse {
            resp_type: TYPE_FEED,
            trading_pair_id: request.trading_pair_id,
            price,
            err_no: price.is_none().then_some(ERR_NO_PRICE),
        }])
    }
}
