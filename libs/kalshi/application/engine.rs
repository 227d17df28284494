//! The quoting state machine
//!
//! [`EngineState`] owns every piece of mutable state behind one mutex:
//! catalog, target, prices, live RFQs, quotes, and the history store. All of
//! its methods are check-and-mutate steps that run under the lock and return
//! plain data describing any network work to do. [`QuoteEngine`] wraps the
//! state with the trading client and spawns that work on tokio, so the lock
//! is never held across a network send.

use crate::application::store::{ConnectionStatus, FeedStore, StateSnapshot};
use crate::config::QuoterConfig;
use crate::domain::{
    CommandError, Leg, LegCatalog, MatchMode, PriceConfig, Quote, QuoteStatus, Rfq, RfqStatus,
    TargetMatcher,
};
use crate::infrastructure::client::feed::types::{FeedMessage, QuotePayload, RfqPayload};
use crate::infrastructure::client::rest::TradingClient;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A reserved quote awaiting transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteJob {
    pub rfq_id: String,
    pub yes_bid: Decimal,
    pub no_bid: Decimal,
    pub rest_remainder: bool,
}

/// A confirmation to send for an accepted quote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmJob {
    pub quote_id: String,
}

/// All mutable quoter state, guarded by one mutex
pub struct EngineState {
    pub catalog: LegCatalog,
    pub matcher: TargetMatcher,
    pub prices: PriceConfig,
    pub auto_confirm: bool,
    pub rest_remainder: bool,
    /// Live RFQs by rfq_id
    rfqs: HashMap<String, Rfq>,
    /// At most one quote per RFQ, keyed by rfq_id
    quotes: HashMap<String, Quote>,
    /// Venue quote id -> rfq_id
    quote_index: HashMap<String, String>,
    pub store: FeedStore,
    /// True once the session has connected at least once; the next Connected
    /// after that is a reconnect
    has_connected: bool,
}

impl EngineState {
    pub fn new(
        mode: MatchMode,
        prices: PriceConfig,
        auto_confirm: bool,
        rest_remainder: bool,
        store: FeedStore,
    ) -> Self {
        Self {
            catalog: LegCatalog::new(),
            matcher: TargetMatcher::new(mode),
            prices,
            auto_confirm,
            rest_remainder,
            rfqs: HashMap::new(),
            quotes: HashMap::new(),
            quote_index: HashMap::new(),
            store,
            has_connected: false,
        }
    }

    /// Register an RFQ from the feed and, when it matches, reserve the quote
    ///
    /// The reservation is the at-most-once step: it only succeeds when the
    /// RFQ is open, unexpired, the target matches, prices validate, and no
    /// non-Error quote exists for the RFQ. The caller transmits outside the
    /// lock and must call `begin_transmission` right before the POST.
    pub fn register_rfq(&mut self, payload: &RfqPayload, now: DateTime<Utc>) -> Option<QuoteJob> {
        let leg_ids = self.observe_payload_legs(payload);
        let matched = self.matcher.matches(&leg_ids);

        // History records one entry per RFQ; duplicate deliveries add nothing
        if !self.rfqs.contains_key(&payload.id) {
            self.rfqs.insert(
                payload.id.clone(),
                Rfq {
                    rfq_id: payload.id.clone(),
                    leg_ids: leg_ids.clone(),
                    market_ticker: payload.market_ticker.clone(),
                    contracts: payload.contracts,
                    created_at: now,
                    expires_at: payload.expiration_time,
                    status: RfqStatus::Open,
                    stale: false,
                },
            );
            self.store.record_rfq(
                &payload.id,
                &payload.market_ticker,
                payload.contracts,
                leg_ids,
                matched,
            );
        }

        if !matched {
            return None;
        }
        self.reserve_quote(&payload.id, now)
    }

    /// Register a backfilled RFQ: catalog its legs and track it as stale,
    /// but never quote it. The feed is the source of truth for quoting.
    pub fn register_backfill(&mut self, payload: &RfqPayload, now: DateTime<Utc>) {
        let leg_ids = self.observe_payload_legs(payload);
        let matched = self.matcher.matches(&leg_ids);

        if !self.rfqs.contains_key(&payload.id) {
            self.rfqs.insert(
                payload.id.clone(),
                Rfq {
                    rfq_id: payload.id.clone(),
                    leg_ids: leg_ids.clone(),
                    market_ticker: payload.market_ticker.clone(),
                    contracts: payload.contracts,
                    created_at: now,
                    expires_at: payload.expiration_time,
                    status: RfqStatus::Open,
                    stale: true,
                },
            );
            self.store.record_rfq(
                &payload.id,
                &payload.market_ticker,
                payload.contracts,
                leg_ids,
                matched,
            );
        }
    }

    fn observe_payload_legs(&mut self, payload: &RfqPayload) -> Vec<String> {
        let legs: Vec<Leg> = payload
            .mve_selected_legs
            .iter()
            .map(|l| Leg::new(&l.event_ticker, &l.market_ticker, l.side))
            .collect();
        self.catalog.observe(legs.iter())
    }

    fn reserve_quote(&mut self, rfq_id: &str, now: DateTime<Utc>) -> Option<QuoteJob> {
        let rfq = self.rfqs.get(rfq_id)?;
        if !rfq.is_open() || rfq.is_expired_at(now) {
            debug!("RFQ {} not quotable (closed or expired)", rfq_id);
            return None;
        }

        // A prior Error attempt does not block; anything else does
        if let Some(existing) = self.quotes.get(rfq_id) {
            if existing.status != QuoteStatus::Error {
                debug!("RFQ {} already has a quote, skipping", rfq_id);
                return None;
            }
        }

        // Prices are read here, at quote-build time
        if let Err(e) = self.prices.validate() {
            warn!("Not quoting RFQ {}: {}", rfq_id, e);
            return None;
        }
        let prices = self.prices;

        self.quotes.insert(
            rfq_id.to_string(),
            Quote {
                quote_id: None,
                rfq_id: rfq_id.to_string(),
                yes_bid: prices.yes_bid,
                no_bid: prices.no_bid,
                sent_at: now,
                status: QuoteStatus::Sent,
                error: None,
            },
        );
        self.store.record_quote(rfq_id, prices.yes_bid, prices.no_bid);

        Some(QuoteJob {
            rfq_id: rfq_id.to_string(),
            yes_bid: prices.yes_bid,
            no_bid: prices.no_bid,
            rest_remainder: self.rest_remainder,
        })
    }

    /// Final check before the POST leaves the process
    ///
    /// Returns false (and resolves the reservation to Error) when the RFQ
    /// went terminal between reservation and transmission.
    pub fn begin_transmission(&mut self, rfq_id: &str, now: DateTime<Utc>) -> bool {
        let still_open = self
            .rfqs
            .get(rfq_id)
            .map(|r| r.is_open() && !r.is_expired_at(now))
            .unwrap_or(false);

        if !still_open {
            self.fail_transmission(rfq_id, "rfq closed before transmission");
            return false;
        }
        true
    }

    /// The create call succeeded; attach the venue quote id
    pub fn complete_transmission(&mut self, rfq_id: &str, quote_id: &str) {
        if let Some(quote) = self.quotes.get_mut(rfq_id) {
            quote.quote_id = Some(quote_id.to_string());
        }
        self.quote_index
            .insert(quote_id.to_string(), rfq_id.to_string());
        self.store
            .update_quote(rfq_id, |r| r.quote_id = Some(quote_id.to_string()));
    }

    /// The create call failed or was aborted; no retry
    pub fn fail_transmission(&mut self, rfq_id: &str, reason: &str) {
        let Some(quote) = self.quotes.get_mut(rfq_id) else {
            return;
        };
        // The quote may already be resolved (cancellation landed first);
        // a resolved outcome is never rewritten
        if quote.transition(QuoteStatus::Error).is_err() {
            debug!(
                "Quote for RFQ {} already {:?}, not marking Error",
                rfq_id, quote.status
            );
            return;
        }
        quote.error = Some(reason.to_string());

        self.store.update_quote(rfq_id, |r| {
            r.status = QuoteStatus::Error;
            r.error = Some(reason.to_string());
        });
        self.store.set_last_error(reason);
    }

    /// Close an RFQ (cancellation or expiry) and resolve its Sent quote
    pub fn close_rfq(&mut self, rfq_id: &str, status: RfqStatus) {
        let Some(rfq) = self.rfqs.get_mut(rfq_id) else {
            debug!("Close for unknown RFQ {}", rfq_id);
            return;
        };
        if rfq.transition(status).is_err() {
            // Already terminal
            return;
        }

        if let Some(quote) = self.quotes.get_mut(rfq_id) {
            if quote.status == QuoteStatus::Sent && quote.transition(QuoteStatus::Rejected).is_ok()
            {
                self.store
                    .update_quote(rfq_id, |r| r.status = QuoteStatus::Rejected);
            }
        }
    }

    /// A counterparty accepted our quote
    pub fn accept_quote(&mut self, payload: &QuotePayload) -> Option<ConfirmJob> {
        let rfq_id = self.quote_index.get(&payload.quote_id)?.clone();
        let quote = self.quotes.get_mut(&rfq_id)?;

        if let Err(e) = quote.transition(QuoteStatus::Accepted) {
            warn!("Ignoring acceptance for quote {}: {}", payload.quote_id, e);
            return None;
        }

        self.store
            .update_quote(&rfq_id, |r| r.status = QuoteStatus::Accepted);
        self.store.record_acceptance(
            &payload.quote_id,
            &rfq_id,
            payload.accepted_side.clone(),
        );

        self.auto_confirm.then(|| ConfirmJob {
            quote_id: payload.quote_id.clone(),
        })
    }

    pub fn reject_quote(&mut self, quote_id: &str) {
        let Some(rfq_id) = self.quote_index.get(quote_id).cloned() else {
            return;
        };
        if let Some(quote) = self.quotes.get_mut(&rfq_id) {
            if quote.transition(QuoteStatus::Rejected).is_ok() {
                self.store
                    .update_quote(&rfq_id, |r| r.status = QuoteStatus::Rejected);
            }
        }
    }

    /// The venue (or our confirm call) confirmed the quote
    pub fn confirm_quote_status(&mut self, quote_id: &str) {
        let Some(rfq_id) = self.quote_index.get(quote_id).cloned() else {
            debug!("Confirmation for unknown quote {}", quote_id);
            return;
        };
        if let Some(quote) = self.quotes.get_mut(&rfq_id) {
            // A confirmation implies acceptance even if we missed the event
            if quote.status == QuoteStatus::Sent {
                let _ = quote.transition(QuoteStatus::Accepted);
            }
            if quote.transition(QuoteStatus::Confirmed).is_ok() {
                self.store
                    .update_quote(&rfq_id, |r| r.status = QuoteStatus::Confirmed);
            }
        }
    }

    /// Operator-requested confirmation
    pub fn request_confirm(&mut self, quote_id: &str) -> Result<ConfirmJob, CommandError> {
        let rfq_id = self
            .quote_index
            .get(quote_id)
            .ok_or_else(|| CommandError::UnknownQuote(quote_id.to_string()))?;
        let quote = self
            .quotes
            .get(rfq_id)
            .ok_or_else(|| CommandError::UnknownQuote(quote_id.to_string()))?;

        if quote.status != QuoteStatus::Accepted {
            return Err(CommandError::InvalidTransition(format!(
                "quote {} is {:?}, only Accepted quotes can be confirmed",
                quote_id, quote.status
            )));
        }

        Ok(ConfirmJob {
            quote_id: quote_id.to_string(),
        })
    }

    /// Expire open RFQs past their deadline and resolve their Sent quotes
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) {
        let expired: Vec<String> = self
            .rfqs
            .values()
            .filter(|r| r.is_open() && r.is_expired_at(now))
            .map(|r| r.rfq_id.clone())
            .collect();

        for rfq_id in expired {
            info!("RFQ {} expired", rfq_id);
            self.close_rfq(&rfq_id, RfqStatus::Expired);
        }
    }

    /// Record a (re)connection; on a reconnect, open RFQs lose confidence
    pub fn mark_connected(&mut self) {
        if self.has_connected {
            let mut stale = 0;
            for rfq in self.rfqs.values_mut().filter(|r| r.is_open()) {
                rfq.stale = true;
                stale += 1;
            }
            if stale > 0 {
                info!("Marked {} open RFQs stale after reconnect", stale);
            }
        }
        self.has_connected = true;
        self.store.set_connection(ConnectionStatus::Connected);
    }

    pub fn mark_disconnected(&mut self) {
        self.store.set_connection(ConnectionStatus::Disconnected);
    }

    pub fn rfq(&self, rfq_id: &str) -> Option<&Rfq> {
        self.rfqs.get(rfq_id)
    }

    pub fn quote_for_rfq(&self, rfq_id: &str) -> Option<&Quote> {
        self.quotes.get(rfq_id)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            rfqs: self.store.recent_rfqs(),
            quotes: self.store.recent_quotes(),
            acceptances: self.store.recent_acceptances(),
            legs: self.catalog.grouped(),
            target: self.matcher.target(),
            prices: self.prices,
            auto_confirm: self.auto_confirm,
            connection: self.store.connection(),
            last_error: self.store.last_error().map(String::from),
        }
    }
}

/// Drives [`EngineState`] from feed events and spawns network work on tokio
pub struct QuoteEngine {
    state: Arc<Mutex<EngineState>>,
    trading: Arc<TradingClient>,
    runtime: tokio::runtime::Handle,
}

impl QuoteEngine {
    pub fn new(
        config: &QuoterConfig,
        trading: Arc<TradingClient>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let mode = if config.quoting.exact_match {
            MatchMode::Exact
        } else {
            MatchMode::Superset
        };
        let state = EngineState::new(
            mode,
            PriceConfig {
                yes_bid: config.quoting.yes_bid,
                no_bid: config.quoting.no_bid,
            },
            config.quoting.auto_confirm,
            config.quoting.rest_remainder,
            FeedStore::new(config.store.history_limit, config.store.retention_limit),
        );

        Self {
            state: Arc::new(Mutex::new(state)),
            trading,
            runtime,
        }
    }

    /// Process one feed event; called from the single worker thread
    pub fn on_event(&self, event: FeedMessage) {
        match event {
            FeedMessage::RfqCreated(payload) => {
                let job = self.state.lock().register_rfq(&payload, Utc::now());
                if let Some(job) = job {
                    info!("RFQ match: {} ({} legs)", payload.id, payload.mve_selected_legs.len());
                    self.spawn_send(job);
                } else {
                    debug!("RFQ {}: no quote", payload.id);
                }
            }
            FeedMessage::RfqDeleted(payload) => {
                self.state
                    .lock()
                    .close_rfq(&payload.rfq_id, RfqStatus::Cancelled);
            }
            FeedMessage::RfqExpired(payload) => {
                self.state
                    .lock()
                    .close_rfq(&payload.rfq_id, RfqStatus::Expired);
            }
            FeedMessage::QuoteAccepted(payload) => {
                info!("Quote accepted: {} (rfq {})", payload.quote_id, payload.rfq_id);
                let job = self.state.lock().accept_quote(&payload);
                if let Some(job) = job {
                    self.spawn_confirm(job);
                }
            }
            FeedMessage::QuoteRejected(payload) => {
                self.state.lock().reject_quote(&payload.quote_id);
            }
            FeedMessage::QuoteConfirmed(payload) => {
                self.state.lock().confirm_quote_status(&payload.quote_id);
            }
            FeedMessage::Subscribed(payload) => {
                info!("Subscribed to {} (sid {})", payload.channel, payload.sid);
            }
            FeedMessage::Error(payload) => {
                warn!("Feed error {}: {}", payload.code, payload.msg);
                self.state.lock().store.set_last_error(payload.msg);
            }
            FeedMessage::Unknown => {
                debug!("Skipping unrecognized feed message");
            }
        }
    }

    /// Expiry sweep, driven by the worker's receive timeout ticks
    pub fn expire_sweep(&self) {
        self.state.lock().sweep_expired(Utc::now());
    }

    pub fn mark_connected(&self) {
        self.state.lock().mark_connected();
    }

    pub fn mark_disconnected(&self) {
        self.state.lock().mark_disconnected();
    }

    pub fn note_session_error(&self, error: String) {
        self.state.lock().store.set_last_error(error);
    }

    /// Backfill currently-open RFQs from REST; runs once at startup
    pub fn spawn_backfill(&self) {
        let state = Arc::clone(&self.state);
        let trading = Arc::clone(&self.trading);

        self.runtime.spawn(async move {
            let mut cursor: Option<String> = None;
            loop {
                let page = match trading.get_rfqs(cursor.as_deref()).await {
                    Ok(page) => page,
                    Err(e) => {
                        warn!("RFQ backfill failed: {}", e);
                        return;
                    }
                };

                let now = Utc::now();
                {
                    let mut s = state.lock();
                    for rfq in &page.rfqs {
                        s.register_backfill(rfq, now);
                    }
                }

                match page.cursor {
                    Some(next) if !next.is_empty() => cursor = Some(next),
                    _ => break,
                }
            }
            info!("RFQ backfill complete");
        });
    }

    fn spawn_send(&self, job: QuoteJob) {
        let state = Arc::clone(&self.state);
        let trading = Arc::clone(&self.trading);

        self.runtime.spawn(async move {
            // The RFQ may have gone terminal while this task was queued
            if !state.lock().begin_transmission(&job.rfq_id, Utc::now()) {
                info!("Quote for RFQ {} aborted before transmission", job.rfq_id);
                return;
            }

            match trading
                .create_quote(&job.rfq_id, job.yes_bid, job.no_bid, job.rest_remainder)
                .await
            {
                Ok(created) => {
                    info!("Quote {} sent for RFQ {}", created.quote_id, job.rfq_id);
                    state
                        .lock()
                        .complete_transmission(&job.rfq_id, &created.quote_id);
                }
                Err(e) => {
                    error!("Quote send failed for RFQ {}: {}", job.rfq_id, e);
                    state.lock().fail_transmission(&job.rfq_id, &e.to_string());
                }
            }
        });
    }

    fn spawn_confirm(&self, job: ConfirmJob) {
        let state = Arc::clone(&self.state);
        let trading = Arc::clone(&self.trading);

        self.runtime.spawn(async move {
            match trading.confirm_quote(&job.quote_id).await {
                Ok(()) => {
                    state.lock().confirm_quote_status(&job.quote_id);
                }
                Err(e) => {
                    // The quote stays Accepted; the operator can retry
                    error!("Confirm failed for quote {}: {}", job.quote_id, e);
                    state.lock().store.set_last_error(e.to_string());
                }
            }
        });
    }

    // Command surface

    pub fn set_target(&self, leg_ids: Vec<String>) -> Result<(), CommandError> {
        let mut s = self.state.lock();
        // Split-borrow: matcher validates against the catalog
        let EngineState {
            ref mut matcher,
            ref catalog,
            ..
        } = *s;
        matcher.set_target(leg_ids, catalog)
    }

    pub fn set_prices(&self, yes_bid: Decimal, no_bid: Decimal) -> Result<(), CommandError> {
        let prices = PriceConfig { yes_bid, no_bid };
        prices.validate()?;
        self.state.lock().prices = prices;
        Ok(())
    }

    pub fn set_auto_confirm(&self, enabled: bool) {
        self.state.lock().auto_confirm = enabled;
    }

    pub fn confirm(&self, quote_id: &str) -> Result<(), CommandError> {
        let job = self.state.lock().request_confirm(quote_id)?;
        self.spawn_confirm(job);
        Ok(())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.lock().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::infrastructure::client::feed::types::RfqLeg;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    fn state() -> EngineState {
        EngineState::new(
            MatchMode::Superset,
            PriceConfig {
                yes_bid: dec!(0.001),
                no_bid: dec!(0.56),
            },
            true,
            false,
            FeedStore::new(50, 200),
        )
    }

    fn leg(ticker: &str, side: Side) -> RfqLeg {
        RfqLeg {
            event_ticker: "EVENT".to_string(),
            market_ticker: ticker.to_string(),
            side,
        }
    }

    fn rfq_payload(id: &str, legs: Vec<RfqLeg>) -> RfqPayload {
        RfqPayload {
            id: id.to_string(),
            market_ticker: "KXSPORTSMULTIGAME-TEST".to_string(),
            contracts: 100,
            mve_selected_legs: legs,
            expiration_time: Some(Utc::now() + ChronoDuration::seconds(60)),
        }
    }

    fn two_leg_payload(id: &str) -> RfqPayload {
        rfq_payload(
            id,
            vec![
                leg("KXNFLGAME-25DET-GB", Side::Yes),
                leg("KXNBAGAME-25BOS-NYK", Side::No),
            ],
        )
    }

    fn set_two_leg_target(s: &mut EngineState) {
        let EngineState {
            ref mut matcher,
            ref catalog,
            ..
        } = *s;
        matcher
            .set_target(
                vec![
                    "YES:KXNFLGAME-25DET-GB".to_string(),
                    "NO:KXNBAGAME-25BOS-NYK".to_string(),
                ],
                catalog,
            )
            .unwrap();
    }

    #[test]
    fn two_leg_scenario_reserves_configured_prices() {
        let mut s = state();
        let now = Utc::now();

        // First sighting populates the catalog; empty target never matches
        assert!(s.register_rfq(&two_leg_payload("rfq-1"), now).is_none());

        set_two_leg_target(&mut s);

        // Superset: an RFQ carrying the target plus extras still matches
        let mut payload = two_leg_payload("rfq-2");
        payload
            .mve_selected_legs
            .push(leg("KXNHLGAME-25COL-DAL", Side::Yes));

        let job = s.register_rfq(&payload, now).unwrap();
        assert_eq!(job.rfq_id, "rfq-2");
        assert_eq!(job.yes_bid, dec!(0.001));
        assert_eq!(job.no_bid, dec!(0.56));
    }

    #[test]
    fn at_most_one_quote_under_duplicate_events() {
        let mut s = state();
        let now = Utc::now();

        s.register_rfq(&two_leg_payload("seed"), now);
        set_two_leg_target(&mut s);

        let payload = two_leg_payload("rfq-2");
        assert!(s.register_rfq(&payload, now).is_some());
        // Duplicate delivery of the same RFQ reserves nothing
        assert!(s.register_rfq(&payload, now).is_none());
        assert!(s.register_rfq(&payload, now).is_none());
    }

    #[test]
    fn expired_rfqs_are_never_quoted() {
        let mut s = state();
        let now = Utc::now();

        s.register_rfq(&two_leg_payload("seed"), now);
        set_two_leg_target(&mut s);

        let mut payload = two_leg_payload("rfq-2");
        payload.expiration_time = Some(now - ChronoDuration::seconds(1));
        assert!(s.register_rfq(&payload, now).is_none());
    }

    #[test]
    fn transmission_aborts_when_rfq_closes_mid_flight() {
        let mut s = state();
        let now = Utc::now();

        s.register_rfq(&two_leg_payload("seed"), now);
        set_two_leg_target(&mut s);

        let job = s.register_rfq(&two_leg_payload("rfq-2"), now).unwrap();

        // Cancellation lands between reservation and transmission; it
        // resolves the quote to Rejected and the abort must not rewrite that
        s.close_rfq("rfq-2", RfqStatus::Cancelled);
        assert!(!s.begin_transmission(&job.rfq_id, Utc::now()));

        let quote = s.quote_for_rfq("rfq-2").unwrap();
        assert_eq!(quote.status, QuoteStatus::Rejected);
        assert!(quote.error.is_none());

        let record = &s.store.recent_quotes()[0];
        assert_eq!(record.status, QuoteStatus::Rejected);
        assert!(record.error.is_none());
    }

    #[test]
    fn acceptance_flows_to_confirmed() {
        let mut s = state();
        let now = Utc::now();

        s.register_rfq(&two_leg_payload("seed"), now);
        set_two_leg_target(&mut s);

        let job = s.register_rfq(&two_leg_payload("rfq-2"), now).unwrap();
        assert!(s.begin_transmission(&job.rfq_id, now));
        s.complete_transmission("rfq-2", "q-9");

        let confirm = s
            .accept_quote(&QuotePayload {
                quote_id: "q-9".to_string(),
                rfq_id: "rfq-2".to_string(),
                market_ticker: String::new(),
                accepted_side: Some("yes".to_string()),
            })
            .unwrap();
        assert_eq!(confirm.quote_id, "q-9");

        s.confirm_quote_status("q-9");
        assert_eq!(
            s.quote_for_rfq("rfq-2").unwrap().status,
            QuoteStatus::Confirmed
        );
    }

    #[test]
    fn rejected_quotes_cannot_be_confirmed() {
        let mut s = state();
        let now = Utc::now();

        s.register_rfq(&two_leg_payload("seed"), now);
        set_two_leg_target(&mut s);

        let job = s.register_rfq(&two_leg_payload("rfq-2"), now).unwrap();
        assert!(s.begin_transmission(&job.rfq_id, now));
        s.complete_transmission("rfq-2", "q-9");
        s.reject_quote("q-9");

        let err = s.request_confirm("q-9").unwrap_err();
        assert!(matches!(err, CommandError::InvalidTransition(_)));

        let err = s.request_confirm("q-missing").unwrap_err();
        assert!(matches!(err, CommandError::UnknownQuote(_)));
    }

    #[test]
    fn sweep_expires_rfqs_and_resolves_sent_quotes() {
        let mut s = state();
        let now = Utc::now();

        s.register_rfq(&two_leg_payload("seed"), now);
        set_two_leg_target(&mut s);

        let mut payload = two_leg_payload("rfq-2");
        payload.expiration_time = Some(now + ChronoDuration::seconds(5));
        let job = s.register_rfq(&payload, now).unwrap();
        assert!(s.begin_transmission(&job.rfq_id, now));
        s.complete_transmission("rfq-2", "q-9");

        s.sweep_expired(now + ChronoDuration::seconds(10));

        assert_eq!(s.rfq("rfq-2").unwrap().status, RfqStatus::Expired);
        assert_eq!(
            s.quote_for_rfq("rfq-2").unwrap().status,
            QuoteStatus::Rejected
        );
    }

    #[test]
    fn catalog_and_target_survive_reconnect() {
        let mut s = state();
        let now = Utc::now();

        s.mark_connected();
        s.register_rfq(&two_leg_payload("rfq-1"), now);
        set_two_leg_target(&mut s);

        s.mark_disconnected();
        s.mark_connected();

        // Catalog and target untouched; the open RFQ is now stale
        assert_eq!(s.catalog.len(), 2);
        assert_eq!(s.matcher.target().len(), 2);
        assert!(s.rfq("rfq-1").unwrap().stale);

        // A fresh matching RFQ after the reconnect reserves exactly once
        let payload = two_leg_payload("rfq-2");
        assert!(s.register_rfq(&payload, now).is_some());
        assert!(s.register_rfq(&payload, now).is_none());
    }

    #[test]
    fn send_failure_records_error_and_allows_nothing_else() {
        let mut s = state();
        let now = Utc::now();

        s.register_rfq(&two_leg_payload("seed"), now);
        set_two_leg_target(&mut s);

        let job = s.register_rfq(&two_leg_payload("rfq-2"), now).unwrap();
        assert!(s.begin_transmission(&job.rfq_id, now));
        s.fail_transmission(&job.rfq_id, "connection reset");

        let quote = s.quote_for_rfq("rfq-2").unwrap();
        assert_eq!(quote.status, QuoteStatus::Error);
        assert_eq!(quote.error.as_deref(), Some("connection reset"));

        // An Error attempt does not block a later reservation
        assert!(s.register_rfq(&two_leg_payload("rfq-2"), now).is_some());
    }

    #[test]
    fn duplicate_rfq_events_record_history_once() {
        let mut s = state();
        let now = Utc::now();

        let payload = two_leg_payload("rfq-1");
        s.register_rfq(&payload, now);
        s.register_rfq(&payload, now);
        s.register_backfill(&payload, now);

        assert_eq!(s.store.recent_rfqs().len(), 1);
    }

    #[test]
    fn backfilled_rfqs_are_stale_and_unquoted() {
        let mut s = state();
        let now = Utc::now();

        s.register_rfq(&two_leg_payload("seed"), now);
        set_two_leg_target(&mut s);

        s.register_backfill(&two_leg_payload("rfq-2"), now);
        let rfq = s.rfq("rfq-2").unwrap();
        assert!(rfq.stale);
        assert!(s.quote_for_rfq("rfq-2").is_none());
    }
}
