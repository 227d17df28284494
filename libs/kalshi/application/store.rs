//! Bounded in-memory history of feed activity
//!
//! Everything an operator-facing surface needs to render: RFQs seen, quotes
//! sent and their outcomes, acceptances, connection status, and the last
//! error. Histories are bounded; the retention limit caps memory and the
//! history limit caps what a snapshot exposes.

use crate::domain::models::{wire_price, Leg, PriceConfig, QuoteStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Feed connection status as seen by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
}

/// One RFQ observation
#[derive(Debug, Clone, Serialize)]
pub struct RfqRecord {
    pub rfq_id: String,
    pub market_ticker: String,
    pub contracts: u64,
    pub legs: Vec<String>,
    pub matched: bool,
    pub at: DateTime<Utc>,
}

/// One quote attempt and its outcome so far
#[derive(Debug, Clone, Serialize)]
pub struct QuoteRecord {
    pub rfq_id: String,
    pub quote_id: Option<String>,
    pub yes_bid: String,
    pub no_bid: String,
    pub status: QuoteStatus,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// One acceptance notification
#[derive(Debug, Clone, Serialize)]
pub struct AcceptanceRecord {
    pub quote_id: String,
    pub rfq_id: String,
    pub accepted_side: Option<String>,
    pub at: DateTime<Utc>,
}

/// Full state snapshot for the operator surface
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub rfqs: Vec<RfqRecord>,
    pub quotes: Vec<QuoteRecord>,
    pub acceptances: Vec<AcceptanceRecord>,
    pub legs: BTreeMap<String, BTreeMap<String, Vec<Leg>>>,
    pub target: Vec<String>,
    pub prices: PriceConfig,
    pub auto_confirm: bool,
    pub connection: ConnectionStatus,
    pub last_error: Option<String>,
}

/// Bounded history store
#[derive(Debug)]
pub struct FeedStore {
    history_limit: usize,
    retention_limit: usize,
    rfqs: VecDeque<RfqRecord>,
    quotes: VecDeque<QuoteRecord>,
    acceptances: VecDeque<AcceptanceRecord>,
    connection: ConnectionStatus,
    last_error: Option<String>,
}

impl FeedStore {
    pub fn new(history_limit: usize, retention_limit: usize) -> Self {
        Self {
            history_limit,
            retention_limit: retention_limit.max(history_limit),
            rfqs: VecDeque::new(),
            quotes: VecDeque::new(),
            acceptances: VecDeque::new(),
            connection: ConnectionStatus::Disconnected,
            last_error: None,
        }
    }

    pub fn record_rfq(
        &mut self,
        rfq_id: &str,
        market_ticker: &str,
        contracts: u64,
        legs: Vec<String>,
        matched: bool,
    ) {
        let record = RfqRecord {
            rfq_id: rfq_id.to_string(),
            market_ticker: market_ticker.to_string(),
            contracts,
            legs,
            matched,
            at: Utc::now(),
        };
        push_bounded(&mut self.rfqs, record, self.retention_limit);
    }

    pub fn record_quote(&mut self, rfq_id: &str, yes_bid: Decimal, no_bid: Decimal) {
        let record = QuoteRecord {
            rfq_id: rfq_id.to_string(),
            quote_id: None,
            yes_bid: wire_price(yes_bid),
            no_bid: wire_price(no_bid),
            status: QuoteStatus::Sent,
            error: None,
            at: Utc::now(),
        };
        push_bounded(&mut self.quotes, record, self.retention_limit);
    }

    /// Update the most recent quote record for an RFQ
    pub fn update_quote(&mut self, rfq_id: &str, update: impl FnOnce(&mut QuoteRecord)) {
        if let Some(record) = self
            .quotes
            .iter_mut()
            .rev()
            .find(|r| r.rfq_id == rfq_id)
        {
            update(record);
        }
    }

    pub fn record_acceptance(&mut self, quote_id: &str, rfq_id: &str, accepted_side: Option<String>) {
        let record = AcceptanceRecord {
            quote_id: quote_id.to_string(),
            rfq_id: rfq_id.to_string(),
            accepted_side,
            at: Utc::now(),
        };
        push_bounded(&mut self.acceptances, record, self.retention_limit);
    }

    pub fn set_connection(&mut self, status: ConnectionStatus) {
        self.connection = status;
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn set_last_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Most recent entries, newest first, capped at the history limit
    pub fn recent_rfqs(&self) -> Vec<RfqRecord> {
        recent(&self.rfqs, self.history_limit)
    }

    pub fn recent_quotes(&self) -> Vec<QuoteRecord> {
        recent(&self.quotes, self.history_limit)
    }

    pub fn recent_acceptances(&self) -> Vec<AcceptanceRecord> {
        recent(&self.acceptances, self.history_limit)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, retention: usize) {
    queue.push_back(item);
    while queue.len() > retention {
        queue.pop_front();
    }
}

fn recent<T: Clone>(queue: &VecDeque<T>, limit: usize) -> Vec<T> {
    queue.iter().rev().take(limit).cloned().collect()
}
