use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned across the operator command surface
///
/// Nothing on the command surface panics; every rejected command maps to one
/// of these variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown leg: {0}")]
    UnknownLeg(String),

    #[error("Unknown quote: {0}")]
    UnknownQuote(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),
}

/// Which side of a market a leg takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical leg identity: `SIDE:MARKET_TICKER`, upper-cased
///
/// The venue supplies no stable leg id, so identity is this normalized
/// composite. Two observations of the same side/ticker pair are the same leg.
pub fn leg_id(side: &str, market_ticker: &str) -> String {
    format!("{}:{}", side, market_ticker).to_uppercase()
}

/// One leg of a parlay, as discovered from RFQ traffic
///
/// Immutable once discovered; the catalog never removes or rewrites legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leg {
    /// Normalized `SIDE:MARKET_TICKER` identity
    pub id: String,
    pub event_ticker: String,
    pub market_ticker: String,
    pub side: Side,
    /// Sport bucket derived from the ticker (NFL, NBA, NHL, Other)
    pub sport: String,
    /// Category bucket within the sport (Moneylines, Spreads, ...)
    pub category: String,
    /// Human-readable label, e.g. "yes KXNFLGAME-..."
    pub display_label: String,
}

impl Leg {
    pub fn new(event_ticker: &str, market_ticker: &str, side: Side) -> Self {
        let (sport, category) = classify_market(market_ticker);
        Self {
            id: leg_id(side.as_str(), market_ticker),
            event_ticker: event_ticker.to_string(),
            market_ticker: market_ticker.to_string(),
            side,
            sport: sport.to_string(),
            category: category.to_string(),
            display_label: format!("{} {}", side, market_ticker),
        }
    }
}

/// Bucket a market ticker into (sport, category) for the grouped leg listing
///
/// Heuristics over Kalshi's sports ticker naming. Anything unrecognized lands
/// in ("Other", "Unknown") rather than being dropped.
fn classify_market(market_ticker: &str) -> (&'static str, &'static str) {
    let ticker = market_ticker.to_uppercase();
    // Over/under legs surface as totals even without a TOTL ticker
    let side_hints_total = ticker.contains("OVER") || ticker.contains("UNDER");

    if ticker.contains("NFL") {
        if ticker.contains("SPRD") || ticker.contains("SPREAD") {
            ("NFL", "Spreads")
        } else if ticker.contains("TOTL") || ticker.contains("TOTAL") || side_hints_total {
            ("NFL", "Totals")
        } else if ticker.contains("NFLGAME") {
            ("NFL", "Moneylines")
        } else if ticker.contains("NFLANYTD") || ticker.contains("NFLFIRSTTD") {
            ("NFL", "Player Props - Touchdowns")
        } else if ticker.contains("NFLSINGLEGAME") {
            if ticker.contains("PASS") || ticker.contains("YDS") {
                ("NFL", "Player Props - Passing")
            } else if ticker.contains("RUSH") {
                ("NFL", "Player Props - Rushing")
            } else if ticker.contains("REC") {
                ("NFL", "Player Props - Receiving")
            } else {
                ("NFL", "Player Props - Other")
            }
        } else {
            ("NFL", "Other")
        }
    } else if ticker.contains("NBA") {
        if ticker.contains("SPRD") || ticker.contains("SPREAD") {
            ("NBA", "Spreads")
        } else if ticker.contains("TOTL") || ticker.contains("TOTAL") || side_hints_total {
            ("NBA", "Totals")
        } else if ticker.contains("NBAGAME") {
            ("NBA", "Moneylines")
        } else if ticker.contains("NBAPTS") || ticker.contains("POINTS") {
            ("NBA", "Player Props - Points")
        } else if ticker.contains("AST") || ticker.contains("ASSISTS") {
            ("NBA", "Player Props - Assists")
        } else if ticker.contains("REB") || ticker.contains("REBOUNDS") {
            ("NBA", "Player Props - Rebounds")
        } else if ticker.contains("THREE") || ticker.contains("3PT") {
            ("NBA", "Player Props - Threes")
        } else if ticker.contains("NBASINGLEGAME") {
            ("NBA", "Player Props - Other")
        } else {
            ("NBA", "Other")
        }
    } else if ticker.contains("NHL") {
        if ticker.contains("SPRD") || ticker.contains("SPREAD") {
            ("NHL", "Spreads")
        } else if ticker.contains("TOTL") || ticker.contains("TOTAL") || side_hints_total {
            ("NHL", "Totals")
        } else if ticker.contains("NHLGAME") {
            ("NHL", "Moneylines")
        } else {
            ("NHL", "Other")
        }
    } else if ticker.contains("SPORTSMULTIGAME") {
        ("Other", "Multi-Game Parlays")
    } else {
        ("Other", "Unknown")
    }
}

/// RFQ lifecycle status (monotonic: Open is the only non-terminal state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RfqStatus {
    Open,
    Cancelled,
    Expired,
}

/// An RFQ observed on the communications feed
#[derive(Debug, Clone, Serialize)]
pub struct Rfq {
    pub rfq_id: String,
    /// Leg ids in feed order
    pub leg_ids: Vec<String>,
    pub market_ticker: String,
    pub contracts: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: RfqStatus,
    /// Set when the RFQ was open across a reconnect; its liveness is no
    /// longer trusted
    pub stale: bool,
}

impl Rfq {
    pub fn is_open(&self) -> bool {
        self.status == RfqStatus::Open
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |t| now >= t)
    }

    /// Apply a monotonic status transition
    ///
    /// Terminal states never revert; a terminal-to-anything transition is
    /// rejected.
    pub fn transition(&mut self, to: RfqStatus) -> Result<(), CommandError> {
        match (self.status, to) {
            (RfqStatus::Open, RfqStatus::Cancelled) | (RfqStatus::Open, RfqStatus::Expired) => {
                self.status = to;
                Ok(())
            }
            (from, to) if from == to => Ok(()),
            (from, to) => Err(CommandError::InvalidTransition(format!(
                "rfq {}: {:?} -> {:?}",
                self.rfq_id, from, to
            ))),
        }
    }
}

/// Quote lifecycle status
///
/// `Sent -> {Accepted, Rejected, Error}`, then `Accepted -> Confirmed`.
/// Rejected, Error, and Confirmed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Sent,
    Accepted,
    Rejected,
    Error,
    Confirmed,
}

impl QuoteStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QuoteStatus::Rejected | QuoteStatus::Error | QuoteStatus::Confirmed
        )
    }

    fn can_transition_to(&self, to: QuoteStatus) -> bool {
        matches!(
            (self, to),
            (QuoteStatus::Sent, QuoteStatus::Accepted)
                | (QuoteStatus::Sent, QuoteStatus::Rejected)
                | (QuoteStatus::Sent, QuoteStatus::Error)
                | (QuoteStatus::Accepted, QuoteStatus::Confirmed)
        )
    }
}

/// A quote we have sent (or reserved to send) for one RFQ
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    /// Venue-assigned id; None while the create request is in flight
    pub quote_id: Option<String>,
    pub rfq_id: String,
    pub yes_bid: Decimal,
    pub no_bid: Decimal,
    pub sent_at: DateTime<Utc>,
    pub status: QuoteStatus,
    /// Failure reason when status is Error
    pub error: Option<String>,
}

impl Quote {
    /// Apply a status transition, rejecting anything off the machine
    pub fn transition(&mut self, to: QuoteStatus) -> Result<(), CommandError> {
        if self.status == to {
            return Ok(());
        }
        if !self.status.can_transition_to(to) {
            return Err(CommandError::InvalidTransition(format!(
                "quote for rfq {}: {:?} -> {:?}",
                self.rfq_id, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }
}

/// Fixed quote prices, read fresh at quote-build time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceConfig {
    pub yes_bid: Decimal,
    pub no_bid: Decimal,
}

impl PriceConfig {
    /// Validate that both bids are inside the venue's open interval (0, 1)
    pub fn validate(&self) -> Result<(), CommandError> {
        for (name, price) in [("yes_bid", self.yes_bid), ("no_bid", self.no_bid)] {
            if price <= Decimal::ZERO || price >= Decimal::ONE {
                return Err(CommandError::InvalidPrice(format!(
                    "{} must be in (0, 1), got {}",
                    name, price
                )));
            }
        }
        Ok(())
    }
}

/// Render a price the way the venue expects it on the wire: a 4-dp string
/// such as "0.0010" or "0.5600"
pub fn wire_price(price: Decimal) -> String {
    format!("{:.4}", price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn leg_identity_is_normalized() {
        assert_eq!(leg_id("yes", "kxnflgame-foo"), "YES:KXNFLGAME-FOO");
        assert_eq!(leg_id("NO", "KXNBAGAME-BAR"), "NO:KXNBAGAME-BAR");
    }

    #[test]
    fn classifies_sports_tickers() {
        let leg = Leg::new("EV", "KXNFLGAME-25DET-GB", Side::Yes);
        assert_eq!(leg.sport, "NFL");
        assert_eq!(leg.category, "Moneylines");

        let leg = Leg::new("EV", "KXNBASPRD-25BOS-NYK", Side::No);
        assert_eq!(leg.sport, "NBA");
        assert_eq!(leg.category, "Spreads");

        let leg = Leg::new("EV", "KXNHLTOTL-25COL-DAL", Side::Yes);
        assert_eq!(leg.sport, "NHL");
        assert_eq!(leg.category, "Totals");

        let leg = Leg::new("EV", "KXWEATHER-NYC", Side::Yes);
        assert_eq!(leg.sport, "Other");
        assert_eq!(leg.category, "Unknown");
    }

    #[test]
    fn rfq_transitions_are_monotonic() {
        let mut rfq = Rfq {
            rfq_id: "r1".into(),
            leg_ids: vec![],
            market_ticker: "T".into(),
            contracts: 10,
            created_at: Utc::now(),
            expires_at: None,
            status: RfqStatus::Open,
            stale: false,
        };

        rfq.transition(RfqStatus::Cancelled).unwrap();
        assert!(rfq.transition(RfqStatus::Open).is_err());
        assert!(rfq.transition(RfqStatus::Expired).is_err());
        // Re-applying the current status is a no-op, not an error
        rfq.transition(RfqStatus::Cancelled).unwrap();
    }

    #[test]
    fn rejected_quote_is_terminal() {
        let mut quote = Quote {
            quote_id: Some("q1".into()),
            rfq_id: "r1".into(),
            yes_bid: dec!(0.001),
            no_bid: dec!(0.56),
            sent_at: Utc::now(),
            status: QuoteStatus::Sent,
            error: None,
        };

        quote.transition(QuoteStatus::Rejected).unwrap();
        assert!(quote.transition(QuoteStatus::Accepted).is_err());
        assert!(quote.transition(QuoteStatus::Confirmed).is_err());
    }

    #[test]
    fn accepted_quote_confirms() {
        let mut quote = Quote {
            quote_id: Some("q1".into()),
            rfq_id: "r1".into(),
            yes_bid: dec!(0.001),
            no_bid: dec!(0.56),
            sent_at: Utc::now(),
            status: QuoteStatus::Sent,
            error: None,
        };

        quote.transition(QuoteStatus::Accepted).unwrap();
        quote.transition(QuoteStatus::Confirmed).unwrap();
        assert!(quote.status.is_terminal());
    }

    #[test]
    fn prices_validate_open_interval() {
        assert!(PriceConfig {
            yes_bid: dec!(0.001),
            no_bid: dec!(0.56),
        }
        .validate()
        .is_ok());

        assert!(PriceConfig {
            yes_bid: dec!(0),
            no_bid: dec!(0.56),
        }
        .validate()
        .is_err());

        assert!(PriceConfig {
            yes_bid: dec!(0.001),
            no_bid: dec!(1),
        }
        .validate()
        .is_err());
    }

    #[test]
    fn wire_prices_are_four_decimal_places() {
        assert_eq!(wire_price(dec!(0.001)), "0.0010");
        assert_eq!(wire_price(dec!(0.56)), "0.5600");
        assert_eq!(wire_price(dec!(0.1234)), "0.1234");
    }
}
