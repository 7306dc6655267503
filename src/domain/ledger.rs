//! Single-asset cash/holdings ledger.
//!
//! Two states, two effective transitions:
//!
//! | state      | signal | effect                                            |
//! |------------|--------|---------------------------------------------------|
//! | Flat       | Buy    | holdings = round6(cash / price), cash = 0         |
//! | Positioned | Sell   | cash = round2(holdings * price), holdings = 0     |
//! | Flat       | Sell   | ignored (error in strict mode)                    |
//! | Positioned | Buy    | ignored (error in strict mode)                    |
//! | any        | Hold   | ignored                                           |
//!
//! Rounding is half away from zero, i.e. half-up for the non-negative amounts
//! handled here.
//!
//! A fill dropped for a degenerate price or a dust amount leaves the strategy
//! believing it traded. The opposite signal that follows is absorbed as a
//! no-op in both modes instead of being reported as redundant.

use chrono::{DateTime, Utc};
use std::fmt;

use super::error::RevtraderError;
use super::signal::{Side, Signal};

pub const QUANTITY_DECIMALS: i32 = 6;
pub const CASH_DECIMALS: i32 = 2;

/// Round `value` to `decimals` places, halves away from zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Positioned,
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionState::Flat => write!(f, "flat"),
            PositionState::Positioned => write!(f, "positioned"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerMode {
    /// Redundant signals are absorbed as no-ops.
    #[default]
    Lenient,
    /// Redundant signals are reported as `StateInvariantViolation`.
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    /// Position in the ledger; even indices are buys, odd indices sells.
    pub sequence_index: usize,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
    pub cash_after: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Hold,
    AlreadyFlat,
    AlreadyPositioned,
    DegeneratePrice,
    DustQuantity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Bought(TradeRecord),
    Sold(TradeRecord),
    Ignored(IgnoreReason),
}

impl Transition {
    pub fn trade(&self) -> Option<&TradeRecord> {
        match self {
            Transition::Bought(t) | Transition::Sold(t) => Some(t),
            Transition::Ignored(_) => None,
        }
    }
}

/// Ledger contents at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub initial_cash: f64,
    pub cash: f64,
    pub holdings_qty: f64,
    pub entry_price: Option<f64>,
    pub trades: Vec<TradeRecord>,
}

impl Ledger {
    pub fn state(&self) -> PositionState {
        if self.holdings_qty > 0.0 {
            PositionState::Positioned
        } else {
            PositionState::Flat
        }
    }

    /// Exactly one active balance once trading has started, entry price
    /// present iff holding, and trades alternating Buy/Sell from index 0.
    pub fn is_consistent(&self) -> bool {
        let untouched = self.trades.is_empty() && self.holdings_qty == 0.0;
        let exclusive = untouched || (self.cash > 0.0) != (self.holdings_qty > 0.0);
        let entry_matches = self.entry_price.is_some() == (self.holdings_qty > 0.0);
        let alternating = self.trades.iter().enumerate().all(|(i, t)| {
            t.sequence_index == i
                && t.side == if i % 2 == 0 { Side::Buy } else { Side::Sell }
        });
        exclusive && entry_matches && alternating
    }
}

#[derive(Debug, Clone)]
pub struct SimulationLedger {
    ledger: Ledger,
    mode: LedgerMode,
    /// Signal that closes out a fill this ledger dropped.
    orphaned: Option<Signal>,
}

impl SimulationLedger {
    pub fn new(initial_cash: f64) -> Self {
        Self::with_mode(initial_cash, LedgerMode::Lenient)
    }

    pub fn strict(initial_cash: f64) -> Self {
        Self::with_mode(initial_cash, LedgerMode::Strict)
    }

    /// `initial_cash` should be finite and positive. Anything else makes
    /// every Buy a dust fill, so the ledger never trades.
    pub fn with_mode(initial_cash: f64, mode: LedgerMode) -> Self {
        SimulationLedger {
            ledger: Ledger {
                initial_cash,
                cash: initial_cash,
                holdings_qty: 0.0,
                entry_price: None,
                trades: Vec::new(),
            },
            mode,
            orphaned: None,
        }
    }

    pub fn mode(&self) -> LedgerMode {
        self.mode
    }

    /// The signal that will be absorbed because its opening fill was dropped.
    pub fn orphaned_signal(&self) -> Option<Signal> {
        self.orphaned
    }

    pub fn state(&self) -> PositionState {
        self.ledger.state()
    }

    pub fn cash(&self) -> f64 {
        self.ledger.cash
    }

    pub fn holdings(&self) -> f64 {
        self.ledger.holdings_qty
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.ledger.entry_price
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.ledger.trades
    }

    pub fn snapshot(&self) -> Ledger {
        self.ledger.clone()
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    /// Apply one signal at `price`. Lenient ledgers never return `Err`.
    pub fn apply(
        &mut self,
        signal: Signal,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Transition, RevtraderError> {
        let state = self.state();
        let transition = match (state, signal) {
            (_, Signal::Hold) => Transition::Ignored(IgnoreReason::Hold),
            (PositionState::Flat, Signal::Sell) => {
                self.redundant(state, signal, IgnoreReason::AlreadyFlat)?
            }
            (PositionState::Positioned, Signal::Buy) => {
                self.redundant(state, signal, IgnoreReason::AlreadyPositioned)?
            }
            (PositionState::Flat, Signal::Buy) => self.buy(price, timestamp),
            (PositionState::Positioned, Signal::Sell) => self.sell(price, timestamp),
        };

        debug_assert!(self.ledger.is_consistent(), "ledger inconsistent after {signal}");
        Ok(transition)
    }

    fn redundant(
        &mut self,
        state: PositionState,
        signal: Signal,
        reason: IgnoreReason,
    ) -> Result<Transition, RevtraderError> {
        if self.orphaned == Some(signal) {
            self.orphaned = None;
            tracing::debug!(%state, %signal, "closing out a dropped fill");
            return Ok(Transition::Ignored(reason));
        }
        match self.mode {
            LedgerMode::Strict => Err(RevtraderError::StateInvariantViolation { state, signal }),
            LedgerMode::Lenient => {
                tracing::debug!(%state, %signal, "ignoring redundant signal");
                Ok(Transition::Ignored(reason))
            }
        }
    }

    fn buy(&mut self, price: f64, timestamp: DateTime<Utc>) -> Transition {
        if !(price.is_finite() && price > 0.0) {
            tracing::warn!(price, %timestamp, "cannot buy at non-positive price");
            self.orphaned = Some(Signal::Sell);
            return Transition::Ignored(IgnoreReason::DegeneratePrice);
        }

        let quantity = round_to(self.ledger.cash / price, QUANTITY_DECIMALS);
        if !quantity.is_finite() || quantity <= 0.0 {
            tracing::warn!(cash = self.ledger.cash, price, "buy quantity rounds to zero");
            self.orphaned = Some(Signal::Sell);
            return Transition::Ignored(IgnoreReason::DustQuantity);
        }

        self.orphaned = None;
        self.ledger.holdings_qty = quantity;
        self.ledger.entry_price = Some(price);
        self.ledger.cash = 0.0;

        let record = self.record(Side::Buy, price, quantity, timestamp);
        tracing::debug!(price, quantity, "buy");
        Transition::Bought(record)
    }

    fn sell(&mut self, price: f64, timestamp: DateTime<Utc>) -> Transition {
        if !(price.is_finite() && price > 0.0) {
            tracing::warn!(price, %timestamp, "cannot sell at non-positive price");
            self.orphaned = Some(Signal::Buy);
            return Transition::Ignored(IgnoreReason::DegeneratePrice);
        }

        let quantity = self.ledger.holdings_qty;
        let proceeds = round_to(quantity * price, CASH_DECIMALS);
        if proceeds <= 0.0 {
            tracing::warn!(quantity, price, "sell proceeds round to zero");
            self.orphaned = Some(Signal::Buy);
            return Transition::Ignored(IgnoreReason::DustQuantity);
        }

        self.orphaned = None;
        self.ledger.cash = proceeds;
        let record = self.record(Side::Sell, price, quantity, timestamp);
        self.ledger.holdings_qty = 0.0;
        self.ledger.entry_price = None;

        tracing::debug!(price, proceeds, "sell");
        Transition::Sold(record)
    }

    fn record(
        &mut self,
        side: Side,
        price: f64,
        quantity: f64,
        timestamp: DateTime<Utc>,
    ) -> TradeRecord {
        let record = TradeRecord {
            sequence_index: self.ledger.trades.len(),
            side,
            price,
            quantity,
            timestamp,
            cash_after: self.ledger.cash,
        };
        self.ledger.trades.push(record.clone());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + hour * 3600, 0).unwrap()
    }

    #[test]
    fn round_half_up_cash() {
        assert_eq!(round_to(0.125, CASH_DECIMALS), 0.13);
        assert_eq!(round_to(2.675_000_1, CASH_DECIMALS), 2.68);
        assert_eq!(round_to(1099.999_989, CASH_DECIMALS), 1100.0);
    }

    #[test]
    fn round_quantity_six_places() {
        assert_eq!(round_to(1000.0 / 90.0, QUANTITY_DECIMALS), 11.111111);
        assert_eq!(round_to(0.000_000_6, QUANTITY_DECIMALS), 0.000001);
        assert_eq!(round_to(0.000_000_4, QUANTITY_DECIMALS), 0.0);
    }

    #[test]
    fn new_ledger_is_flat() {
        let ledger = SimulationLedger::new(1000.0);
        assert_eq!(ledger.state(), PositionState::Flat);
        assert_eq!(ledger.cash(), 1000.0);
        assert_eq!(ledger.holdings(), 0.0);
        assert_eq!(ledger.entry_price(), None);
        assert!(ledger.trades().is_empty());
        assert_eq!(ledger.mode(), LedgerMode::Lenient);
        assert!(ledger.snapshot().is_consistent());
    }

    #[test]
    fn buy_moves_all_cash_into_holdings() {
        let mut ledger = SimulationLedger::new(1000.0);
        let t = ledger.apply(Signal::Buy, 90.0, ts(0)).unwrap();

        let record = match t {
            Transition::Bought(r) => r,
            other => panic!("expected buy, got {other:?}"),
        };
        assert_eq!(record.sequence_index, 0);
        assert_eq!(record.side, Side::Buy);
        assert_eq!(record.price, 90.0);
        assert_eq!(record.quantity, 11.111111);
        assert_eq!(record.cash_after, 0.0);
        assert_eq!(record.timestamp, ts(0));

        assert_eq!(ledger.state(), PositionState::Positioned);
        assert_eq!(ledger.cash(), 0.0);
        assert_eq!(ledger.holdings(), 11.111111);
        assert_eq!(ledger.entry_price(), Some(90.0));
    }

    #[test]
    fn sell_returns_to_cash() {
        let mut ledger = SimulationLedger::new(1000.0);
        ledger.apply(Signal::Buy, 90.0, ts(0)).unwrap();
        let t = ledger.apply(Signal::Sell, 99.0, ts(1)).unwrap();

        let record = t.trade().cloned().unwrap();
        assert_eq!(record.sequence_index, 1);
        assert_eq!(record.side, Side::Sell);
        assert_eq!(record.quantity, 11.111111);
        assert_eq!(record.cash_after, 1100.0);

        assert_eq!(ledger.state(), PositionState::Flat);
        assert_eq!(ledger.cash(), 1100.0);
        assert_eq!(ledger.holdings(), 0.0);
        assert_eq!(ledger.entry_price(), None);
        assert!(ledger.snapshot().is_consistent());
    }

    #[test]
    fn flat_sell_is_noop() {
        let mut ledger = SimulationLedger::new(1000.0);
        let t = ledger.apply(Signal::Sell, 100.0, ts(0)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::AlreadyFlat));
        assert_eq!(ledger.cash(), 1000.0);
        assert_eq!(ledger.holdings(), 0.0);
        assert!(ledger.trades().is_empty());
    }

    #[test]
    fn positioned_buy_is_noop() {
        let mut ledger = SimulationLedger::new(1000.0);
        ledger.apply(Signal::Buy, 100.0, ts(0)).unwrap();
        let before = ledger.snapshot();
        let t = ledger.apply(Signal::Buy, 50.0, ts(1)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::AlreadyPositioned));
        assert_eq!(ledger.snapshot(), before);
    }

    #[test]
    fn hold_is_noop_in_both_states() {
        let mut ledger = SimulationLedger::strict(1000.0);
        assert_eq!(
            ledger.apply(Signal::Hold, 100.0, ts(0)).unwrap(),
            Transition::Ignored(IgnoreReason::Hold)
        );
        ledger.apply(Signal::Buy, 100.0, ts(1)).unwrap();
        let before = ledger.snapshot();
        ledger.apply(Signal::Hold, 200.0, ts(2)).unwrap();
        assert_eq!(ledger.snapshot(), before);
    }

    #[test]
    fn strict_flat_sell_is_error() {
        let mut ledger = SimulationLedger::strict(1000.0);
        let err = ledger.apply(Signal::Sell, 100.0, ts(0)).unwrap_err();
        assert!(matches!(
            err,
            RevtraderError::StateInvariantViolation {
                state: PositionState::Flat,
                signal: Signal::Sell
            }
        ));
        assert_eq!(ledger.cash(), 1000.0);
        assert!(ledger.trades().is_empty());
    }

    #[test]
    fn strict_positioned_buy_is_error() {
        let mut ledger = SimulationLedger::strict(1000.0);
        ledger.apply(Signal::Buy, 100.0, ts(0)).unwrap();
        let err = ledger.apply(Signal::Buy, 100.0, ts(1)).unwrap_err();
        assert!(matches!(
            err,
            RevtraderError::StateInvariantViolation {
                state: PositionState::Positioned,
                ..
            }
        ));
        assert_eq!(ledger.trades().len(), 1);
    }

    #[test]
    fn zero_price_buy_is_ignored() {
        let mut ledger = SimulationLedger::strict(1000.0);
        let t = ledger.apply(Signal::Buy, 0.0, ts(0)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::DegeneratePrice));
        assert_eq!(ledger.state(), PositionState::Flat);
        assert_eq!(ledger.cash(), 1000.0);
    }

    #[test]
    fn zero_price_sell_is_ignored() {
        let mut ledger = SimulationLedger::new(1000.0);
        ledger.apply(Signal::Buy, 10.0, ts(0)).unwrap();
        let t = ledger.apply(Signal::Sell, 0.0, ts(1)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::DegeneratePrice));
        assert_eq!(ledger.state(), PositionState::Positioned);
    }

    #[test]
    fn dust_buy_is_ignored() {
        let mut ledger = SimulationLedger::new(0.01);
        let t = ledger.apply(Signal::Buy, 1_000_000.0, ts(0)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::DustQuantity));
        assert_eq!(ledger.cash(), 0.01);
        assert!(ledger.trades().is_empty());
    }

    #[test]
    fn dust_sell_is_ignored() {
        let mut ledger = SimulationLedger::new(1.0);
        ledger.apply(Signal::Buy, 1.0, ts(0)).unwrap();
        let t = ledger.apply(Signal::Sell, 0.001, ts(1)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::DustQuantity));
        assert_eq!(ledger.holdings(), 1.0);
        assert!(ledger.snapshot().is_consistent());
    }

    #[test]
    fn sell_after_dropped_buy_is_absorbed_in_strict_mode() {
        let mut ledger = SimulationLedger::strict(0.01);
        let t = ledger.apply(Signal::Buy, 900_000.0, ts(0)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::DustQuantity));
        assert_eq!(ledger.orphaned_signal(), Some(Signal::Sell));

        ledger.apply(Signal::Hold, 950_000.0, ts(1)).unwrap();
        let t = ledger.apply(Signal::Sell, 1_000_000.0, ts(2)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::AlreadyFlat));
        assert_eq!(ledger.orphaned_signal(), None);

        // Only one Sell is excused.
        assert!(ledger.apply(Signal::Sell, 1_000_000.0, ts(3)).is_err());
        assert_eq!(ledger.cash(), 0.01);
    }

    #[test]
    fn buy_after_dropped_sell_is_absorbed_in_strict_mode() {
        let mut ledger = SimulationLedger::strict(1000.0);
        ledger.apply(Signal::Buy, 10.0, ts(0)).unwrap();
        let t = ledger.apply(Signal::Sell, 0.0, ts(1)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::DegeneratePrice));

        let t = ledger.apply(Signal::Buy, 9.0, ts(2)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::AlreadyPositioned));
        assert_eq!(ledger.holdings(), 100.0);
        assert!(ledger.apply(Signal::Sell, 12.0, ts(3)).unwrap().trade().is_some());
    }

    #[test]
    fn successful_fill_clears_dropped_fill() {
        let mut ledger = SimulationLedger::strict(1000.0);
        ledger.apply(Signal::Buy, 0.0, ts(0)).unwrap();
        ledger.apply(Signal::Buy, 10.0, ts(1)).unwrap();
        assert_eq!(ledger.orphaned_signal(), None);
        ledger.apply(Signal::Sell, 11.0, ts(2)).unwrap();
        assert!(ledger.apply(Signal::Sell, 12.0, ts(3)).is_err());
    }

    #[test]
    fn nan_cash_never_buys() {
        let mut ledger = SimulationLedger::new(f64::NAN);
        let t = ledger.apply(Signal::Buy, 10.0, ts(0)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::DustQuantity));
        assert_eq!(ledger.state(), PositionState::Flat);
        assert_eq!(ledger.holdings(), 0.0);
        assert!(ledger.trades().is_empty());

        let mut ledger = SimulationLedger::new(-50.0);
        let t = ledger.apply(Signal::Buy, 10.0, ts(0)).unwrap();
        assert_eq!(t, Transition::Ignored(IgnoreReason::DustQuantity));
    }

    #[test]
    fn round_trips_alternate_sides() {
        let mut ledger = SimulationLedger::new(1000.0);
        for (i, (signal, price)) in [
            (Signal::Buy, 10.0),
            (Signal::Buy, 9.0),
            (Signal::Sell, 11.0),
            (Signal::Sell, 12.0),
            (Signal::Buy, 10.0),
            (Signal::Sell, 10.5),
        ]
        .into_iter()
        .enumerate()
        {
            ledger.apply(signal, price, ts(i as i64)).unwrap();
        }
        let sides: Vec<Side> = ledger.trades().iter().map(|t| t.side).collect();
        assert_eq!(sides, vec![Side::Buy, Side::Sell, Side::Buy, Side::Sell]);
        assert!(ledger.snapshot().is_consistent());
    }

    #[test]
    fn into_ledger_matches_snapshot() {
        let mut ledger = SimulationLedger::new(500.0);
        ledger.apply(Signal::Buy, 25.0, ts(0)).unwrap();
        let snapshot = ledger.snapshot();
        assert_eq!(ledger.into_ledger(), snapshot);
    }

    #[test]
    fn inconsistent_ledger_is_detected() {
        let ledger = Ledger {
            initial_cash: 100.0,
            cash: 50.0,
            holdings_qty: 1.0,
            entry_price: Some(50.0),
            trades: vec![],
        };
        assert!(!ledger.is_consistent());
    }
}
