//! Exchange controller: validates requests, gates orders with the standard
//! margin model, submits them to the instrument book and reshapes account
//! state from the resulting fills.

use crate::accounts::{AccountStore, Position, Transfer, UserTrade};
use crate::broker::{PUBLIC_SUBS_TOPIC, Producer, TRADES_TOPIC};
use crate::error::{ExchangeError, ExchangeResult};
use crate::exchange::ticker::{ChannelEvent, TickerData, build_ticker};
use crate::markets::{Currency, Index, IndexBus, Instrument, Listing};
use crate::matching::{
    CancelOrder, LimitOrder, MarketOrder, Order, OrderSnapshot, ProcessReport, Side, TimeInForce,
    Trade,
};
use crate::risk::{margin_delta, total_margin_required};
use crate::utils::current_time_micros;
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A validated order request from the RPC layer.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub from: String,
    pub instrument_name: String,
    pub side: Side,
    pub order_type: OrderType,
    pub amount: Decimal,
    pub leverage: u32,
    /// Limit price; ignored for market orders.
    pub price: Option<Decimal>,
    pub time_in_force: TimeInForce,
}

/// Order flavor accepted over RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,
    Market,
}

/// Result of a successful order placement.
#[derive(Debug, Serialize)]
pub struct OrderPlacement {
    pub order: OrderSnapshot,
    pub trades: Vec<Trade>,
}

/// The exchange core shared by the RPC server and background tasks.
pub struct Exchange {
    pub(crate) producer: Producer,
    pub(crate) index_bus: Arc<IndexBus>,
    pub(crate) tradable_assets: Vec<Currency>,
    pub(crate) indices: Vec<Index>,
    pub(crate) instruments: Vec<Instrument>,
    instrument_idx: HashMap<String, usize>,
    index_idx: HashMap<String, usize>,
    supported_collateral: Vec<String>,
    pub(crate) accounts: AccountStore,
    /// Per-instrument trade log, append-only.
    pub(crate) trades: DashMap<String, Vec<Trade>>,
    /// Latest published ticker per instrument.
    pub(crate) tickers: DashMap<String, TickerData>,
}

impl Exchange {
    pub fn new(listing: Listing, index_bus: Arc<IndexBus>, producer: Producer) -> Arc<Self> {
        let Listing {
            tradable_assets,
            currencies,
            indices,
            instruments,
        } = listing;

        let supported_collateral: Vec<String> = currencies
            .iter()
            .filter(|currency| currency.is_collateral)
            .map(|currency| currency.symbol.clone())
            .collect();
        let instrument_names: Vec<String> =
            instruments.iter().map(|i| i.name.clone()).collect();

        let instrument_idx = instrument_names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        let index_idx = indices
            .iter()
            .enumerate()
            .map(|(idx, index)| (index.name.clone(), idx))
            .collect();

        let trades = DashMap::new();
        for name in &instrument_names {
            trades.insert(name.clone(), Vec::new());
        }

        let exchange = Arc::new(Self {
            producer,
            index_bus,
            tradable_assets,
            indices,
            instruments,
            instrument_idx,
            index_idx,
            accounts: AccountStore::new(supported_collateral.clone(), instrument_names),
            supported_collateral,
            trades,
            tickers: DashMap::new(),
        });

        // Every book publishes its trades through the shared producer; the
        // enqueue happens on the matching path, before account mutation.
        for instrument in &exchange.instruments {
            let producer = exchange.producer.clone();
            instrument.book.set_trade_listener(Arc::new(move |envelope| {
                producer.produce(TRADES_TOPIC, envelope);
            }));
        }

        info!(
            instruments = exchange.instruments.len(),
            indices = exchange.indices.len(),
            "exchange controller initialized"
        );
        exchange
    }

    pub fn instrument(&self, name: &str) -> ExchangeResult<&Instrument> {
        self.instrument_idx
            .get(name)
            .map(|idx| &self.instruments[*idx])
            .ok_or_else(|| ExchangeError::InvalidArgument(format!("unknown instrument {name}")))
    }

    pub fn index(&self, name: &str) -> ExchangeResult<&Index> {
        self.index_idx
            .get(name)
            .map(|idx| &self.indices[*idx])
            .ok_or_else(|| ExchangeError::InvalidArgument(format!("unknown index {name}")))
    }

    /// The collateral currency margin is denominated in.
    pub fn collateral_symbol(&self) -> &str {
        self.supported_collateral
            .first()
            .map(String::as_str)
            .unwrap_or("USDC")
    }

    /// Oracle write path into the index bus.
    pub fn set_index_price(&self, index_name: &str, price: Decimal) {
        self.index_bus.set(index_name, price);
    }

    // ------------------------------------------------------------------
    // Collateral transfers
    // ------------------------------------------------------------------

    pub fn deposit(
        &self,
        from: &str,
        currency: &str,
        amount: Decimal,
    ) -> ExchangeResult<Transfer> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidArgument(
                "deposit amount must be positive".to_string(),
            ));
        }
        if !self.supported_collateral.iter().any(|c| c == currency) {
            return Err(ExchangeError::UnsupportedCollateral(currency.to_string()));
        }

        self.accounts.ensure(from);
        let mut account = self.accounts.write(from);
        let balance = account.collateral.entry(currency.to_string()).or_default();
        *balance += amount;
        let transfer = Transfer {
            amount,
            balance: *balance,
            currency: currency.to_string(),
            status: "confirmed",
        };
        account
            .deposits
            .entry(currency.to_string())
            .or_default()
            .push(transfer.clone());
        debug!(from, currency, %amount, "deposit confirmed");
        Ok(transfer)
    }

    pub fn withdraw(
        &self,
        from: &str,
        currency: &str,
        amount: Decimal,
    ) -> ExchangeResult<Transfer> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidArgument(
                "withdrawal amount must be positive".to_string(),
            ));
        }
        if !self.supported_collateral.iter().any(|c| c == currency) {
            return Err(ExchangeError::UnsupportedCollateral(currency.to_string()));
        }

        self.refresh_account_positions(from);
        let mut account = self.accounts.write(from);
        let available = account
            .available_margin
            .get(currency)
            .copied()
            .unwrap_or_default();
        if available < amount {
            return Err(ExchangeError::InsufficientMargin);
        }

        let balance = account.collateral.entry(currency.to_string()).or_default();
        *balance -= amount;
        let transfer = Transfer {
            amount,
            balance: *balance,
            currency: currency.to_string(),
            status: "confirmed",
        };
        account
            .withdrawals
            .entry(currency.to_string())
            .or_default()
            .push(transfer.clone());
        debug!(from, currency, %amount, "withdrawal confirmed");
        Ok(transfer)
    }

    // ------------------------------------------------------------------
    // Order flow
    // ------------------------------------------------------------------

    /// Validate, margin-gate and submit an order, then apply the fills to
    /// every involved account.
    pub fn place_order(&self, request: OrderRequest) -> ExchangeResult<OrderPlacement> {
        let instrument = self.instrument(&request.instrument_name)?;
        if request.amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidArgument(
                "order size must be positive".to_string(),
            ));
        }
        if request.leverage < 1 {
            return Err(ExchangeError::InvalidArgument(
                "leverage must be at least 1".to_string(),
            ));
        }

        let price = match request.order_type {
            OrderType::Limit => {
                let price = request
                    .price
                    .ok_or_else(|| {
                        ExchangeError::InvalidArgument("limit order requires a price".to_string())
                    })?;
                if price <= Decimal::ZERO {
                    return Err(ExchangeError::InvalidArgument(
                        "order price must be positive".to_string(),
                    ));
                }
                Some(instrument.quantize_price(price))
            }
            OrderType::Market => None,
        };

        self.accounts.ensure(&request.from);
        self.refresh_account_positions(&request.from);

        // Pre-trade gate: market orders are priced at the current index.
        let gate_price = price.unwrap_or_else(|| instrument.index_price());
        {
            let account = self
                .accounts
                .read(&request.from)
                .ok_or_else(|| ExchangeError::Unavailable("account store".to_string()))?;
            let existing = account.positions.get(&instrument.name);
            let delta = margin_delta(
                existing,
                request.side,
                request.amount,
                gate_price,
                request.leverage,
            );
            let required = total_margin_required(&account) + delta;
            let collateral = account.collateral_balance(self.collateral_symbol());
            if required > collateral {
                debug!(
                    from = %request.from,
                    instrument = %instrument.name,
                    %required,
                    %collateral,
                    "margin gate rejected order"
                );
                return Err(ExchangeError::InsufficientMargin);
            }
        }

        let order = match request.order_type {
            OrderType::Limit => Order::Limit(LimitOrder::new(
                request.from.clone(),
                None,
                request.side,
                request.amount,
                request.leverage,
                gate_price,
                request.time_in_force,
            )),
            OrderType::Market => Order::Market(MarketOrder::new(
                request.from.clone(),
                None,
                request.side,
                request.amount,
                request.leverage,
            )),
        };
        let order_snapshot = match &order {
            Order::Limit(o) => o.snapshot(),
            Order::Market(o) => o.snapshot(),
            Order::Cancel(o) => o.snapshot(),
        };
        let order_type_label = match request.order_type {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        };

        let report = self.submit(instrument, order, request.leverage, order_type_label);
        Ok(OrderPlacement {
            order: order_snapshot,
            trades: report.trades,
        })
    }

    /// Cancel one of the caller's resting orders.
    ///
    /// The book-level cancel is an idempotent no-op; the RPC edge reports
    /// `not-found` when the id is not among the caller's open orders.
    pub fn cancel_order(
        &self,
        from: &str,
        instrument_name: &str,
        order_id: &str,
    ) -> ExchangeResult<()> {
        let instrument = self.instrument(instrument_name)?;
        self.accounts.ensure(from);
        {
            let account = self
                .accounts
                .read(from)
                .ok_or_else(|| ExchangeError::Unavailable("account store".to_string()))?;
            let known = account
                .open_orders
                .get(instrument_name)
                .is_some_and(|orders| orders.contains_key(order_id));
            if !known {
                return Err(ExchangeError::NotFound(format!("order {order_id}")));
            }
        }

        let report = instrument
            .book
            .process_order(Order::Cancel(CancelOrder::new(from, order_id)));
        self.apply_order_report(instrument, &report);

        // A cancel can race a fill and find the order already gone; the
        // open-order entry is dropped either way.
        let mut account = self.accounts.write(from);
        if let Some(orders) = account.open_orders.get_mut(instrument_name) {
            orders.remove(order_id);
        }
        Ok(())
    }

    /// Run an order through the book and route the outcome to account state
    /// and user-trade events. Shared by the RPC path and the seeder.
    pub(crate) fn submit(
        &self,
        instrument: &Instrument,
        order: Order,
        aggressor_leverage: u32,
        order_type_label: &str,
    ) -> ProcessReport {
        let report = instrument.book.process_order(order);

        if !report.trades.is_empty() {
            let mut log = self.trades.entry(instrument.name.clone()).or_default();
            log.extend(report.trades.iter().cloned());
        }

        self.apply_fills(instrument, &report, aggressor_leverage);
        self.apply_order_report(instrument, &report);
        self.publish_user_trades(instrument, &report, aggressor_leverage, order_type_label);
        report
    }

    /// Reshape the positions of both counterparties for each emitted trade.
    fn apply_fills(&self, instrument: &Instrument, report: &ProcessReport, taker_leverage: u32) {
        for trade in &report.trades {
            let maker_leverage = maker_leverage(report, trade, taker_leverage);

            self.apply_fill_to(&trade.taker, trade.side, trade, instrument, taker_leverage);
            self.apply_fill_to(
                &trade.maker,
                trade.side.opposite(),
                trade,
                instrument,
                maker_leverage,
            );
        }
    }

    fn apply_fill_to(
        &self,
        address: &str,
        side: Side,
        trade: &Trade,
        instrument: &Instrument,
        leverage: u32,
    ) {
        let mark = decimal_from_f64(instrument.mark_price());
        let index = instrument.index_price();

        self.accounts.ensure(address);
        let mut account = self.accounts.write(address);
        let existing = account.positions.get(&instrument.name);
        match Position::after_fill(
            existing,
            &instrument.name,
            instrument.contract_size,
            side,
            trade.size,
            trade.price,
            leverage,
            mark,
            index,
        ) {
            Some(position) => {
                account.positions.insert(instrument.name.clone(), position);
            }
            None => {
                account.positions.remove(&instrument.name);
                debug!(address, instrument = %instrument.name, "position closed");
            }
        }
    }

    /// Maintain per-account open-order tables from a matching report.
    fn apply_order_report(&self, instrument: &Instrument, report: &ProcessReport) {
        for (order_id, snapshot) in &report.updated {
            if snapshot.kind == crate::matching::OrderKind::Limit {
                self.accounts.ensure(&snapshot.fromaddr);
                let mut account = self.accounts.write(&snapshot.fromaddr);
                account
                    .open_orders
                    .entry(instrument.name.clone())
                    .or_default()
                    .insert(order_id.clone(), snapshot.clone());
            }
        }
        for (order_id, snapshot) in report.filled.iter().chain(report.cancelled.iter()) {
            self.accounts.ensure(&snapshot.fromaddr);
            let mut account = self.accounts.write(&snapshot.fromaddr);
            if let Some(orders) = account.open_orders.get_mut(&instrument.name) {
                orders.remove(order_id);
            }
        }
    }

    /// Record and broadcast both counterparties' view of each fill.
    fn publish_user_trades(
        &self,
        instrument: &Instrument,
        report: &ProcessReport,
        taker_leverage: u32,
        order_type_label: &str,
    ) {
        let mut events = Vec::new();
        for trade in &report.trades {
            let maker_trade = UserTrade {
                price: trade.price,
                side: trade.side.opposite(),
                size: trade.size,
                leverage: maker_leverage(report, trade, taker_leverage),
                liquidity: "maker",
                timestamp: trade.timestamp,
                instrument_name: instrument.name.clone(),
                order_type: "limit".to_string(),
            };
            let taker_trade = UserTrade {
                price: trade.price,
                side: trade.side,
                size: trade.size,
                leverage: taker_leverage,
                liquidity: "taker",
                timestamp: trade.timestamp,
                instrument_name: instrument.name.clone(),
                order_type: order_type_label.to_string(),
            };

            for (address, user_trade) in [(&trade.maker, maker_trade), (&trade.taker, taker_trade)]
            {
                self.accounts.ensure(address);
                let mut account = self.accounts.write(address);
                account.trades.push(user_trade.clone());
                drop(account);
                events.push(ChannelEvent {
                    channel: format!("user.trades.{address}"),
                    data: serde_json::to_value(&user_trade).unwrap_or_default(),
                });
            }
        }
        if !events.is_empty() {
            self.producer.produce_multiple(PUBLIC_SUBS_TOPIC, &events);
        }
    }

    // ------------------------------------------------------------------
    // Account refresh and queries
    // ------------------------------------------------------------------

    /// Refresh available margin and mark-dependent position fields for one
    /// account. Returns the refreshed positions.
    pub fn refresh_account_positions(&self, address: &str) -> HashMap<String, Position> {
        self.accounts.ensure(address);
        let mut account = self.accounts.write(address);

        let required = total_margin_required(&account);
        let symbol = self.collateral_symbol().to_string();
        let equity = account.collateral_balance(&symbol);
        account.available_margin.insert(symbol, equity - required);

        let refreshed: Vec<(String, Decimal, Decimal)> = account
            .positions
            .keys()
            .filter_map(|name| {
                let instrument = self.instrument(name).ok()?;
                Some((
                    name.clone(),
                    decimal_from_f64(instrument.mark_price()),
                    instrument.index_price(),
                ))
            })
            .collect();
        for (name, mark, index) in refreshed {
            if let Some(position) = account.positions.get_mut(&name) {
                position.refresh(mark, index);
            }
        }
        account.positions.clone()
    }

    pub fn ticker_data(&self, instrument_name: &str) -> ExchangeResult<TickerData> {
        let instrument = self.instrument(instrument_name)?;
        Ok(build_ticker(instrument))
    }

    /// Top-of-book rows up to `depth` orders per side.
    pub fn orderbook_data(
        &self,
        instrument_name: &str,
        depth: usize,
    ) -> ExchangeResult<serde_json::Value> {
        let instrument = self.instrument(instrument_name)?;
        Ok(json!({
            "bids": instrument.book.depth(Side::Buy, depth),
            "asks": instrument.book.depth(Side::Sell, depth),
        }))
    }

    /// The most recent trades on an instrument, newest first, capped at 20.
    pub fn trades_by_instrument(&self, instrument_name: &str) -> ExchangeResult<Vec<Trade>> {
        self.instrument(instrument_name)?;
        Ok(self
            .trades
            .get(instrument_name)
            .map(|log| log.iter().rev().take(20).cloned().collect())
            .unwrap_or_default())
    }

    pub fn index_price(&self, index_name: &str) -> ExchangeResult<serde_json::Value> {
        let index = self.index(index_name)?;
        Ok(json!({
            "price": index.price(),
            "index_name": index_name,
            "timestamp": current_time_micros(),
        }))
    }

    pub fn index_price_names(&self) -> Vec<String> {
        self.indices.iter().map(|index| index.name.clone()).collect()
    }

    pub fn currency_symbols(&self) -> Vec<String> {
        self.tradable_assets
            .iter()
            .map(|currency| currency.symbol.clone())
            .collect()
    }

    pub fn instrument_names(&self) -> Vec<String> {
        self.instruments
            .iter()
            .map(|instrument| instrument.name.clone())
            .collect()
    }

    pub fn instrument_specs(&self) -> Vec<serde_json::Value> {
        self.instruments
            .iter()
            .map(|instrument| instrument.specs())
            .collect()
    }

    pub fn collateral(&self, from: &str) -> serde_json::Value {
        self.accounts.ensure(from);
        let account = self.accounts.read(from);
        let symbol = self.collateral_symbol();
        let balance = account
            .map(|account| account.collateral_balance(symbol))
            .unwrap_or_default();
        json!({ symbol: balance })
    }

    pub fn all_trades(&self, from: &str) -> Vec<UserTrade> {
        self.accounts.ensure(from);
        self.accounts
            .read(from)
            .map(|account| account.trades.clone())
            .unwrap_or_default()
    }

    pub fn open_orders(
        &self,
        from: &str,
    ) -> HashMap<String, HashMap<String, OrderSnapshot>> {
        self.accounts.ensure(from);
        self.accounts
            .read(from)
            .map(|account| account.open_orders.clone())
            .unwrap_or_default()
    }

    pub fn account_summary(&self, from: &str) -> serde_json::Value {
        let positions = self.refresh_account_positions(from);
        let pnl: Decimal = positions.values().map(|p| p.unrealized_pnl).sum();

        let account = match self.accounts.read(from) {
            Some(account) => account,
            None => return json!({}),
        };
        let required = total_margin_required(&account);
        let equity = account.collateral_balance(self.collateral_symbol());
        let available = equity - required;
        json!({
            "total_pl": pnl,
            "margin": available,
            "equity": equity,
            "currency": self.collateral_symbol(),
            "balance": available,
            "available_withdrawal_funds": available,
        })
    }

    pub fn account_details(&self, from: &str) -> serde_json::Value {
        self.refresh_account_positions(from);
        let account = match self.accounts.read(from) {
            Some(account) => account,
            None => return json!({}),
        };
        let symbol = self.collateral_symbol();
        json!({
            "positions": account.positions,
            "open_orders": account.open_orders,
            "collateral": account.collateral_balance(symbol),
            "trades": account.trades,
            "deposits": account.deposits,
            "withdrawals": account.withdrawals,
            "available_margin": account.available_margin.get(symbol).copied().unwrap_or_default(),
        })
    }

    pub fn deposits(&self, from: &str) -> HashMap<String, Vec<Transfer>> {
        self.accounts.ensure(from);
        self.accounts
            .read(from)
            .map(|account| account.deposits.clone())
            .unwrap_or_default()
    }

    pub fn withdrawals(&self, from: &str) -> HashMap<String, Vec<Transfer>> {
        self.accounts.ensure(from);
        self.accounts
            .read(from)
            .map(|account| account.withdrawals.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("instruments", &self.instrument_idx.len())
            .field("accounts", &self.accounts.len())
            .finish()
    }
}

/// Lossy but monotone conversion for mark prices computed in floats.
pub(crate) fn decimal_from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// The maker order's own leverage, recovered from its snapshot in the
/// matching report. Falls back to the aggressor's when the snapshot is
/// missing.
fn maker_leverage(report: &ProcessReport, trade: &Trade, taker_leverage: u32) -> u32 {
    report
        .filled
        .get(&trade.book_order_id)
        .or_else(|| report.updated.get(&trade.book_order_id))
        .map(|snapshot| snapshot.leverage)
        .unwrap_or(taker_leverage)
}
