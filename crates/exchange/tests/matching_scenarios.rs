mod common;

use std::sync::Arc;

use async_trait::async_trait;
use bourse_clock::ManualClock;
use bourse_core::{ExchangeEvent, OrderRequest, OrderStatus, Side};
use bourse_exchange::{Exchange, ExchangeConfig, ExchangeError, ExchangeLimits, InMemoryStore};
use bourse_ports::{EventNotifier, NotifyError, Store, Transaction};
use common::{Market, TICKER};

#[tokio::test]
async fn test_scenario_a_full_match() {
    let market = Market::new().await;
    let a = market.user("a", &[("RUB", 1000)]).await;
    let b = market.user("b", &[(TICKER, 10)]).await;

    let sell = market
        .exchange
        .submit_order(b, OrderRequest::limit(TICKER, Side::Sell, 10, 50))
        .await
        .unwrap();
    assert!(sell.trades.is_empty());
    assert_eq!(sell.order.status, OrderStatus::New);

    let buy = market
        .exchange
        .submit_order(a, OrderRequest::limit(TICKER, Side::Buy, 10, 50))
        .await
        .unwrap();

    assert_eq!(buy.trades.len(), 1);
    let trade = &buy.trades[0];
    assert_eq!((trade.quantity, trade.price), (10, 50));
    assert_eq!((trade.buyer_id, trade.seller_id), (a, b));

    assert_eq!(market.balance(a, TICKER).await, 10);
    assert_eq!(market.balance(a, "RUB").await, 500);
    assert_eq!(market.balance(b, TICKER).await, 0);
    assert_eq!(market.balance(b, "RUB").await, 500);

    assert_eq!(buy.order.status, OrderStatus::Executed);
    let resting = market.exchange.get_order(sell.order.id, b).await.unwrap();
    assert_eq!(resting.status, OrderStatus::Executed);
    assert_eq!(resting.filled, 10);

    let history = market.exchange.get_trade_history(TICKER, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, trade.id);
}

#[tokio::test]
async fn test_scenario_b_insufficient_funds() {
    let market = Market::new().await;
    let c = market.user("c", &[("RUB", 10)]).await;

    let err = market
        .exchange
        .submit_order(c, OrderRequest::limit(TICKER, Side::Buy, 10, 50))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ExchangeError::InsufficientFunds {
            user_id: c,
            ticker: "RUB".into(),
            required: 500,
            available: 10,
        }
    );
    assert!(market.exchange.list_orders(c).await.unwrap().is_empty());
    assert_eq!(market.balance(c, "RUB").await, 10);
    assert!(market.exchange.store().orders().is_empty());
}

#[tokio::test]
async fn test_scenario_c_partial_fill_limit_rests() {
    let market = Market::new().await;
    let buyer = market.user("buyer", &[("RUB", 1000)]).await;
    let seller = market.user("seller", &[(TICKER, 10)]).await;

    let sell = market
        .exchange
        .submit_order(seller, OrderRequest::limit(TICKER, Side::Sell, 10, 50))
        .await
        .unwrap();
    let buy = market
        .exchange
        .submit_order(buyer, OrderRequest::limit(TICKER, Side::Buy, 15, 50))
        .await
        .unwrap();

    assert_eq!(buy.trades.len(), 1);
    assert_eq!(buy.trades[0].quantity, 10);
    assert_eq!(buy.order.status, OrderStatus::PartiallyExecuted);
    assert_eq!(buy.order.filled, 10);

    let maker = market.exchange.order(sell.order.id).await.unwrap();
    assert_eq!(maker.status, OrderStatus::Executed);

    let book = market.exchange.get_orderbook(TICKER, 25).await.unwrap();
    assert_eq!(book.best_bid(), Some(50));
    assert_eq!(book.bids[0].quantity, 5);
    assert!(book.asks.is_empty());
}

#[tokio::test]
async fn test_scenario_c_partial_fill_market_never_rests() {
    let market = Market::new().await;
    let buyer = market.user("buyer", &[("RUB", 1000)]).await;
    let seller = market.user("seller", &[(TICKER, 10)]).await;

    market
        .exchange
        .submit_order(seller, OrderRequest::limit(TICKER, Side::Sell, 10, 50))
        .await
        .unwrap();
    let buy = market
        .exchange
        .submit_order(buyer, OrderRequest::market(TICKER, Side::Buy, 15))
        .await
        .unwrap();

    assert_eq!(buy.trades.len(), 1);
    assert_eq!(buy.order.status, OrderStatus::PartiallyExecuted);
    assert_eq!(buy.order.filled, 10);

    let book = market.exchange.get_orderbook(TICKER, 25).await.unwrap();
    assert!(book.bids.is_empty());
    assert!(book.asks.is_empty());
    assert_eq!(market.balance(buyer, "RUB").await, 500);
}

#[tokio::test]
async fn test_price_time_priority() {
    let market = Market::new().await;
    let buyer = market.user("buyer", &[("RUB", 1000)]).await;
    let s1 = market.user("s1", &[(TICKER, 5)]).await;
    let s2 = market.user("s2", &[(TICKER, 5)]).await;
    let s3 = market.user("s3", &[(TICKER, 10)]).await;

    let mut sells = Vec::new();
    for (seller, qty, price) in [(s1, 5, 10), (s2, 5, 10), (s3, 10, 12)] {
        let placed = market
            .exchange
            .submit_order(seller, OrderRequest::limit(TICKER, Side::Sell, qty, price))
            .await
            .unwrap();
        sells.push(placed.order);
    }
    assert!(sells[0].created_at < sells[1].created_at);
    assert!(sells[1].created_at < sells[2].created_at);

    let buy = market
        .exchange
        .submit_order(buyer, OrderRequest::market(TICKER, Side::Buy, 15))
        .await
        .unwrap();

    let fills: Vec<_> = buy
        .trades
        .iter()
        .map(|t| (t.sell_order_id, t.price, t.quantity))
        .collect();
    assert_eq!(
        fills,
        vec![
            (sells[0].id, 10, 5),
            (sells[1].id, 10, 5),
            (sells[2].id, 12, 5),
        ]
    );
    assert_eq!(buy.order.status, OrderStatus::Executed);

    let last = market.exchange.order(sells[2].id).await.unwrap();
    assert_eq!(last.status, OrderStatus::PartiallyExecuted);
    assert_eq!(market.balance(buyer, "RUB").await, 1000 - 50 - 50 - 60);

    // History is most recent first
    let history = market.exchange.get_trade_history(TICKER, 2).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sell_order_id, sells[2].id);
    assert_eq!(history[1].sell_order_id, sells[1].id);
}

#[tokio::test]
async fn test_limit_price_bounds_the_sweep() {
    let market = Market::new().await;
    let buyer = market.user("buyer", &[("RUB", 10_000)]).await;
    let seller = market.user("seller", &[(TICKER, 20)]).await;

    for price in [10, 11, 12] {
        market
            .exchange
            .submit_order(seller, OrderRequest::limit(TICKER, Side::Sell, 5, price))
            .await
            .unwrap();
    }

    let buy = market
        .exchange
        .submit_order(buyer, OrderRequest::limit(TICKER, Side::Buy, 20, 11))
        .await
        .unwrap();
    let prices: Vec<_> = buy.trades.iter().map(|t| t.price).collect();
    assert_eq!(prices, vec![10, 11]);
    assert_eq!(buy.order.filled, 10);

    let book = market.exchange.get_orderbook(TICKER, 25).await.unwrap();
    assert_eq!(book.best_bid(), Some(11));
    assert_eq!(book.best_ask(), Some(12));
}

#[tokio::test]
async fn test_sell_aggressor_takes_best_bid_price() {
    let market = Market::new().await;
    let buyer = market.user("buyer", &[("RUB", 10_000)]).await;
    let seller = market.user("seller", &[(TICKER, 10)]).await;

    market
        .exchange
        .submit_order(buyer, OrderRequest::limit(TICKER, Side::Buy, 4, 30))
        .await
        .unwrap();
    market
        .exchange
        .submit_order(buyer, OrderRequest::limit(TICKER, Side::Buy, 4, 35))
        .await
        .unwrap();

    let sell = market
        .exchange
        .submit_order(seller, OrderRequest::limit(TICKER, Side::Sell, 6, 30))
        .await
        .unwrap();
    let fills: Vec<_> = sell.trades.iter().map(|t| (t.price, t.quantity)).collect();
    assert_eq!(fills, vec![(35, 4), (30, 2)]);
    assert_eq!(sell.trades[0].taker_side, Side::Sell);
    assert_eq!(market.balance(seller, "RUB").await, 35 * 4 + 30 * 2);
}

#[tokio::test]
async fn test_insolvent_counter_order_is_skipped() {
    let market = Market::new().await;
    let buyer = market.user("buyer", &[("RUB", 10_000)]).await;
    let seller = market.user("seller", &[(TICKER, 10)]).await;

    // Both pass the placement check; only one can be delivered
    let first = market
        .exchange
        .submit_order(seller, OrderRequest::limit(TICKER, Side::Sell, 10, 50))
        .await
        .unwrap();
    let second = market
        .exchange
        .submit_order(seller, OrderRequest::limit(TICKER, Side::Sell, 10, 51))
        .await
        .unwrap();

    let buy = market
        .exchange
        .submit_order(buyer, OrderRequest::limit(TICKER, Side::Buy, 20, 51))
        .await
        .unwrap();

    assert_eq!(buy.trades.len(), 1);
    assert_eq!(buy.trades[0].sell_order_id, first.order.id);
    assert_eq!(buy.order.status, OrderStatus::PartiallyExecuted);

    let skipped = market.exchange.order(second.order.id).await.unwrap();
    assert_eq!(skipped.status, OrderStatus::New);
    assert_eq!(skipped.filled, 0);
    assert_eq!(market.balance(seller, TICKER).await, 0);
}

#[tokio::test]
async fn test_cancellation_rules() {
    let market = Market::new().await;
    let buyer = market.user("buyer", &[("RUB", 1000)]).await;
    let seller = market.user("seller", &[(TICKER, 10)]).await;

    let resting = market
        .exchange
        .submit_order(buyer, OrderRequest::limit(TICKER, Side::Buy, 5, 20))
        .await
        .unwrap();

    let cancelled = market
        .exchange
        .cancel_order(resting.order.id, buyer)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    // Idempotent cancellation fails and changes nothing
    let err = market
        .exchange
        .cancel_order(resting.order.id, buyer)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidCancellation(_)));
    let after = market.exchange.order(resting.order.id).await.unwrap();
    assert_eq!(after, cancelled);

    // Cancelled orders no longer match
    let sell = market
        .exchange
        .submit_order(seller, OrderRequest::limit(TICKER, Side::Sell, 5, 20))
        .await
        .unwrap();
    assert!(sell.trades.is_empty());

    // Unfilled market order: stays NEW, does not rest, can be cancelled
    let market_sell = market
        .exchange
        .submit_order(seller, OrderRequest::market(TICKER, Side::Sell, 3))
        .await
        .unwrap();
    assert_eq!(market_sell.order.status, OrderStatus::New);
    let book = market.exchange.get_orderbook(TICKER, 5).await.unwrap();
    assert_eq!(book.asks.len(), 1);
    assert!(market.exchange.cancel_order(market_sell.order.id, seller).await.is_ok());

    // Partially filled market order cannot be cancelled
    let partial = market
        .exchange
        .submit_order(buyer, OrderRequest::market(TICKER, Side::Buy, 8))
        .await
        .unwrap();
    assert_eq!(partial.order.status, OrderStatus::PartiallyExecuted);
    let err = market
        .exchange
        .cancel_order(partial.order.id, buyer)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidCancellation(_)));
}

#[tokio::test]
async fn test_foreign_orders_are_invisible() {
    let market = Market::new().await;
    let owner = market.user("owner", &[("RUB", 100)]).await;
    let other = market.user("other", &[]).await;

    let placed = market
        .exchange
        .submit_order(owner, OrderRequest::limit(TICKER, Side::Buy, 1, 10))
        .await
        .unwrap();

    assert!(matches!(
        market.exchange.get_order(placed.order.id, other).await,
        Err(ExchangeError::NotFound(_))
    ));
    assert!(matches!(
        market.exchange.cancel_order(placed.order.id, other).await,
        Err(ExchangeError::NotFound(_))
    ));
    assert_eq!(market.exchange.list_orders(owner).await.unwrap().len(), 1);
    assert!(market.exchange.list_orders(other).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_submissions() {
    let market = Market::new().await;
    let user = market.user("user", &[("RUB", 100)]).await;

    let cases = [
        OrderRequest::limit(TICKER, Side::Buy, 0, 10),
        OrderRequest::limit(TICKER, Side::Buy, 1, 0),
        OrderRequest::limit("RUB", Side::Buy, 1, 1),
    ];
    for request in cases {
        assert!(matches!(
            market.exchange.submit_order(user, request).await,
            Err(ExchangeError::InvalidInput(_))
        ));
    }

    assert!(matches!(
        market
            .exchange
            .submit_order(user, OrderRequest::limit("NOPE", Side::Buy, 1, 1))
            .await,
        Err(ExchangeError::NotFound(_))
    ));
    assert!(matches!(
        market
            .exchange
            .submit_order(uuid::Uuid::new_v4(), OrderRequest::limit(TICKER, Side::Buy, 1, 1))
            .await,
        Err(ExchangeError::NotFound(_))
    ));

    market
        .exchange
        .set_instrument_active(market.admin.id, TICKER, false)
        .await
        .unwrap();
    assert!(matches!(
        market
            .exchange
            .submit_order(user, OrderRequest::limit(TICKER, Side::Buy, 1, 1))
            .await,
        Err(ExchangeError::InvalidInput(_))
    ));
    assert!(market.exchange.store().orders().is_empty());
}

#[tokio::test]
async fn test_events_follow_commit() {
    let market = Market::new().await;
    let mut rx = market.exchange.notifier().subscribe_ticker(TICKER);
    let a = market.user("a", &[("RUB", 1000)]).await;
    let b = market.user("b", &[(TICKER, 10)]).await;

    market
        .exchange
        .submit_order(b, OrderRequest::limit(TICKER, Side::Sell, 10, 50))
        .await
        .unwrap();
    market
        .exchange
        .submit_order(a, OrderRequest::limit(TICKER, Side::Buy, 10, 50))
        .await
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event {
            ExchangeEvent::OrderPlaced(e) => format!("placed:{}", e.side),
            ExchangeEvent::TradeExecuted(e) => format!("trade:{}", e.quantity),
            ExchangeEvent::OrderStatusChanged(e) => format!("status:{}", e.status),
        });
    }
    assert_eq!(
        kinds,
        vec![
            "placed:SELL",
            "placed:BUY",
            "trade:10",
            "status:EXECUTED",
            "status:EXECUTED",
        ]
    );

    // Rejections publish nothing
    let _ = market
        .exchange
        .submit_order(a, OrderRequest::limit(TICKER, Side::Buy, 100, 50))
        .await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_aborted_sweep_rolls_back_earlier_fills() {
    let market = Market::with_config(ExchangeConfig {
        lock_timeout_ms: 100,
        ..Default::default()
    })
    .await;
    let buyer = market.user("buyer", &[("RUB", 10_000)]).await;
    let seller = market.user("seller", &[(TICKER, 20)]).await;

    let first = market
        .exchange
        .submit_order(seller, OrderRequest::limit(TICKER, Side::Sell, 10, 50))
        .await
        .unwrap();
    let second = market
        .exchange
        .submit_order(seller, OrderRequest::limit(TICKER, Side::Sell, 10, 51))
        .await
        .unwrap();

    // The sweep settles the first ask, then stalls on the second
    let mut holder = market.exchange.store().begin().await.unwrap();
    assert!(holder.lock_order(second.order.id).await.unwrap().is_some());

    let err = market
        .exchange
        .submit_order(buyer, OrderRequest::limit(TICKER, Side::Buy, 20, 51))
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::Internal { .. }));
    assert!(!err.is_retryable());
    drop(holder);

    assert!(
        market
            .exchange
            .get_trade_history(TICKER, 10)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(market.exchange.list_orders(buyer).await.unwrap().is_empty());
    assert_eq!(market.balance(buyer, "RUB").await, 10_000);
    assert_eq!(market.balance(buyer, TICKER).await, 0);
    assert_eq!(market.balance(seller, TICKER).await, 20);
    assert_eq!(market.balance(seller, "RUB").await, 0);

    let first = market.exchange.order(first.order.id).await.unwrap();
    assert_eq!(first.filled, 0);
    assert_eq!(first.status, OrderStatus::New);

    let book = market.exchange.get_orderbook(TICKER, 5).await.unwrap();
    assert_eq!(book.asks.len(), 2);
    assert!(book.bids.is_empty());
}

struct FailingNotifier;

#[async_trait]
impl EventNotifier for FailingNotifier {
    async fn publish(&self, _event: ExchangeEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("broker down".into()))
    }
}

#[tokio::test]
async fn test_publish_failure_does_not_undo_match() {
    let _ = env_logger::try_init();
    let store = Arc::new(InMemoryStore::new());
    let exchange = Exchange::new(
        Arc::new(ManualClock::default()),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(FailingNotifier),
        ExchangeLimits::default(),
    );

    let admin = exchange.create_admin("root").await.unwrap();
    exchange
        .create_instrument(admin.id, TICKER, "Meme coin")
        .await
        .unwrap();
    let a = exchange.register_user("a").await.unwrap().id;
    let b = exchange.register_user("b").await.unwrap().id;
    exchange.deposit(admin.id, a, "RUB", 100).await.unwrap();
    exchange.deposit(admin.id, b, TICKER, 2).await.unwrap();

    exchange
        .submit_order(b, OrderRequest::limit(TICKER, Side::Sell, 2, 50))
        .await
        .unwrap();
    let buy = exchange
        .submit_order(a, OrderRequest::limit(TICKER, Side::Buy, 2, 50))
        .await
        .unwrap();

    assert_eq!(buy.order.status, OrderStatus::Executed);
    assert_eq!(exchange.get_balance(a, TICKER).await.unwrap(), 2);
    assert_eq!(exchange.get_balance(b, "RUB").await.unwrap(), 100);
    assert_eq!(store.total_supply("RUB"), 100);
}
