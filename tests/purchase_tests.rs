mod common;

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;

use common::{dec, seed_account, seed_stock, set_setting, setup_market};
use fandango::db::Store;
use fandango::engine::price::{reason, MAX_PRICE};
use fandango::engine::PriceOutcome;
use fandango::errors::EngineError;
use fandango::models::SettingKey;

#[tokio::test]
async fn test_purchase_charges_current_price_then_raises_it() {
    let t = setup_market();
    seed_stock(&t.market, "BUY", "10.00", &[]).await;
    seed_account(&t.market, 1001, "100.00").await;
    set_setting(&t.market, SettingKey::StockPurchaseMinIncrease, 25).await;
    set_setting(&t.market, SettingKey::StockPurchaseMaxIncrease, 25).await;
    t.market.activations().open().await.unwrap();

    let receipt = t.market.purchases().purchase("BUY", 1001).await.unwrap();
    assert_eq!(receipt.purchase.purchase_price, dec("10"));
    assert_eq!(receipt.account.balance, dec("90"));
    assert_eq!(receipt.price_outcome.new_price(), Some(dec("12.5")));

    let receipt = t.market.purchases().purchase("BUY", 1001).await.unwrap();
    assert_eq!(receipt.purchase.purchase_price, dec("12.5"));
    assert_eq!(receipt.account.balance, dec("77.5"));

    let history = t.market.prices().history("BUY").await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[1..].iter().all(|c| c.reason == reason::PURCHASE));
}

#[tokio::test]
async fn test_purchase_while_closed_keeps_price() {
    let t = setup_market();
    seed_stock(&t.market, "BUY", "10.00", &[]).await;
    seed_account(&t.market, 1001, "100.00").await;

    let receipt = t.market.purchases().purchase("BUY", 1001).await.unwrap();
    assert_eq!(receipt.purchase.purchase_price, dec("10"));
    assert_eq!(receipt.account.balance, dec("90"));
    assert_eq!(receipt.price_outcome, PriceOutcome::MarketClosed);
    assert_eq!(t.market.prices().current_price("BUY").await.unwrap(), dec("10"));
}

#[tokio::test]
async fn test_purchase_unknown_stock_or_account() {
    let t = setup_market();
    seed_stock(&t.market, "BUY", "10.00", &[]).await;
    seed_account(&t.market, 1001, "100.00").await;

    let err = t.market.purchases().purchase("NOPE", 1001).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = t.market.purchases().purchase("BUY", 9999).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    assert!(t.store.list_purchases().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_runaway_purchase_increase_stops_at_max_price() {
    let t = setup_market();
    seed_stock(&t.market, "MOON", "10.00", &[]).await;
    seed_account(&t.market, 1001, "0").await;
    set_setting(&t.market, SettingKey::StockPurchaseMinIncrease, 1000).await;
    set_setting(&t.market, SettingKey::StockPurchaseMaxIncrease, 1000).await;
    t.market.activations().open().await.unwrap();

    let mut out_of_range = 0;
    for _ in 0..30 {
        let receipt = t.market.purchases().purchase("MOON", 1001).await.unwrap();
        if matches!(receipt.price_outcome, PriceOutcome::OutOfRange { .. }) {
            out_of_range += 1;
        }
        assert!(t.market.prices().current_price("MOON").await.unwrap() <= MAX_PRICE);
    }

    // 10 * 11^10 still fits, the eleventh increase does not
    assert_eq!(out_of_range, 20);
    assert_eq!(t.store.list_purchases().await.unwrap().len(), 30);
    assert_eq!(t.market.prices().history("MOON").await.unwrap().len(), 11);
}

#[tokio::test]
async fn test_purchase_writes_sale_debit_and_bump_together() {
    let t = setup_market();
    seed_stock(&t.market, "BUY", "10.00", &[]).await;
    seed_account(&t.market, 1001, "100.00").await;
    t.market.activations().open().await.unwrap();

    let receipt = t.market.purchases().purchase("BUY", 1001).await.unwrap();
    let bump = match &receipt.price_outcome {
        PriceOutcome::Recorded(change) => change.clone(),
        other => panic!("expected a recorded bump, got {other:?}"),
    };
    assert_eq!(bump.changed_at, receipt.purchase.purchased_at);
    assert_eq!(t.market.prices().current_price("BUY").await.unwrap(), bump.new_price);
    assert_eq!(t.market.catalog().get_account(1001).await.unwrap(), receipt.account);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases_never_share_a_price() {
    const BUYERS: i64 = 8;

    let t = setup_market();
    seed_stock(&t.market, "HOT", "10.00", &[]).await;
    for card in 0..BUYERS {
        seed_account(&t.market, 2000 + card, "10000.00").await;
    }
    seed_account(&t.market, 3000, "10000.00").await;
    t.market.activations().open().await.unwrap();

    // Half the buyers share one card, half have their own
    let mut handles = Vec::new();
    for i in 0..BUYERS {
        let market = Arc::clone(&t.market);
        let card = if i % 2 == 0 { 3000 } else { 2000 + i };
        handles.push(tokio::spawn(async move {
            market.purchases().purchase("HOT", card).await
        }));
    }

    let mut receipts = Vec::new();
    for handle in handles {
        receipts.push(handle.await.unwrap().unwrap());
    }

    let mut paid: Vec<Decimal> = receipts.iter().map(|r| r.purchase.purchase_price).collect();
    paid.sort();

    let history = t.market.prices().history("HOT").await.unwrap();
    assert_eq!(history.len(), BUYERS as usize + 1);

    let expected: Vec<Decimal> = history[..BUYERS as usize].iter().map(|c| c.new_price).collect();
    assert_eq!(paid, expected);

    let shared_spend: Decimal = receipts
        .iter()
        .filter(|r| r.purchase.card_number == 3000)
        .map(|r| r.purchase.purchase_price)
        .sum();
    let shared = t.market.catalog().get_account(3000).await.unwrap();
    assert_eq!(shared.balance, dec("10000") - shared_spend);
}

#[tokio::test]
async fn test_decay_waits_for_idle_window() {
    let t = setup_market();
    seed_stock(&t.market, "IDL", "100.00", &[]).await;
    t.market.activations().open().await.unwrap();
    let stock = t.market.catalog().get_stock("IDL").await.unwrap();

    t.clock.advance(Duration::minutes(2));
    assert!(t.market.decay().maybe_decay(&stock).await.unwrap().is_none());

    t.clock.advance(Duration::minutes(1));
    let outcome = t.market.decay().maybe_decay(&stock).await.unwrap().expect("stale stock");
    let price = outcome.new_price().expect("decay recorded");
    assert!(price >= dec("95") && price <= dec("98"), "unexpected decay to {price}");

    // The decay itself counts as activity
    assert!(t.market.decay().maybe_decay(&stock).await.unwrap().is_none());

    let history = t.market.prices().history("IDL").await.unwrap();
    assert_eq!(history.last().unwrap().reason, reason::NO_PURCHASE);
}

#[tokio::test]
async fn test_purchase_resets_idle_window() {
    let t = setup_market();
    seed_stock(&t.market, "IDL", "100.00", &[]).await;
    seed_account(&t.market, 1001, "1000.00").await;
    let stock = t.market.catalog().get_stock("IDL").await.unwrap();

    // Closed market: purchase is recorded, price does not move
    t.clock.advance(Duration::minutes(2));
    t.market.purchases().purchase("IDL", 1001).await.unwrap();
    t.market.activations().open().await.unwrap();

    t.clock.advance(Duration::minutes(2));
    assert!(t.market.decay().maybe_decay(&stock).await.unwrap().is_none());

    t.clock.advance(Duration::minutes(1));
    assert!(t.market.decay().maybe_decay(&stock).await.unwrap().is_some());
}

#[tokio::test]
async fn test_listing_decays_only_in_stock_items() {
    let t = setup_market();
    seed_stock(&t.market, "ON", "100.00", &[]).await;
    seed_stock(&t.market, "OFF", "100.00", &[]).await;
    t.market.catalog().set_in_stock("OFF", false).await.unwrap();
    t.market.activations().open().await.unwrap();
    t.clock.advance(Duration::minutes(5));

    let listed = t.market.list_stocks().await.unwrap();
    assert_eq!(listed.len(), 2);

    let on = listed.iter().find(|s| s.stock.code == "ON").unwrap();
    let off = listed.iter().find(|s| s.stock.code == "OFF").unwrap();
    assert!(on.price < on.initial_price);
    assert_eq!(off.price, off.initial_price);
}

#[tokio::test]
async fn test_decay_while_closed_records_nothing() {
    let t = setup_market();
    seed_stock(&t.market, "IDL", "100.00", &[]).await;
    let stock = t.market.catalog().get_stock("IDL").await.unwrap();
    t.clock.advance(Duration::minutes(10));

    let outcome = t.market.decay().maybe_decay(&stock).await.unwrap();
    assert_eq!(outcome, Some(PriceOutcome::MarketClosed));
    assert_eq!(t.market.prices().history("IDL").await.unwrap().len(), 1);
}
