mod common;

use std::collections::HashSet;

use chrono::Duration;

use common::{dec, seed_event, seed_stock, set_setting, setup_market};
use fandango::engine::price::reason;
use fandango::engine::PriceOutcome;
use fandango::models::SettingKey;

#[tokio::test]
async fn test_current_event_rotation() {
    let t = setup_market();
    seed_stock(&t.market, "XYZ", "100.00", &["tech"]).await;
    let a = seed_event(&t.market, "Chip shortage ends", "5", "10", &["tech"]).await;
    let b = seed_event(&t.market, "New phone launch", "5", "10", &["tech"]).await;
    set_setting(&t.market, SettingKey::NewsMinDuration, 10).await;
    set_setting(&t.market, SettingKey::NewsMaxDuration, 10).await;
    t.market.activations().open().await.unwrap();

    let first = t.market.events().current_event().await.unwrap().expect("first roll");
    assert!(first.id == a.id || first.id == b.id);
    assert_eq!(t.market.prices().history("XYZ").await.unwrap().len(), 2);

    t.clock.advance(Duration::minutes(5));
    let second = t.market.events().current_event().await.unwrap().expect("still active");
    assert_eq!(second.id, first.id);
    assert_eq!(t.market.prices().history("XYZ").await.unwrap().len(), 2);

    t.clock.advance(Duration::minutes(5));
    let third = t.market.events().current_event().await.unwrap().expect("second roll");
    assert_ne!(third.id, first.id);
    assert!(third.id == a.id || third.id == b.id);

    t.clock.advance(Duration::minutes(10));
    assert!(t.market.events().current_event().await.unwrap().is_none());

    let history = t.market.prices().history("XYZ").await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[1..].iter().all(|c| c.reason == reason::NEW_EVENT));
}

#[tokio::test]
async fn test_no_event_reuse_within_session() {
    let t = setup_market();
    for title in ["Alpha", "Bravo", "Charlie", "Delta"] {
        seed_event(&t.market, title, "1", "2", &[]).await;
    }
    set_setting(&t.market, SettingKey::NewsMinDuration, 1).await;
    set_setting(&t.market, SettingKey::NewsMaxDuration, 1).await;
    t.market.activations().open().await.unwrap();

    let mut seen = HashSet::new();
    while let Some(event) = t.market.events().current_event().await.unwrap() {
        assert!(seen.insert(event.id), "event {} rolled twice", event.title);
        t.clock.advance(Duration::minutes(1));
    }
    assert_eq!(seen.len(), 4);
}

#[tokio::test]
async fn test_new_session_starts_with_full_pool() {
    let t = setup_market();
    let only = seed_event(&t.market, "Solo", "1", "1", &[]).await;
    t.market.activations().open().await.unwrap();

    assert_eq!(t.market.events().current_event().await.unwrap().unwrap().id, only.id);
    t.clock.advance(Duration::minutes(30));
    assert!(t.market.events().current_event().await.unwrap().is_none());

    t.market.activations().close(0).await.unwrap();
    t.market.activations().open().await.unwrap();
    assert_eq!(t.market.events().current_event().await.unwrap().unwrap().id, only.id);
}

#[tokio::test]
async fn test_closed_market_rolls_nothing() {
    let t = setup_market();
    seed_stock(&t.market, "XYZ", "100.00", &["tech"]).await;
    seed_event(&t.market, "Rumour", "5", "5", &["tech"]).await;

    assert!(t.market.events().current_event().await.unwrap().is_none());

    let session = t.market.activations().open().await.unwrap();
    t.market.activations().close(0).await.unwrap();
    assert!(t.market.events().roll_new_event(&session).await.unwrap().is_none());

    assert_eq!(t.market.prices().history("XYZ").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_roll_hits_each_tagged_stock_once() {
    let t = setup_market();
    seed_stock(&t.market, "ONE", "10.00", &["tech", "energy"]).await;
    seed_stock(&t.market, "TWO", "10.00", &["energy"]).await;
    seed_stock(&t.market, "OFF", "10.00", &["retail"]).await;
    seed_event(&t.market, "Grid upgrade", "10", "10", &["tech", "energy"]).await;
    let session = t.market.activations().open().await.unwrap();

    let roll = t
        .market
        .events()
        .roll_new_event(&session)
        .await
        .unwrap()
        .expect("event rolled");

    let mut codes: Vec<_> = roll.outcomes.iter().map(|o| o.stock_code.as_str()).collect();
    codes.sort();
    assert_eq!(codes, vec!["ONE", "TWO"]);

    assert_eq!(t.market.prices().current_price("ONE").await.unwrap(), dec("11"));
    assert_eq!(t.market.prices().current_price("TWO").await.unwrap(), dec("11"));
    assert_eq!(t.market.prices().current_price("OFF").await.unwrap(), dec("10"));

    let minutes = (roll.activation.ends_at - roll.activation.started_at).num_minutes();
    assert!((10..=15).contains(&minutes));
}

#[tokio::test]
async fn test_roll_stores_activation_and_shocks_together() {
    let t = setup_market();
    seed_stock(&t.market, "AAA", "100.00", &["tech"]).await;
    seed_stock(&t.market, "TOP", "999999999999.00", &["tech"]).await;
    seed_event(&t.market, "Melt-up", "1000", "1000", &["tech"]).await;
    let session = t.market.activations().open().await.unwrap();

    let roll = t.market.events().roll_new_event(&session).await.unwrap().expect("event rolled");
    assert_eq!(roll.outcomes.len(), 2);

    let aaa = roll.outcomes.iter().find(|o| o.stock_code == "AAA").unwrap();
    assert_eq!(aaa.outcome.new_price(), Some(dec("1100")));
    let top = roll.outcomes.iter().find(|o| o.stock_code == "TOP").unwrap();
    assert!(matches!(top.outcome, PriceOutcome::OutOfRange { .. }));

    let history = t.market.prices().history("AAA").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].changed_at, roll.activation.started_at);
    assert_eq!(t.market.prices().history("TOP").await.unwrap().len(), 1);
}
