//! End-to-end tests for the broadcast and refresh pipeline over the
//! in-memory store.
//!
//! Sessions are driven through [`ConnectionSession`] exactly as the gateway
//! drives them, without a transport.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tablecast_core::{
    Aggregator, AggregatorSettings, Broadcaster, ConnectionSession, MemoryStore, RefreshPipeline,
    SubscriptionRegistry,
};
use tablecast_types::{
    AnalyticsSnapshot, EventKind, EventPayload, MenuItem, MenuItemId, Order, OrderId, OrderItem,
    OrderItemId, OrderStatus, RestaurantId, TimeWindow, UserId,
};

struct Harness {
    store: Arc<MemoryStore>,
    registry: Arc<SubscriptionRegistry>,
    pipeline: Arc<RefreshPipeline>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(SubscriptionRegistry::new());
    let pipeline = Arc::new(RefreshPipeline::new(
        Aggregator::new(store.clone(), AggregatorSettings::default()),
        Broadcaster::new(Arc::clone(&registry)),
    ));
    Harness {
        store,
        registry,
        pipeline,
    }
}

fn menu_item(id: i64, restaurant: i64, name: &str) -> MenuItem {
    let now = Utc::now();
    MenuItem {
        id: MenuItemId::new(id),
        restaurant_id: RestaurantId::new(restaurant),
        name: name.to_owned(),
        description: None,
        price: Decimal::new(1450, 2),
        category: String::from("Mains"),
        image_url: None,
        is_available: true,
        popularity_score: 0,
        created_at: now,
        updated_at: now,
    }
}

fn order_at(
    id: i64,
    restaurant: i64,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    lines: &[(i64, u32)],
) -> Order {
    Order {
        id: OrderId::new(id),
        restaurant_id: RestaurantId::new(restaurant),
        user_id: UserId::new(1),
        status,
        total_amount: Decimal::new(2900, 2),
        delivery_address: String::from("12 Market Rd"),
        phone_number: String::from("555-0199"),
        payment_method: String::from("CARD"),
        notes: None,
        items: lines
            .iter()
            .enumerate()
            .map(|(n, &(menu_item, quantity))| OrderItem {
                id: OrderItemId::new(id * 100 + n as i64),
                menu_item_id: MenuItemId::new(menu_item),
                quantity,
                price: Decimal::new(1450, 2),
            })
            .collect(),
        created_at,
        updated_at: created_at,
    }
}

fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - TimeDelta::minutes(minutes)
}

fn snapshot_of(payload: &EventPayload) -> &AnalyticsSnapshot {
    match payload {
        EventPayload::AnalyticsUpdated(snapshot) => snapshot,
        other => panic!("expected analytics payload, got {:?}", other.kind()),
    }
}

#[tokio::test]
async fn mutation_reaches_only_its_restaurant_in_order() {
    let h = harness();
    let mut watching = ConnectionSession::open(Arc::clone(&h.registry), 16).await;
    let mut elsewhere = ConnectionSession::open(Arc::clone(&h.registry), 16).await;
    assert!(watching.join(RestaurantId::new(5)).await.is_success());
    assert!(elsewhere.join(RestaurantId::new(6)).await.is_success());

    let order = order_at(1, 5, OrderStatus::Pending, Utc::now(), &[]);
    h.store.upsert_order(order.clone()).await;
    let outcome = h
        .pipeline
        .on_mutation(tablecast_types::DomainEvent::order_created(order))
        .await
        .unwrap();
    assert_eq!(outcome.report.delivered, 1);
    outcome.refresh.unwrap().await.unwrap().unwrap();

    let first = watching.recv().await.unwrap();
    let second = watching.recv().await.unwrap();
    assert_eq!(first.kind(), EventKind::OrderCreated);
    assert_eq!(second.kind(), EventKind::AnalyticsUpdated);
    assert_eq!(second.restaurant_id(), RestaurantId::new(5));

    assert!(elsewhere.try_recv().is_none());

    watching.close().await;
    elsewhere.close().await;
    assert_eq!(h.registry.stats().await.sessions, 0);
}

#[tokio::test]
async fn popular_dishes_rank_and_cap() {
    let h = harness();
    for (id, name) in [(1, "A"), (2, "B"), (3, "C")] {
        h.store.upsert_menu_item(menu_item(id, 5, name)).await;
    }
    h.store
        .upsert_order(order_at(1, 5, OrderStatus::Delivered, minutes_ago(60), &[(1, 10), (2, 3)]))
        .await;

    let dishes = h.pipeline.aggregator().popular_dishes(RestaurantId::new(5)).await.unwrap();
    let names: Vec<&str> = dishes.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);

    for (id, name) in [(4, "D"), (5, "E"), (6, "F")] {
        h.store.upsert_menu_item(menu_item(id, 5, name)).await;
    }
    h.store
        .upsert_order(order_at(2, 5, OrderStatus::Delivered, minutes_ago(30), &[(4, 15), (5, 2), (6, 1)]))
        .await;

    let dishes = h.pipeline.aggregator().popular_dishes(RestaurantId::new(5)).await.unwrap();
    let names: Vec<&str> = dishes.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["D", "A", "B", "E", "F"]);
}

#[tokio::test]
async fn average_delivery_time_over_window() {
    let h = harness();
    for (id, minutes) in [(1, 10), (2, 20), (3, 30)] {
        let created_at = minutes_ago(120);
        let mut order = order_at(id, 5, OrderStatus::Delivered, created_at, &[]);
        order.updated_at = created_at + TimeDelta::minutes(minutes);
        h.store.upsert_order(order).await;
    }

    let stats = h
        .pipeline
        .aggregator()
        .average_delivery_time(RestaurantId::new(5), TimeWindow::Day)
        .await
        .unwrap();
    assert_eq!(stats.average_delivery_time, Decimal::from(20));
    assert_eq!(stats.order_count, 3);
    assert_eq!(stats.unit, "minutes");

    let empty = h
        .pipeline
        .aggregator()
        .average_delivery_time(RestaurantId::new(6), TimeWindow::Month)
        .await
        .unwrap();
    assert_eq!(empty.average_delivery_time, Decimal::ZERO);
    assert_eq!(empty.time_window, TimeWindow::Month);
}

#[tokio::test]
async fn peak_hours_from_order_times() {
    let h = harness();
    let yesterday = Utc::now().date_naive().pred_opt().unwrap();
    for (id, hour) in [9, 9, 9, 14, 14, 20].into_iter().enumerate() {
        let at = yesterday
            .and_time(NaiveTime::from_hms_opt(hour, 15, 0).unwrap())
            .and_utc();
        h.store
            .upsert_order(order_at(id as i64 + 1, 5, OrderStatus::Delivered, at, &[]))
            .await;
    }

    let peaks = h
        .pipeline
        .aggregator()
        .peak_ordering_times(RestaurantId::new(5))
        .await
        .unwrap();
    let summary: Vec<(u32, u64)> = peaks.iter().map(|p| (p.hour, p.order_count)).collect();
    assert_eq!(summary, vec![(9, 3), (14, 2), (20, 1)]);
    assert_eq!(peaks[0].time_range, "9:00 - 10:00");
}

#[tokio::test]
async fn stale_threshold_and_terminal_statuses() {
    let h = harness();
    h.store
        .upsert_order(order_at(1, 5, OrderStatus::Pending, minutes_ago(45), &[]))
        .await;
    h.store
        .upsert_order(order_at(2, 5, OrderStatus::Delivered, minutes_ago(45), &[]))
        .await;
    h.store
        .upsert_order(order_at(3, 5, OrderStatus::Cancelled, minutes_ago(300), &[]))
        .await;

    let aggregator = h.pipeline.aggregator();
    let at_30 = aggregator.stale_orders(30).await.unwrap();
    assert_eq!(at_30.iter().map(|o| o.id).collect::<Vec<_>>(), vec![OrderId::new(1)]);
    assert!(aggregator.stale_orders(60).await.unwrap().is_empty());
}

#[tokio::test]
async fn snapshot_narrows_stale_orders_to_restaurant() {
    let h = harness();
    h.store
        .upsert_order(order_at(1, 5, OrderStatus::Preparing, minutes_ago(90), &[]))
        .await;
    h.store
        .upsert_order(order_at(2, 6, OrderStatus::Preparing, minutes_ago(120), &[]))
        .await;

    let snapshot = h.pipeline.snapshot(RestaurantId::new(5)).await;
    assert_eq!(snapshot.stale_orders.len(), 1);
    assert_eq!(snapshot.stale_orders[0].id, OrderId::new(1));
    assert_eq!(snapshot.summary.stale_order_count, 1);
}

#[tokio::test]
async fn repeated_refresh_is_idempotent() {
    let h = harness();
    h.store.upsert_menu_item(menu_item(1, 5, "Ramen")).await;
    h.store
        .upsert_order(order_at(1, 5, OrderStatus::Delivered, minutes_ago(50), &[(1, 2)]))
        .await;
    let mut session = ConnectionSession::open(Arc::clone(&h.registry), 16).await;
    session.join(RestaurantId::new(5)).await;

    let first = h.pipeline.refresh(RestaurantId::new(5)).await.unwrap();
    let second = h.pipeline.refresh(RestaurantId::new(5)).await.unwrap();

    let mut a = first.snapshot;
    let mut b = second.snapshot;
    a.timestamp = b.timestamp;
    assert_eq!(a, b);
    assert_eq!(a.summary.top_dish.as_deref(), Some("Ramen"));

    let pushed_a = session.recv().await.unwrap();
    let pushed_b = session.recv().await.unwrap();
    assert_eq!(
        snapshot_of(pushed_a.payload()).popular_dishes,
        snapshot_of(pushed_b.payload()).popular_dishes
    );
    assert_eq!(
        h.store.menu_item(MenuItemId::new(1)).await.map(|i| i.popularity_score),
        Some(2)
    );
}

#[tokio::test]
async fn registry_stays_consistent_under_churn() {
    let registry = Arc::new(SubscriptionRegistry::new());
    let mut sessions = Vec::new();
    for _ in 0..6 {
        sessions.push(Some(ConnectionSession::open(Arc::clone(&registry), 4).await));
    }

    let mut rng = SmallRng::seed_from_u64(0x5eed);

    for _ in 0..400 {
        let slot: usize = rng.random_range(0..6);
        let restaurant = RestaurantId::new(rng.random_range(1..=4));
        match rng.random_range(0..5) {
            0 | 1 => {
                if let Some(session) = sessions[slot].as_ref() {
                    session.join(restaurant).await;
                }
            }
            2 | 3 => {
                if let Some(session) = sessions[slot].as_ref() {
                    session.leave(restaurant).await;
                }
            }
            _ => {
                if let Some(session) = sessions[slot].take() {
                    session.close().await;
                }
                sessions[slot] = Some(ConnectionSession::open(Arc::clone(&registry), 4).await);
            }
        }
        assert!(registry.is_consistent().await);
    }

    for slot in &mut sessions {
        if let Some(session) = slot.take() {
            session.close().await;
        }
    }
    let stats = registry.stats().await;
    assert_eq!((stats.sessions, stats.channels, stats.subscriptions), (0, 0, 0));
}
