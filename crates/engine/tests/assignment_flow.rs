//! End-to-end assignment flows over the browser-shaped backends.

use std::sync::Arc;

use segmab_core::clock::manual_clock;
use segmab_core::config::{StoreBackend, StoreSettings};
use segmab_core::event_bus::{capture_sink, SegmentEventType};
use segmab_core::types::MS_PER_DAY;
use segmab_core::SegmabSettings;
use segmab_engine::{
    CommandQueue, ConfigError, DataLayerHook, SegmentCommand, SegmentConfig, SegmentationEngine,
};
use segmab_store::{
    open_store, CookieJar, CookieStore, InMemoryCookieJar, InMemoryWebStorage, InstrumentedStore,
    LocalStorageStore, MemoryStore, SegmentStore, WebStorage,
};
use serde_json::json;

const T0: i64 = 1_700_000_000_000;

#[test]
fn fresh_visitor_keeps_segment_for_retention_window() {
    let clock = manual_clock(T0 + 417);
    let storage = Arc::new(InMemoryWebStorage::new());
    let store = Arc::new(InstrumentedStore::new(LocalStorageStore::new(
        storage.clone(),
        clock.clone(),
    )));
    let engine = SegmentationEngine::new(store.clone(), clock.clone());
    let config = SegmentConfig::new("ab", 2, 30);

    let first = engine.get_segment(&config).unwrap();
    assert!(first == "A" || first == "B");

    let expires: i64 = storage
        .get_item("abVisitorSegment_expiration")
        .unwrap()
        .parse()
        .unwrap();
    let expected = T0 + 417 + 30 * MS_PER_DAY;
    assert!((expires - expected).abs() <= 1_000);

    clock.advance_ms(MS_PER_DAY);
    assert_eq!(engine.get_segment(&config).unwrap(), first);
    assert_eq!(store.writes(), 1);
}

#[test]
fn cookie_backed_visitor_round_trip() {
    let clock = manual_clock(T0);
    let jar = Arc::new(InMemoryCookieJar::new(clock.clone()));
    let store = Arc::new(InstrumentedStore::new(
        CookieStore::for_page_url(jar.clone(), "https://www.example.com/landing", clock.clone())
            .unwrap(),
    ));
    let engine = SegmentationEngine::new(store.clone(), clock.clone());
    let config = SegmentConfig::new("promo", 5, 14);

    let segment = engine.get_segment(&config).unwrap();
    let cookie = jar.cookie("promoVisitorSegment").unwrap();
    assert_eq!(cookie.value, segment.as_str());
    assert_eq!(cookie.domain.as_deref(), Some(".example.com"));

    clock.advance_ms(13 * MS_PER_DAY);
    assert_eq!(engine.get_segment(&config).unwrap(), segment);
    assert_eq!(store.writes(), 1);

    // cookie expired: next call derives and writes again
    clock.advance_ms(MS_PER_DAY);
    engine.get_segment(&config).unwrap();
    assert_eq!(store.writes(), 2);
}

#[test]
fn cookie_values_are_compared_upper_cased() {
    let clock = manual_clock(T0);
    let jar = Arc::new(InMemoryCookieJar::new(clock.clone()));
    jar.write("xVisitorSegment=b; path=/");
    let store = Arc::new(InstrumentedStore::new(CookieStore::with_domain(
        jar,
        "example.com",
        clock.clone(),
    )));
    let engine = SegmentationEngine::new(store.clone(), clock);

    assert_eq!(engine.get_segment(&SegmentConfig::new("x", 2, 7)).unwrap(), "B");
    assert_eq!(store.writes(), 0);
}

#[test]
fn shrinking_segment_count_reassigns() {
    let clock = manual_clock(T0);
    let store = Arc::new(InstrumentedStore::new(MemoryStore::new(clock.clone())));
    store.set("expVisitorSegment", "Z", 30);
    let engine = SegmentationEngine::new(store.clone(), clock);

    let segment = engine.get_segment(&SegmentConfig::new("exp", 3, 30)).unwrap();
    assert!(["A", "B", "C"].contains(&segment.as_str()));
    assert_eq!(store.writes(), 2);
}

#[test]
fn invalid_configurations_fail_fast() {
    let clock = manual_clock(T0);
    let store = Arc::new(InstrumentedStore::new(MemoryStore::new(clock.clone())));
    let engine = SegmentationEngine::new(store.clone(), clock);

    assert_eq!(
        engine.get_segment(&SegmentConfig::new("", 3, 7)),
        Err(ConfigError::EmptyPrefix)
    );
    assert!(matches!(
        engine.get_segment(&SegmentConfig::new("x", 1, 7)),
        Err(ConfigError::SegmentCountOutOfRange { .. })
    ));
    assert!(matches!(
        engine.get_segment(&SegmentConfig::new("x", 3, 0)),
        Err(ConfigError::InvalidRetention { .. })
    ));
    assert_eq!(store.counters().reads, 0);
}

#[test]
fn analytics_and_events_observe_without_changing_result() {
    let clock = manual_clock(T0);
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let hook = Arc::new(DataLayerHook::new("ab_test"));
    let sink = capture_sink();
    let engine = SegmentationEngine::new(store, clock)
        .with_analytics(hook.clone())
        .with_event_sink(sink.clone());

    let config = SegmentConfig::new("hero", 2, 7).with_dimension("dimension3");
    let mut callback_value = None;
    let segment = engine
        .get_segment_with(&config, |s| callback_value = Some(s.clone()))
        .unwrap();

    assert_eq!(callback_value.as_ref(), Some(&segment));
    let pushes = hook.pushes();
    assert_eq!(pushes, vec![json!({"event": "ab_test", "dimension3": segment.as_str()})]);
    assert_eq!(sink.count_type(SegmentEventType::Assigned), 1);
}

#[test]
fn queued_page_commands_replay_through_settings_built_store() {
    let settings = SegmabSettings {
        store: StoreSettings {
            backend: StoreBackend::LocalStorage,
            ..Default::default()
        },
        ..Default::default()
    };
    let clock = manual_clock(T0);
    let store = open_store(&settings.store, "https://example.com", clock.clone()).unwrap();

    let mut queue = CommandQueue::new();
    queue.push(SegmentCommand::new(settings.default_segment_config()));
    queue.push(SegmentCommand::from_args(&[json!({
        "namePrefix": "checkout",
        "segmentCount": 4,
        "retentionDays": 10
    })]));

    let engine = Arc::new(SegmentationEngine::new(store.clone(), clock));
    let outcomes = queue.attach(engine);

    let default_segment = outcomes[0].segment().unwrap();
    let checkout_segment = outcomes[1].segment().unwrap();
    assert_eq!(
        store.get("segmabVisitorSegment").as_deref(),
        Some(default_segment.as_str())
    );
    assert_eq!(
        store.get("checkoutVisitorSegment").as_deref(),
        Some(checkout_segment.as_str())
    );
}
