use shopfloor_store::{
    scrape_metric_names, ObservationStore, PointId, PointSpec, StoreConfig,
    DUPLICATES_SUPPRESSED_TOTAL, EVICTED_QUERIES_TOTAL, RECORDS_APPENDED_TOTAL,
    RECORDS_EVICTED_TOTAL, RESET_TRIGGERS_TOTAL,
};

#[test]
fn exposition_lists_every_counter() {
    let store = ObservationStore::open(StoreConfig::default()).expect("open store");
    let exposition = store.telemetry().render_exposition();
    assert_eq!(
        scrape_metric_names(&exposition),
        vec![
            RECORDS_APPENDED_TOTAL.to_string(),
            DUPLICATES_SUPPRESSED_TOTAL.to_string(),
            RESET_TRIGGERS_TOTAL.to_string(),
            RECORDS_EVICTED_TOTAL.to_string(),
            EVICTED_QUERIES_TOTAL.to_string(),
        ]
    );
    assert!(exposition.contains("# TYPE shopfloor_store_records_appended_total counter"));
}

#[test]
fn scrape_strips_labels() {
    let names = scrape_metric_names("# HELP x\nfoo_total{point=\"a\"} 3\n\nbar 1\n");
    assert_eq!(names, vec!["foo_total".to_string(), "bar".to_string()]);
}

#[test]
fn counters_track_ingest() {
    let store = ObservationStore::open(StoreConfig {
        buffer_capacity: 2,
        points: vec![PointSpec::table("vars")],
        ..StoreConfig::default()
    })
    .expect("open store");
    let id = PointId::from("vars");
    for payload in ["a=1", "a=1", ":DAY a=2", "a=3", "a=3"] {
        store.ingest(&id, "t", payload).expect("ingest");
    }
    let snapshot = store.telemetry();
    assert_eq!(snapshot.records_appended_total, 3);
    assert_eq!(snapshot.duplicates_suppressed_total, 2);
    assert_eq!(snapshot.reset_triggers_total, 1);
    assert_eq!(snapshot.records_evicted_total, 1);
    assert!(snapshot
        .render_exposition()
        .lines()
        .any(|line| line == "shopfloor_store_records_appended_total 3"));
}
