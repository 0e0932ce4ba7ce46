// tests/providers_metr.rs
use eval_tracker::ingest::providers::metr::MetrExtractor;

const REPORT: &str = r#"<!doctype html>
<html>
<head>
  <title>Details about METR's evaluation of OpenAI GPT-5</title>
  <script>window.dataLayer = [{"p": "50% 9 min"}];</script>
</head>
<body>
  <h2>Time horizon</h2>
  <p>We estimate that GPT-5 has a 50% time horizon of <strong>2h 17min</strong>
     (95% CI: 65 min &ndash; 4 hr 25 min).</p>
  <p>The 80% time horizon is 25 minutes (95% CI: 8 min - 1 hr 5 min).</p>
</body>
</html>"#;

fn value(v: &[eval_tracker::MetricObservation], key: &str) -> Option<f64> {
    v.iter().find(|o| o.metric_key == key).map(|o| o.value)
}

#[test]
fn extracts_point_estimates_and_intervals() {
    let v = MetrExtractor::parse(REPORT, "METR GPT-5 report");

    assert_eq!(value(&v, "metr_time_horizon_p50_minutes"), Some(137.0));
    assert_eq!(value(&v, "metr_time_horizon_p50_ci_low_minutes"), Some(65.0));
    assert_eq!(value(&v, "metr_time_horizon_p50_ci_high_minutes"), Some(265.0));
    assert_eq!(value(&v, "metr_time_horizon_p80_minutes"), Some(25.0));
    assert_eq!(value(&v, "metr_time_horizon_p80_ci_low_minutes"), Some(8.0));
    assert_eq!(value(&v, "metr_time_horizon_p80_ci_high_minutes"), Some(65.0));
    assert_eq!(v.len(), 6);

    assert!(v
        .iter()
        .all(|o| o.entity == "Details about METR's evaluation of OpenAI GPT-5"));
    assert!(v.iter().all(|o| o.unit == "minutes"));
    assert!(v.iter().all(|o| o.validate().is_ok()));
    assert!(v[0].evidence.contains("time horizon"));
}

#[test]
fn page_without_horizons_yields_nothing() {
    let v = MetrExtractor::parse("<title>News</title><p>No numbers here.</p>", "x");
    assert!(v.is_empty());
}
