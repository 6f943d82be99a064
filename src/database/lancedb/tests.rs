use super::*;

#[test]
fn vector_record_structure() {
    let record = VectorRecord {
        id: record_id(7),
        embedding: vec![0.1, 0.2, 0.3],
        text: "Gradient descent minimises a loss function.".to_string(),
        source: "Gradient descent".to_string(),
        chunk_index: 2,
    };

    assert_eq!(record.id, "document_7");
    assert_eq!(record.embedding.len(), 3);
    assert_eq!(record.chunk_index, 2);
}

#[test]
fn distance_metric_names() {
    assert_eq!(DistanceMetric::default(), DistanceMetric::Cosine);
    assert_eq!(DistanceMetric::Cosine.to_string(), "cosine");
    assert_eq!(DistanceMetric::L2.to_string(), "l2");
    assert_eq!(DistanceMetric::Dot.to_string(), "dot");

    for metric in [DistanceMetric::Cosine, DistanceMetric::L2, DistanceMetric::Dot] {
        let parsed: DistanceMetric = metric.as_str().parse().expect("metric should parse");
        assert_eq!(parsed, metric);
    }
    assert_eq!(
        "COSINE".parse::<DistanceMetric>().expect("case insensitive"),
        DistanceMetric::Cosine
    );
    assert!(matches!(
        "manhattan".parse::<DistanceMetric>(),
        Err(RagError::Config(_))
    ));
}

#[test]
fn distance_metric_maps_to_lance() {
    assert!(matches!(
        DistanceMetric::Cosine.distance_type(),
        lancedb::DistanceType::Cosine
    ));
    assert!(matches!(
        DistanceMetric::L2.distance_type(),
        lancedb::DistanceType::L2
    ));
    assert!(matches!(
        DistanceMetric::Dot.distance_type(),
        lancedb::DistanceType::Dot
    ));
}

#[test]
fn distance_metric_serialization() {
    let json = serde_json::to_string(&DistanceMetric::L2).expect("can serialize json");
    assert_eq!(json, "\"l2\"");
    let parsed: DistanceMetric = serde_json::from_str("\"dot\"").expect("can parse json");
    assert_eq!(parsed, DistanceMetric::Dot);
}
