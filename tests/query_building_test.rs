//! End-to-end tests for building ReQL terms and converting values

use bytes::Bytes;
use chrono::{FixedOffset, TimeZone};
use rethinkdb_client::reql::func::bound_ids;
use rethinkdb_client::{r, Datum, Term, TermType};
use serde_json::json;
use std::collections::HashMap;

#[test]
fn test_filter_with_row_function() {
    // r.table("users").filter(row => row("age").gt(18))
    let query = r::table("users").filter(|row| row.get_field("age").gt(18));
    assert_eq!(query.term_type, TermType::Filter);

    let function = query.arg(1).expect("filter should carry a function");
    let ids = bound_ids(function).expect("argument should be a FUNC term");
    assert_eq!(ids.len(), 1);
    let id = ids[0];

    assert_eq!(
        query.to_json(),
        json!([39, [
            [15, ["users"]],
            [69, [[2, [id]], [21, [[31, [[10, [id]], "age"]], 18]]]]
        ]])
    );
}

#[test]
fn test_building_does_not_mutate_shared_subexpression() {
    let users = r::table("users");
    let before = users.to_json();

    let adults = users.filter(|row| row.get_field("age").ge(18));
    let names = users.pluck(vec!["name"]).limit(10);

    assert_eq!(users.to_json(), before);
    assert_eq!(adults.arg(0), Some(&users));
    assert_eq!(names.arg(0).and_then(|t| t.arg(0)), Some(&users));
    assert_eq!(adults.to_json()[1][0], before);
    assert_eq!(names.to_json()[1][0][1][0], before);
}

fn name_of(row: Term) -> Term {
    row.get_field("name")
}

#[test]
fn test_same_callback_gets_distinct_ids() {
    let query = r::table("users").map(name_of).map(name_of);
    let inner = query.arg(0).expect("inner map");

    let outer_ids = bound_ids(query.arg(1).unwrap()).unwrap();
    let inner_ids = bound_ids(inner.arg(1).unwrap()).unwrap();
    assert_ne!(outer_ids, inner_ids);
}

#[test]
fn test_nested_functions_do_not_alias() {
    let query = r::table("authors").map(|author| {
        r::table("posts")
            .filter(|post| post.get_field("author_id").eq(author.get_field("id")))
            .count()
    });

    let outer = query.arg(1).unwrap();
    let outer_id = bound_ids(outer).unwrap()[0];

    // FUNC body: COUNT(FILTER(TABLE, FUNC))
    let body = outer.arg(1).unwrap();
    let inner = body.arg(0).unwrap().arg(1).unwrap();
    let inner_id = bound_ids(inner).unwrap()[0];
    assert_ne!(outer_id, inner_id);

    let wire = inner.to_json();
    assert_eq!(
        wire[1][1],
        json!([17, [[31, [[10, [inner_id]], "author_id"]], [31, [[10, [outer_id]], "id"]]]])
    );
}

#[test]
fn test_order_by_and_slice() {
    let query = r::table("scores")
        .order_by(vec![r::desc("points"), r::asc("name")])
        .skip(5)
        .limit(10);
    assert_eq!(
        query.to_json(),
        json!([71, [[70, [[41, [[15, ["scores"]], [74, ["points"]], [73, ["name"]]]], 5]], 10]])
    );
}

#[test]
fn test_term_json_round_trip() {
    let query = r::db("blog")
        .table_in("posts")
        .get_all(vec!["a", "b"])
        .with_optarg("index", "slug");
    let parsed = Term::from_json(&query.to_json()).unwrap();
    assert_eq!(parsed.to_json(), query.to_json());
}

#[test]
fn test_datum_native_conversions() {
    let mut doc = HashMap::new();
    doc.insert("name".to_string(), json!("Ada"));
    doc.insert("tags".to_string(), json!(["math", "engines"]));
    doc.insert("born".to_string(), json!(1815));

    let datum = Datum::from_serialize(&doc).unwrap();
    assert_eq!(
        datum.as_object().and_then(|o| o.get("born")),
        Some(&Datum::Number(1815.0))
    );
    let back: HashMap<String, serde_json::Value> = datum.to_native().unwrap();
    assert_eq!(back, doc);

    let numbers: Vec<i64> = Datum::from(vec![1, 2, 3]).to_native().unwrap();
    assert_eq!(numbers, vec![1, 2, 3]);

    let keyed: HashMap<(i32, i32), i32> = [((1, 2), 3)].into_iter().collect();
    assert!(Datum::from_serialize(&keyed).is_err());
}

#[test]
fn test_time_keeps_instant_and_offset() {
    let offset = FixedOffset::east_opt(2 * 3600).unwrap();
    let when = offset
        .with_ymd_and_hms(2024, 3, 1, 12, 30, 0)
        .unwrap()
        + chrono::TimeDelta::milliseconds(123);

    let datum = Datum::from_native(when);
    let wire = datum.to_json();
    assert_eq!(wire["$reql_type$"], json!("TIME"));
    assert_eq!(wire["timezone"], json!("+02:00"));

    let decoded = Datum::from_json(wire);
    let back = decoded.as_time().unwrap();
    assert_eq!(back, when);
    assert_eq!(back.offset(), &offset);

    let native: chrono::DateTime<FixedOffset> = decoded.to_native().unwrap();
    assert_eq!(native, when);
}

#[test]
fn test_binary_keeps_bytes() {
    let payload = Bytes::from_static(&[0, 159, 146, 150, 255]);
    let wire = Datum::from_native(payload.clone()).to_json();
    assert_eq!(wire["$reql_type$"], json!("BINARY"));

    let decoded = Datum::from_json(wire);
    assert_eq!(decoded.as_binary(), Some(&payload));

    // Bytes travel as a datum, not as a BINARY call.
    let term = r::binary(payload.clone());
    assert_eq!(term.term_type, TermType::Datum);
    assert_eq!(term.to_json()["$reql_type$"], json!("BINARY"));
}

#[test]
fn test_grouped_data_decoding() {
    let wire = json!({
        "$reql_type$": "GROUPED_DATA",
        "data": [["red", 2], ["blue", 5]]
    });
    let datum = Datum::from_json(wire.clone());
    let groups = datum.as_grouped().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0], (Datum::from("red"), Datum::from(2)));
    assert_eq!(datum.to_json(), wire);
}
