//! Integration tests for the driver protocol against a scripted in-memory server

use rethinkdb_client::network::protocol::{read_query, write_response};
use rethinkdb_client::network::{Handshake, ResponseMessage};
use rethinkdb_client::reql::{ErrorType, QueryType};
use rethinkdb_client::{r, Connection, ConnectionConfig, Datum, Error, QueryResult, RunOptions};
use serde_json::{json, Value};
use std::collections::HashSet;
use tokio::io::{duplex, AsyncReadExt, DuplexStream};
use tokio::sync::oneshot;
use tokio::time::{timeout, Duration};

/// Client connection over an in-memory pipe whose far end is `server`.
async fn connect_mock<F, Fut>(server: F) -> (Connection, tokio::task::JoinHandle<Fut::Output>)
where
    F: FnOnce(DuplexStream) -> Fut,
    Fut: std::future::Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let (client, server_side) = duplex(64 * 1024);
    let handle = tokio::spawn(server(server_side));
    let conn = Connection::from_stream(client, ConnectionConfig::default())
        .await
        .expect("handshake should succeed");
    (conn, handle)
}

async fn respond(stream: &mut DuplexStream, token: u64, response: Value) {
    write_response(stream, &ResponseMessage { token, response })
        .await
        .expect("Failed to write response");
}

#[tokio::test]
async fn test_atom_response() {
    let (conn, server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let query = read_query(&mut stream).await.unwrap();
        assert_eq!(query.query_type(), Some(QueryType::Start));
        assert_eq!(query.query[1], json!([43, [[15, ["users"]]]]));
        respond(&mut stream, query.token, json!([1, 42, {}])).await;
        stream
    })
    .await;

    let result = r::table("users").count().run(&conn).await.unwrap();
    match result {
        QueryResult::Atom(datum) => assert_eq!(datum, Datum::Number(42.0)),
        other => panic!("Expected atom, got: {:?}", other),
    }
    drop(server.await.unwrap());
}

#[tokio::test]
async fn test_sequence_response() {
    let (conn, _server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let query = read_query(&mut stream).await.unwrap();
        respond(&mut stream, query.token, json!([2, ["a", "b"], {}])).await;
        stream
    })
    .await;

    let rows = r::db_list().run(&conn).await.unwrap().into_vec().await.unwrap();
    assert_eq!(rows, vec![Datum::from("a"), Datum::from("b")]);
}

#[tokio::test]
async fn test_cursor_continues_until_sequence() {
    let (conn, server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let start = read_query(&mut stream).await.unwrap();
        respond(&mut stream, start.token, json!([3, [1, 2], {}])).await;

        let mut continues = 0;
        while let Ok(query) = read_query(&mut stream).await {
            assert_eq!(query.token, start.token);
            assert_eq!(query.query_type(), Some(QueryType::Continue));
            continues += 1;
            respond(&mut stream, query.token, json!([2, [3], {}])).await;
        }
        continues
    })
    .await;

    let mut cursor = match r::table("numbers").run(&conn).await.unwrap() {
        QueryResult::Cursor(cursor) => cursor,
        other => panic!("Expected cursor, got: {:?}", other),
    };
    assert_eq!(cursor.buffered(), 2);

    let mut seen = Vec::new();
    while let Some(row) = cursor.next().await.unwrap() {
        seen.push(row);
    }
    assert_eq!(seen, vec![Datum::from(1), Datum::from(2), Datum::from(3)]);
    assert!(cursor.is_exhausted());

    // Past the end stays at the end without another round trip.
    assert!(cursor.next().await.unwrap().is_none());
    assert!(cursor.next().await.unwrap().is_none());

    drop(cursor);
    conn.close().await.unwrap();
    let continues = timeout(Duration::from_secs(1), server).await.unwrap().unwrap();
    assert_eq!(continues, 1, "exactly one CONTINUE should be sent");
}

#[tokio::test]
async fn test_rejected_handshake_sends_no_frames() {
    let (client, mut server) = duplex(64 * 1024);
    let server = tokio::spawn(async move {
        let request = Handshake::read_request(&mut server).await.unwrap();
        assert_eq!(request.auth_key.as_deref(), Some("wrong"));
        Handshake::write_ack(&mut server, "ERROR: bad auth").await.unwrap();

        let mut rest = Vec::new();
        server.read_to_end(&mut rest).await.unwrap();
        rest
    });

    let config = ConnectionConfig::default().with_auth_key("wrong");
    let err = Connection::from_stream(client, config).await.unwrap_err();
    match err {
        Error::Handshake(message) => assert_eq!(message, "ERROR: bad auth"),
        other => panic!("Expected handshake error, got: {:?}", other),
    }

    let rest = server.await.unwrap();
    assert!(rest.is_empty(), "no query frames after a failed handshake");
}

#[tokio::test]
async fn test_out_of_order_responses() {
    let (conn, _server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let first = read_query(&mut stream).await.unwrap();
        let second = read_query(&mut stream).await.unwrap();
        assert_ne!(first.token, second.token);

        // Answer in reverse, echoing each query's term back.
        respond(&mut stream, second.token, json!([1, second.query[1].clone(), {}])).await;
        respond(&mut stream, first.token, json!([1, first.query[1].clone(), {}])).await;
        stream
    })
    .await;

    let one = r::expr("one");
    let two = r::expr("two");
    let (a, b) = tokio::join!(one.run(&conn), two.run(&conn));
    assert_eq!(a.unwrap().into_atom(), Some(Datum::from("one")));
    assert_eq!(b.unwrap().into_atom(), Some(Datum::from("two")));
}

#[tokio::test]
async fn test_concurrent_runs_get_distinct_tokens() {
    const RUNS: usize = 32;

    let (conn, server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let mut queries = Vec::with_capacity(RUNS);
        for _ in 0..RUNS {
            queries.push(read_query(&mut stream).await.unwrap());
        }
        let tokens: HashSet<u64> = queries.iter().map(|q| q.token).collect();

        for query in queries.iter().rev() {
            respond(&mut stream, query.token, json!([1, query.query[1].clone(), {}])).await;
        }
        (tokens, stream)
    })
    .await;

    let mut runs = tokio::task::JoinSet::new();
    for i in 0..RUNS {
        let conn = conn.clone();
        runs.spawn(async move { (i, r::expr(i as u64).run(&conn).await) });
    }
    while let Some(joined) = runs.join_next().await {
        let (i, result) = joined.unwrap();
        assert_eq!(result.unwrap().into_atom(), Some(Datum::from(i as u64)));
    }

    let (tokens, _stream) = server.await.unwrap();
    assert_eq!(tokens.len(), RUNS, "every concurrent run needs its own token");
}

#[tokio::test]
async fn test_cancelled_run_leaves_framing_intact() {
    let (client, server_side) = duplex(256);
    let (go_tx, go_rx) = oneshot::channel::<()>();
    let large = "x".repeat(4096);
    let expected = json!(large.clone());

    let server = tokio::spawn(async move {
        let mut stream = server_side;
        Handshake::accept(&mut stream).await.unwrap();
        // Stall so the large frame cannot be written in one go.
        go_rx.await.unwrap();

        let first = read_query(&mut stream).await.unwrap();
        assert_eq!(first.query[1], expected);
        // Its caller is gone; this response must be dropped.
        respond(&mut stream, first.token, json!([1, "late", {}])).await;

        let second = read_query(&mut stream).await.unwrap();
        assert_ne!(second.token, first.token);
        respond(&mut stream, second.token, json!([1, 1, {}])).await;
        stream
    });

    let conn = Connection::from_stream(client, ConnectionConfig::default())
        .await
        .unwrap();

    let cancelled = timeout(Duration::from_millis(50), r::expr(large).run(&conn)).await;
    assert!(cancelled.is_err(), "the large run should still be writing");
    go_tx.send(()).unwrap();

    let next = timeout(Duration::from_secs(1), r::expr(1).run(&conn))
        .await
        .expect("connection should stay usable")
        .unwrap();
    assert_eq!(next.into_atom(), Some(Datum::from(1)));
    drop(server.await.unwrap());
}

#[tokio::test]
async fn test_runtime_error_keeps_connection_usable() {
    let (conn, _server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let query = read_query(&mut stream).await.unwrap();
        respond(
            &mut stream,
            query.token,
            json!([18, "Table `test.missing` does not exist.", {"b": [0], "e": 4100000}]),
        )
        .await;

        let query = read_query(&mut stream).await.unwrap();
        respond(&mut stream, query.token, json!([1, true, {}])).await;
        stream
    })
    .await;

    let err = r::table("missing").run(&conn).await.unwrap_err();
    match err {
        Error::Runtime {
            message,
            trace,
            error_type,
        } => {
            assert_eq!(message, "Table `test.missing` does not exist.");
            assert_eq!(trace, Some(Datum::from(vec![0])));
            assert_eq!(error_type, Some(ErrorType::OpFailed));
        }
        other => panic!("Expected runtime error, got: {:?}", other),
    }

    let ok = r::expr(true).run(&conn).await.unwrap();
    assert_eq!(ok.into_atom(), Some(Datum::Boolean(true)));
}

#[tokio::test]
async fn test_compile_error() {
    let (conn, _server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let query = read_query(&mut stream).await.unwrap();
        respond(&mut stream, query.token, json!([17, "Expected 1 argument but found 2.", {}])).await;
        stream
    })
    .await;

    let err = r::table("users").run(&conn).await.unwrap_err();
    assert!(matches!(err, Error::Compile { .. }));
    assert!(err.is_query_error());
}

#[tokio::test]
async fn test_close_fails_outstanding_queries() {
    let (seen_tx, seen_rx) = oneshot::channel();
    let (conn, _server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let _query = read_query(&mut stream).await.unwrap();
        seen_tx.send(()).unwrap();
        // Never answer; hold the stream until the client hangs up.
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    })
    .await;

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { r::table("slow").run(&conn).await }
    });
    seen_rx.await.unwrap();

    conn.close().await.unwrap();
    let result = timeout(Duration::from_secs(1), pending).await.unwrap().unwrap();
    assert!(matches!(result, Err(Error::ConnectionClosed)));

    assert!(conn.is_closed());
    let after = r::expr(1).run(&conn).await;
    assert!(matches!(after, Err(Error::ConnectionClosed)));
    // Closing twice is fine.
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_server_hangup_fails_waiter() {
    let (conn, _server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let _query = read_query(&mut stream).await.unwrap();
        drop(stream);
    })
    .await;

    let result = timeout(Duration::from_secs(1), r::table("t").run(&conn))
        .await
        .unwrap();
    assert!(matches!(result, Err(Error::ConnectionClosed)));
    assert!(conn.is_closed());
}

#[tokio::test]
async fn test_stop_discards_late_frame() {
    let (conn, server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let start = read_query(&mut stream).await.unwrap();
        respond(&mut stream, start.token, json!([3, [1], {}])).await;

        let stop = read_query(&mut stream).await.unwrap();
        assert_eq!(stop.token, start.token);
        assert_eq!(stop.query_type(), Some(QueryType::Stop));
        assert_eq!(stop.query, json!([3]));

        // A batch that was already in flight when STOP arrived.
        respond(&mut stream, start.token, json!([3, [2], {}])).await;

        let next = read_query(&mut stream).await.unwrap();
        assert_ne!(next.token, start.token);
        respond(&mut stream, next.token, json!([1, "ok", {}])).await;
        stream
    })
    .await;

    let mut cursor = match r::table("feed").run(&conn).await.unwrap() {
        QueryResult::Cursor(cursor) => cursor,
        other => panic!("Expected cursor, got: {:?}", other),
    };
    cursor.stop().await.unwrap();
    assert!(cursor.is_exhausted());
    assert!(cursor.next().await.unwrap().is_none());
    // Idempotent: no second STOP frame.
    cursor.stop().await.unwrap();

    let ok = r::expr("ok").run(&conn).await.unwrap();
    assert_eq!(ok.into_atom(), Some(Datum::from("ok")));
    drop(server.await.unwrap());
}

#[tokio::test]
async fn test_noreply_and_noreply_wait() {
    let (conn, server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let insert = read_query(&mut stream).await.unwrap();
        assert_eq!(insert.query[2]["noreply"], json!(true));

        let wait = read_query(&mut stream).await.unwrap();
        assert_eq!(wait.query, json!([4]));
        respond(&mut stream, wait.token, json!([4, null, {}])).await;
        stream
    })
    .await;

    let insert = r::table("logs").insert(json!({"msg": "hello"}));
    let result = insert
        .run_with(&conn, &RunOptions::new().noreply(true))
        .await
        .unwrap();
    assert!(matches!(result, QueryResult::Empty));

    conn.noreply_wait().await.unwrap();
    drop(server.await.unwrap());
}

#[tokio::test]
async fn test_default_db_sent_as_global_optarg() {
    let (client, server_side) = duplex(64 * 1024);
    let server = tokio::spawn(async move {
        let mut stream = server_side;
        Handshake::accept(&mut stream).await.unwrap();
        let first = read_query(&mut stream).await.unwrap();
        respond(&mut stream, first.token, json!([1, null, {}])).await;
        let second = read_query(&mut stream).await.unwrap();
        respond(&mut stream, second.token, json!([1, null, {}])).await;
        (first.query[2].clone(), second.query[2].clone())
    });

    let conn = Connection::from_stream(client, ConnectionConfig::default().with_db("blog"))
        .await
        .unwrap();
    assert_eq!(conn.db().as_deref(), Some("blog"));
    r::table("posts").run(&conn).await.unwrap();

    conn.use_db("archive");
    r::table("posts").run(&conn).await.unwrap();

    let (first, second) = server.await.unwrap();
    assert_eq!(first, json!({"db": [14, ["blog"]]}));
    assert_eq!(second, json!({"db": [14, ["archive"]]}));
}

#[tokio::test]
async fn test_server_info() {
    let (conn, _server) = connect_mock(|mut stream| async move {
        Handshake::accept(&mut stream).await.unwrap();
        let query = read_query(&mut stream).await.unwrap();
        assert_eq!(query.query_type(), Some(QueryType::ServerInfo));
        respond(
            &mut stream,
            query.token,
            json!([5, {"id": "abc", "name": "node1"}, {}]),
        )
        .await;
        stream
    })
    .await;

    let info = conn.server_info().await.unwrap();
    assert_eq!(
        info.as_object().and_then(|o| o.get("name")),
        Some(&Datum::from("node1"))
    );
}

#[tokio::test]
async fn test_connect_refused_is_io_error() {
    // Bind then drop a listener to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = ConnectionConfig::new("127.0.0.1", port).with_timeout(Duration::from_secs(2));
    let err = Connection::connect(config).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
