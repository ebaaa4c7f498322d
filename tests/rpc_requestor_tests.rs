use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tandem::connection::{RpcConnection, TimerHandle, TransportError};
use tandem::message::{Message, StatusCode};
use tandem::rpc::{RequestorError, RpcRequestor};

type TimerCallback = Box<dyn FnOnce() + Send>;

/// A connection whose timers only fire when the test says so.
#[derive(Default)]
struct ManualConnection {
    sent: Mutex<Vec<Message>>,
    timers: Mutex<Vec<(u64, Duration, Option<TimerCallback>)>>,
    cancelled: Mutex<Vec<u64>>,
    next_token: AtomicU64,
    refuse_sends: AtomicBool,
}

impl ManualConnection {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn last_sent(&self) -> Message {
        self.sent.lock().unwrap().last().cloned().unwrap()
    }

    fn armed_delays(&self) -> Vec<Duration> {
        self.timers.lock().unwrap().iter().map(|(_, d, _)| *d).collect()
    }

    /// Runs the callback of the `index`-th timer, as a loop would when it
    /// comes due. Returns false if it was cancelled or already fired.
    fn fire_timer(&self, index: usize) -> bool {
        let (token, callback) = {
            let mut timers = self.timers.lock().unwrap();
            let (token, _, callback) = &mut timers[index];
            (*token, callback.take())
        };
        if self.cancelled.lock().unwrap().contains(&token) {
            return false;
        }
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    fn cancelled_count(&self) -> usize {
        self.cancelled.lock().unwrap().len()
    }
}

impl RpcConnection for ManualConnection {
    fn send(&self, message: Message) -> Result<(), TransportError> {
        if self.refuse_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send("refused by test".into()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn arm_timer(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.timers
            .lock()
            .unwrap()
            .push((token, delay, Some(callback)));
        TimerHandle::from_token(token)
    }

    fn cancel_timer(&self, handle: &TimerHandle) {
        if let Some(token) = handle.token() {
            self.cancelled.lock().unwrap().push(token);
        }
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn peer(&self) -> String {
        "manual".into()
    }
}

fn as_dyn(conn: &Arc<ManualConnection>) -> Arc<dyn RpcConnection> {
    conn.clone()
}

fn reply_to(request: &Message, result: serde_json::Value) -> Message {
    Message::rpc_response(request.id(), StatusCode::Ok, result)
}

#[test]
fn test_response_resolves_future_and_removes_entry() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();

    let response = requestor
        .call_async(
            &as_dyn(&conn),
            Message::rpc_request("add", json!({ "num1": 2, "num2": 3 })),
            Duration::from_secs(5),
        )
        .unwrap();

    let request = conn.last_sent();
    assert!(requestor.is_pending(request.id()));
    assert_eq!(conn.armed_delays(), vec![Duration::from_secs(5)]);

    requestor.on_response(conn.as_ref(), reply_to(&request, json!(5)));

    assert!(!requestor.is_pending(request.id()));
    assert_eq!(requestor.pending_count(), 0);
    // The armed timer is cancelled once the response wins.
    assert_eq!(conn.cancelled_count(), 1);

    let message = response.try_take().unwrap();
    assert_eq!(message.status(), Some(StatusCode::Ok));
    assert_eq!(message.into_result(), json!(5));
}

#[test]
fn test_timeout_synthesizes_timeout_response() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();

    let response = requestor
        .call_async(
            &as_dyn(&conn),
            Message::rpc_request("add", json!({})),
            Duration::from_millis(100),
        )
        .unwrap();

    assert!(conn.fire_timer(0));

    assert_eq!(requestor.pending_count(), 0);
    let message = response.try_take().unwrap();
    assert_eq!(message.status(), Some(StatusCode::Timeout));
    assert_eq!(message.id(), response.request_id());
}

#[test]
fn test_late_response_after_timeout_is_dropped() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();

    let response = requestor
        .call_async(
            &as_dyn(&conn),
            Message::rpc_request("add", json!({})),
            Duration::from_millis(100),
        )
        .unwrap();
    let request = conn.last_sent();

    conn.fire_timer(0);
    requestor.on_response(conn.as_ref(), reply_to(&request, json!(42)));

    // The timeout result delivered first is untouched.
    let message = response.try_take().unwrap();
    assert_eq!(message.status(), Some(StatusCode::Timeout));
    assert!(response.try_take().is_none());
    assert!(!requestor.is_pending(request.id()));
}

#[test]
fn test_timer_firing_after_response_is_noop() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();

    let response = requestor
        .call_async(
            &as_dyn(&conn),
            Message::rpc_request("add", json!({})),
            Duration::from_millis(100),
        )
        .unwrap();
    let request = conn.last_sent();

    requestor.on_response(conn.as_ref(), reply_to(&request, json!(1)));

    // Simulate a timer that had already fired before it could be cancelled.
    conn.cancelled.lock().unwrap().clear();
    assert!(conn.fire_timer(0));

    let message = response.try_take().unwrap();
    assert_eq!(message.status(), Some(StatusCode::Ok));
    assert_eq!(requestor.pending_count(), 0);
}

#[test]
fn test_on_timeout_is_idempotent() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();

    let response = requestor
        .call_async(
            &as_dyn(&conn),
            Message::rpc_request("add", json!({})),
            Duration::from_millis(100),
        )
        .unwrap();

    requestor.on_timeout(response.request_id());
    requestor.on_timeout(response.request_id());
    conn.fire_timer(0);

    assert_eq!(
        response.try_take().map(|m| m.status()),
        Some(Some(StatusCode::Timeout))
    );
    assert!(response.try_take().is_none());
}

#[test]
fn test_unknown_response_is_ignored() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();

    requestor.on_response(
        conn.as_ref(),
        Message::rpc_response("never-issued", StatusCode::Ok, json!(1)),
    );

    assert_eq!(requestor.pending_count(), 0);
}

#[test]
fn test_callback_invoked_once_with_response() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();
    let received = Arc::new(Mutex::new(Vec::new()));

    requestor
        .call_with_callback(
            &as_dyn(&conn),
            Message::rpc_request("multiply", json!({ "num1": 3, "num2": 4 })),
            Duration::from_secs(5),
            Box::new({
                let received = received.clone();
                move |message| received.lock().unwrap().push(message)
            }),
        )
        .unwrap();
    let request = conn.last_sent();

    requestor.on_response(conn.as_ref(), reply_to(&request, json!(12)));
    requestor.on_response(conn.as_ref(), reply_to(&request, json!(12)));
    conn.cancelled.lock().unwrap().clear();
    conn.fire_timer(0);

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].result(), Some(&json!(12)));
}

#[test]
fn test_callback_receives_timeout_response() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();
    let received = Arc::new(Mutex::new(Vec::new()));

    requestor
        .call_with_callback(
            &as_dyn(&conn),
            Message::rpc_request("multiply", json!({})),
            Duration::from_millis(100),
            Box::new({
                let received = received.clone();
                move |message: Message| received.lock().unwrap().push(message.status())
            }),
        )
        .unwrap();
    let request = conn.last_sent();

    conn.fire_timer(0);
    requestor.on_response(conn.as_ref(), reply_to(&request, json!(0)));

    assert_eq!(*received.lock().unwrap(), vec![Some(StatusCode::Timeout)]);
    assert_eq!(requestor.pending_count(), 0);
}

#[test]
fn test_send_failure_leaves_no_entry() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();
    conn.refuse_sends.store(true, Ordering::SeqCst);

    let result = requestor.call_async(
        &as_dyn(&conn),
        Message::rpc_request("add", json!({})),
        Duration::from_secs(5),
    );

    assert!(matches!(
        result,
        Err(RequestorError::Transport(TransportError::Send(_)))
    ));
    assert_eq!(requestor.pending_count(), 0);
    assert_eq!(conn.cancelled_count(), 1);
}

#[test]
fn test_duplicate_request_id_is_rejected() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();
    let request = Message::rpc_request("add", json!({}));

    let _first = requestor
        .call_async(&as_dyn(&conn), request.clone(), Duration::from_secs(5))
        .unwrap();
    let second = requestor.call_async(&as_dyn(&conn), request.clone(), Duration::from_secs(5));

    assert_eq!(
        second.unwrap_err(),
        RequestorError::DuplicateRequestId(request.id().to_owned())
    );
    assert_eq!(requestor.pending_count(), 1);
}

#[test]
fn test_blocking_call_returns_response() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();

    // Answer from another thread as soon as the request shows up.
    let responder = std::thread::spawn({
        let requestor = requestor.clone();
        let conn = conn.clone();
        move || loop {
            let sent = conn.sent.lock().unwrap().last().cloned();
            if let Some(request) = sent {
                let num1 = request.parameters().unwrap()["num1"].as_i64().unwrap();
                let num2 = request.parameters().unwrap()["num2"].as_i64().unwrap();
                requestor.on_response(conn.as_ref(), reply_to(&request, json!(num1 + num2)));
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    });

    let started = Instant::now();
    let message = requestor
        .call_blocking(
            &as_dyn(&conn),
            Message::rpc_request("add", json!({ "num1": 2, "num2": 3 })),
            Duration::from_secs(5),
        )
        .unwrap();

    assert_eq!(message.into_result(), json!(5));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(requestor.pending_count(), 0);
    responder.join().unwrap();
}

#[test]
fn test_blocking_call_times_out_without_response() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();

    let started = Instant::now();
    let result = requestor.call_blocking(
        &as_dyn(&conn),
        Message::rpc_request("add", json!({ "num1": 1, "num2": 2 })),
        Duration::from_millis(200),
    );
    let elapsed = started.elapsed();

    assert_eq!(result.unwrap_err(), RequestorError::Timeout);
    assert!(elapsed >= Duration::from_millis(200), "returned early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "hung: {:?}", elapsed);
    assert_eq!(requestor.pending_count(), 0);

    // The expired wait disarms the connection's timer instead of leaving it
    // armed with nothing to do.
    assert_eq!(conn.cancelled_count(), 1);
    assert!(!conn.fire_timer(0));
    assert_eq!(requestor.pending_count(), 0);
}

#[test]
fn test_fail_all_resolves_every_shape() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();
    let callback_status = Arc::new(Mutex::new(None));

    let response = requestor
        .call_async(
            &as_dyn(&conn),
            Message::rpc_request("add", json!({})),
            Duration::from_secs(5),
        )
        .unwrap();
    requestor
        .call_with_callback(
            &as_dyn(&conn),
            Message::rpc_request("add", json!({})),
            Duration::from_secs(5),
            Box::new({
                let callback_status = callback_status.clone();
                move |message: Message| *callback_status.lock().unwrap() = message.status()
            }),
        )
        .unwrap();
    assert_eq!(requestor.pending_count(), 2);

    requestor.fail_all(StatusCode::Disconnected);

    assert_eq!(requestor.pending_count(), 0);
    assert_eq!(
        response.try_take().and_then(|m| m.status()),
        Some(StatusCode::Disconnected)
    );
    assert_eq!(*callback_status.lock().unwrap(), Some(StatusCode::Disconnected));

    // Neither timer survives the drain.
    assert_eq!(conn.cancelled_count(), 2);
    assert!(!conn.fire_timer(0));
    assert!(!conn.fire_timer(1));
}

#[test]
fn test_explicit_timeout_disarms_connection_timer() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();
    let received = Arc::new(Mutex::new(Vec::new()));

    requestor
        .call_with_callback(
            &as_dyn(&conn),
            Message::rpc_request("add", json!({})),
            Duration::from_secs(5),
            Box::new({
                let received = received.clone();
                move |message: Message| received.lock().unwrap().push(message.status())
            }),
        )
        .unwrap();
    let request = conn.last_sent();

    requestor.on_timeout(request.id());

    assert_eq!(conn.cancelled_count(), 1);
    assert!(!conn.fire_timer(0));
    assert_eq!(*received.lock().unwrap(), vec![Some(StatusCode::Timeout)]);
}

#[test]
fn test_timeout_resolves_after_connection_dropped() {
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();

    let response = requestor
        .call_async(
            &as_dyn(&conn),
            Message::rpc_request("add", json!({})),
            Duration::from_secs(5),
        )
        .unwrap();
    drop(conn);

    // With the connection gone the entry still resolves; the token timer is
    // simply left behind with it.
    requestor.on_timeout(response.request_id());
    assert_eq!(
        response.try_take().and_then(|m| m.status()),
        Some(StatusCode::Timeout)
    );
    assert_eq!(requestor.pending_count(), 0);
}

#[test]
fn test_racing_response_and_timeout_resolve_exactly_once() {
    // Repeatedly race the two resolution paths from separate threads; every
    // request must end with one outcome and an empty table.
    for round in 0..200 {
        let requestor = Arc::new(RpcRequestor::new());
        let conn = ManualConnection::new();
        let resolutions = Arc::new(AtomicUsize::new(0));

        requestor
            .call_with_callback(
                &as_dyn(&conn),
                Message::rpc_request("add", json!({})),
                Duration::from_millis(10),
                Box::new({
                    let resolutions = resolutions.clone();
                    move |_| {
                        resolutions.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .unwrap();
        let request = conn.last_sent();

        let response_thread = std::thread::spawn({
            let requestor = requestor.clone();
            let conn = conn.clone();
            let request = request.clone();
            move || requestor.on_response(conn.as_ref(), reply_to(&request, json!(round)))
        });
        let timeout_thread = std::thread::spawn({
            let requestor = requestor.clone();
            let id = request.id().to_owned();
            move || requestor.on_timeout(&id)
        });

        response_thread.join().unwrap();
        timeout_thread.join().unwrap();

        assert_eq!(resolutions.load(Ordering::SeqCst), 1, "round {}", round);
        assert_eq!(requestor.pending_count(), 0, "round {}", round);
    }
}

#[test]
fn test_shuffled_resolutions_never_leak() {
    let mut rng = rand::rng();
    let requestor = Arc::new(RpcRequestor::new());
    let conn = ManualConnection::new();

    let mut responses = Vec::new();
    for _ in 0..100 {
        let future = requestor
            .call_async(
                &as_dyn(&conn),
                Message::rpc_request("add", json!({})),
                Duration::from_millis(50),
            )
            .unwrap();
        responses.push(future);
    }
    assert_eq!(requestor.pending_count(), 100);

    // For each request, apply the response, the timer, or both in a random
    // order, then shuffle the whole sequence of events.
    enum Event {
        Respond(Message),
        Fire(usize),
    }
    let sent = conn.sent.lock().unwrap().clone();
    let mut events = Vec::new();
    for (index, request) in sent.iter().enumerate() {
        let respond = rng.random_bool(0.7);
        let fire = !respond || rng.random_bool(0.5);
        if respond {
            events.push(Event::Respond(reply_to(request, json!(index))));
        }
        if fire {
            events.push(Event::Fire(index));
        }
    }
    events.shuffle(&mut rng);

    for event in events {
        match event {
            Event::Respond(message) => requestor.on_response(conn.as_ref(), message),
            Event::Fire(index) => {
                conn.fire_timer(index);
            }
        }
    }

    assert_eq!(requestor.pending_count(), 0);
    for (index, future) in responses.iter().enumerate() {
        let message = future.try_take().expect("every request resolves");
        match message.status() {
            Some(StatusCode::Ok) => assert_eq!(message.into_result(), json!(index)),
            Some(StatusCode::Timeout) => {}
            other => panic!("unexpected status {:?}", other),
        }
        assert!(future.try_take().is_none());
    }
}
