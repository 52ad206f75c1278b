pub mod routes;
pub mod state;

use axum::Router;

pub use state::{AppState, RelaySettings};

pub fn app(state: AppState) -> Router {
    routes::router(state)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::{
        body::Body,
        http::{header, Request, Response, StatusCode},
        Router,
    };
    use desk::{DeskConfig, ManualClock, TradingDesk};
    use guard::GuardConfig;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app, AppState, RelaySettings};

    // 2024-05-01T00:00:00Z
    const T0: u64 = 1_714_521_600_000;
    const BTC: &str = "BTC/USDT:USDT";

    fn test_app(config: DeskConfig) -> (Router, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let desk = TradingDesk::new(config).unwrap();
        let state = AppState::new(desk, clock.clone(), RelaySettings::default());
        (app(state), clock)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::post(uri).body(Body::empty()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn webhook_executes_signal_and_opens_position() {
        let (app, _clock) = test_app(DeskConfig::default());

        let response = app
            .clone()
            .oneshot(post_json(
                "/webhook",
                json!({"signal": "long", "symbol": "btc/usdt:usdt", "notional": 20.0, "price": 40_000.0}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["symbol"], BTC);
        assert_eq!(body["signal"], "LONG");
        assert_eq!(body["amount"], 0.0005);

        let positions = body_json(app.oneshot(get("/positions")).await.unwrap()).await;
        assert_eq!(positions["positions"][BTC]["quantity"], 0.0005);
    }

    #[tokio::test]
    async fn webhook_rejects_unknown_signal() {
        let (app, _clock) = test_app(DeskConfig::default());

        let response = app
            .oneshot(post_json("/webhook", json!({"signal": "flat", "price": 100.0})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body, json!({"ok": false, "error": "bad_signal"}));
    }

    #[tokio::test]
    async fn malformed_bodies_use_the_error_envelope() {
        let (app, _clock) = test_app(DeskConfig::default());

        let missing_price = app
            .clone()
            .oneshot(post_json("/webhook", json!({"signal": "LONG"})))
            .await
            .unwrap();
        assert_eq!(missing_price.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(missing_price).await,
            json!({"ok": false, "error": "bad_request"})
        );

        let not_json = app
            .clone()
            .oneshot(
                Request::post("/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{signal"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(not_json).await["error"], "bad_request");

        let bad_fills = app
            .oneshot(post_json("/fills/reconcile", json!({"id": "1"})))
            .await
            .unwrap();
        assert_eq!(bad_fills.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(bad_fills).await["ok"], false);
    }

    #[tokio::test]
    async fn master_halt_locks_webhook_until_lifted() {
        let (app, _clock) = test_app(DeskConfig::default());
        let signal = json!({"signal": "SHORT", "price": 100.0});

        let halted = app.clone().oneshot(post_empty("/admin/halt_all")).await.unwrap();
        assert_eq!(body_json(halted).await["global_halt"], true);

        let denied = app
            .clone()
            .oneshot(post_json("/webhook", signal.clone()))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::LOCKED);
        assert_eq!(body_json(denied).await["error"], "global_halt");

        app.clone().oneshot(post_empty("/admin/unhalt_all")).await.unwrap();
        let allowed = app.oneshot(post_json("/webhook", signal)).await.unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn symbol_halt_defaults_to_configured_symbol() {
        let (app, _clock) = test_app(DeskConfig::default());

        let halted = app.clone().oneshot(post_empty("/admin/halt")).await.unwrap();
        assert_eq!(body_json(halted).await["halted"], BTC);

        let denied = app
            .clone()
            .oneshot(post_json("/webhook", json!({"signal": "LONG", "price": 100.0})))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::LOCKED);
        assert_eq!(body_json(denied).await["error"], "halted");

        let other = app
            .oneshot(post_json(
                "/webhook",
                json!({"signal": "LONG", "symbol": "ETH/USDT:USDT", "price": 100.0}),
            ))
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn webhook_is_rate_limited_across_symbols() {
        let (app, _clock) = test_app(DeskConfig {
            guard: GuardConfig {
                max_trades_per_hour: 1,
                ..GuardConfig::default()
            },
            ..DeskConfig::default()
        });

        let first = app
            .clone()
            .oneshot(post_json("/webhook", json!({"signal": "LONG", "price": 100.0})))
            .await
            .unwrap();
        let second = app
            .oneshot(post_json(
                "/webhook",
                json!({"signal": "LONG", "symbol": "ETH/USDT:USDT", "price": 100.0}),
            ))
            .await
            .unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(second).await["error"], "rate_limited");
    }

    #[tokio::test]
    async fn wide_spread_is_rejected_with_measured_spread() {
        let (app, _clock) = test_app(DeskConfig::default());

        let response = app
            .clone()
            .oneshot(post_json(
                "/webhook",
                json!({"signal": "LONG", "price": 100.0, "bid": 99.0, "ask": 101.0}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "wide_spread");
        assert!((body["spread_pct"].as_f64().unwrap() - 2.0).abs() < 1e-9);

        let health = body_json(app.oneshot(get("/health")).await.unwrap()).await;
        assert_eq!(health["trades_today"], 0);
        assert!(health["last_spread_pct"][BTC].as_f64().is_some());
    }

    #[tokio::test]
    async fn reconcile_applies_each_fill_id_once() {
        let (app, _clock) = test_app(DeskConfig::default());
        let fills = json!([
            {"id": "1", "symbol": BTC, "side": "buy", "price": 100.0, "amount": 2.0, "ts": T0},
            {"id": "2", "symbol": BTC, "side": "sell", "price": 110.0, "amount": 1.0, "fee": 0.5, "ts": T0 + 1},
        ]);

        let first = app
            .clone()
            .oneshot(post_json("/fills/reconcile", fills.clone()))
            .await
            .unwrap();
        let second = app
            .clone()
            .oneshot(post_json("/fills/reconcile", fills))
            .await
            .unwrap();

        assert_eq!(body_json(first).await["applied"], 2);
        assert_eq!(body_json(second).await["applied"], 0);

        let logged = body_json(app.oneshot(get("/fills")).await.unwrap()).await;
        let logged = logged["fills"].as_array().unwrap();
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[1]["realized_pnl"], 9.5);
        assert_eq!(logged[1]["fill_id"], "2:BTC/USDT:USDT");
    }

    #[tokio::test]
    async fn reconcile_rejects_non_positive_prices() {
        let (app, _clock) = test_app(DeskConfig::default());

        let response = app
            .oneshot(post_json(
                "/fills/reconcile",
                json!([{"id": "1", "symbol": BTC, "side": "buy", "price": 0.0, "amount": 1.0}]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_fill");
    }

    #[tokio::test]
    async fn csv_exports_fills_and_events() {
        let (app, _clock) = test_app(DeskConfig::default());
        app.clone()
            .oneshot(post_json(
                "/fills/reconcile",
                json!([{"id": "7", "symbol": BTC, "side": "buy", "price": 100.0, "amount": 1.0, "ts": T0}]),
            ))
            .await
            .unwrap();
        app.clone().oneshot(post_empty("/admin/halt_all")).await.unwrap();

        let pnl = app.clone().oneshot(get("/pnl.csv")).await.unwrap();
        assert_eq!(
            pnl.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let pnl = body_text(pnl).await;
        assert_eq!(
            pnl,
            "ts_iso,symbol,side,price,amount,fee_usdt,realized_usdt\n\
             2024-05-01T00:00:00.000Z,BTC/USDT:USDT,buy,100,1,0.000000,0.000000\n"
        );

        let logs = body_text(app.oneshot(get("/logs.csv")).await.unwrap()).await;
        assert!(logs.starts_with("ts_iso,event\n"));
        assert!(logs.contains("MASTER HALT enabled"));
    }

    #[tokio::test]
    async fn cooldown_accepts_symbol_and_seconds() {
        let (app, _clock) = test_app(DeskConfig::default());

        let response = app
            .clone()
            .oneshot(post_json(
                "/admin/cooldown",
                json!({"symbol": "eth/usdt:usdt", "seconds": 30}),
            ))
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            json!({"ok": true, "symbol": "ETH/USDT:USDT", "seconds": 30})
        );

        let health = body_json(app.oneshot(get("/health")).await.unwrap()).await;
        assert_eq!(health["cooldown_secs"]["ETH/USDT:USDT"], 30);
    }

    #[tokio::test]
    async fn reset_clears_fills_and_master_halt() {
        let (app, _clock) = test_app(DeskConfig::default());
        app.clone()
            .oneshot(post_json("/webhook", json!({"signal": "LONG", "price": 100.0})))
            .await
            .unwrap();
        app.clone().oneshot(post_empty("/admin/halt_all")).await.unwrap();

        let reset = app.clone().oneshot(post_empty("/admin/reset")).await.unwrap();
        assert_eq!(body_json(reset).await, json!({"ok": true}));

        let health = body_json(app.clone().oneshot(get("/health")).await.unwrap()).await;
        assert_eq!(health["global_halt"], false);
        let fills = body_json(app.oneshot(get("/fills")).await.unwrap()).await;
        assert_eq!(fills["fills"], json!([]));
    }

    #[tokio::test]
    async fn new_bucket_starts_with_empty_ledger() {
        let (app, clock) = test_app(DeskConfig::default());
        app.clone()
            .oneshot(post_json("/webhook", json!({"signal": "LONG", "price": 100.0})))
            .await
            .unwrap();

        clock.advance(24 * 3_600_000);

        let positions = body_json(app.clone().oneshot(get("/positions")).await.unwrap()).await;
        assert_eq!(positions["positions"], json!({}));
        let stats = body_json(app.oneshot(get("/stats")).await.unwrap()).await;
        assert_eq!(stats["daily_key"], "2024-05-02@0");
        assert_eq!(stats["counts"]["trades"], 0);
    }

    #[tokio::test]
    async fn config_reports_effective_settings() {
        let (app, _clock) = test_app(DeskConfig::default());

        let body = body_json(app.oneshot(get("/config")).await.unwrap()).await;

        assert_eq!(body["relay"]["default_symbol"], BTC);
        assert_eq!(body["guard"]["max_trades_per_hour"], 60);
        assert_eq!(body["guard"]["loss_reduce_factors"], json!([1.0, 0.7, 0.4]));
        assert_eq!(body["spread"]["max_spread_pct"], 0.03);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_close_flattens_entry_after_delay() {
        let (app, _clock) = test_app(DeskConfig::default());

        let response = app
            .clone()
            .oneshot(post_json(
                "/webhook",
                json!({"signal": "LONG", "notional": 100.0, "price": 100.0, "autoCloseSec": 5}),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["auto_close_sec"], 5);

        let open = body_json(app.clone().oneshot(get("/positions")).await.unwrap()).await;
        assert_eq!(open["positions"][BTC]["quantity"], 1.0);

        tokio::time::sleep(Duration::from_secs(6)).await;

        let closed = body_json(app.clone().oneshot(get("/positions")).await.unwrap()).await;
        assert_eq!(closed["positions"], json!({}));

        let fills = body_json(app.clone().oneshot(get("/fills")).await.unwrap()).await;
        let close = &fills["fills"][1];
        assert_eq!(close["side"], "sell");
        assert_eq!(close["price"], 100.0);
        assert_eq!(close["fee"], 0.0);
        assert_eq!(close["realized_pnl"], 0.0);

        let health = body_json(app.oneshot(get("/health")).await.unwrap()).await;
        assert_eq!(health["pnl_today"], 0.0);
        assert_eq!(health["cooldown_secs"], json!({}));
        assert_eq!(health["halted"], json!({}));
    }
}
