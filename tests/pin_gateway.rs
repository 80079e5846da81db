use anyhow::Result;
use axum::{
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dirgate::pin::{HttpPinGateway, PinGateway, PinGatewayError, PinVerdict};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

const PIN: &str = "2468";
const MARKER: &str = "pin_verified";

#[derive(Deserialize)]
struct PinBody {
    pin: String,
}

fn has_marker(headers: &HeaderMap) -> bool {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .any(|pair| pair.trim() == format!("{MARKER}=1"))
}

async fn probe(headers: HeaderMap) -> StatusCode {
    if has_marker(&headers) {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn submit(Json(body): Json<PinBody>) -> Response {
    match body.pin.as_str() {
        PIN => (
            StatusCode::OK,
            [(SET_COOKIE, format!("{MARKER}=1; Path=/; HttpOnly"))],
            Json(json!({"ok": true})),
        )
            .into_response(),
        "silent" => StatusCode::UNAUTHORIZED.into_response(),
        "boom" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Wrong PIN."})),
        )
            .into_response(),
    }
}

async fn clear() -> Response {
    (
        StatusCode::OK,
        [(SET_COOKIE, format!("{MARKER}=deleted; Path=/; Max-Age=0"))],
    )
        .into_response()
}

async fn spawn_gateway() -> Result<String> {
    let app = Router::new().route("/api/pin", get(probe).post(submit).delete(clear));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn verified_pin_sets_marker_replayed_by_probe() -> Result<()> {
    let gateway = HttpPinGateway::new(&spawn_gateway().await?)?;

    assert!(!gateway.probe().await?);
    assert_eq!(gateway.submit(PIN).await?, PinVerdict::Verified);
    assert!(gateway.probe().await?);

    gateway.clear().await?;
    assert!(!gateway.probe().await?);
    Ok(())
}

#[tokio::test]
async fn rejection_carries_gateway_message() -> Result<()> {
    let gateway = HttpPinGateway::new(&spawn_gateway().await?)?;

    assert_eq!(
        gateway.submit("0000").await?,
        PinVerdict::Rejected {
            message: Some("Wrong PIN.".to_string())
        }
    );
    assert_eq!(
        gateway.submit("silent").await?,
        PinVerdict::Rejected { message: None }
    );
    assert!(!gateway.probe().await?);
    Ok(())
}

#[tokio::test]
async fn server_error_is_not_a_rejection() -> Result<()> {
    let gateway = HttpPinGateway::new(&spawn_gateway().await?)?;
    assert_eq!(
        gateway.submit("boom").await,
        Err(PinGatewayError::Status(500))
    );
    Ok(())
}

#[tokio::test]
async fn unreachable_gateway_is_a_network_error() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let gateway = HttpPinGateway::new(&format!("http://{addr}"))?;
    assert!(matches!(
        gateway.probe().await,
        Err(PinGatewayError::Network(_))
    ));
    Ok(())
}

#[tokio::test]
async fn forwarding_client_only_uses_caller_cookies() -> Result<()> {
    let gateway = HttpPinGateway::forwarding(&spawn_gateway().await?)?;

    assert_eq!(gateway.submit(PIN).await?, PinVerdict::Verified);
    // No jar: the marker set above is not replayed.
    assert!(!gateway.probe().await?);

    assert!(gateway.probe_as(&format!("theme=dark; {MARKER}=1")).await?);
    assert!(!gateway.probe_as("theme=dark").await?);
    Ok(())
}
