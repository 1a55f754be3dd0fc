//! Binance 전체 마켓 티커 스트림 (`!ticker@arr`).
//!
//! 매 초 전송되는 배열의 각 원소를 호가 + 24시간 통계 갱신으로 변환합니다.
//! 형식이 맞지 않는 원소는 경고를 남기고 건너뜁니다.

use aggregator_core::{MarketFields, MarketUpdate};
use chrono::DateTime;
use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use crate::traits::ExchangeResult;

/// 24시간 롤링 티커 이벤트.
#[derive(Debug, Deserialize)]
struct WsTicker {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "q")]
    quote_volume: Decimal,
    #[serde(rename = "v")]
    volume: Decimal,
    #[serde(rename = "b")]
    bid_price: Decimal,
    #[serde(rename = "B")]
    bid_qty: Decimal,
    #[serde(rename = "a")]
    ask_price: Decimal,
    #[serde(rename = "A")]
    ask_qty: Decimal,
    #[serde(rename = "h")]
    high_price: Decimal,
    #[serde(rename = "l")]
    low_price: Decimal,
    #[serde(rename = "P")]
    price_change_percent: Decimal,
    #[serde(rename = "c")]
    last_price: Decimal,
    #[serde(rename = "C")]
    close_time: i64,
}

impl WsTicker {
    fn into_update(self) -> MarketUpdate {
        let fields = MarketFields {
            base_volume: Some(self.quote_volume),
            curr_volume: Some(self.volume),
            high_24h: Some(self.high_price),
            low_24h: Some(self.low_price),
            percent_move_24h: Some(self.price_change_percent),
            last_price: Some(self.last_price),
            timestamp: DateTime::from_timestamp_millis(self.close_time),
            ..MarketFields::quote(
                self.bid_price,
                self.bid_qty,
                self.ask_price,
                self.ask_qty,
            )
        };
        MarketUpdate::for_symbol(self.symbol, fields)
    }
}

/// 티커 배열 메시지를 갱신 목록으로 변환합니다.
pub fn parse_ticker_batch(text: &str) -> Vec<MarketUpdate> {
    let items: Vec<serde_json::Value> = match serde_json::from_str(text) {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "Ignoring non-array ticker message");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<WsTicker>(item) {
            Ok(ticker) => Some(ticker.into_update()),
            Err(e) => {
                warn!(error = %e, "Skipping malformed ticker element");
                None
            }
        })
        .collect()
}

/// 스트림에 연결해 닫힐 때까지 갱신 묶음을 `sink`로 보냅니다.
///
/// 서버가 연결을 닫거나 수신 측이 사라지면 `Ok(())`를 반환합니다.
/// 재연결은 호출자가 담당합니다.
pub async fn stream_all_tickers(
    ws_base_url: &str,
    sink: mpsc::Sender<Vec<MarketUpdate>>,
) -> ExchangeResult<()> {
    let url = format!("{}/!ticker@arr", ws_base_url.trim_end_matches('/'));
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    info!(url = %url, "Ticker stream connected");

    let (mut write, mut read) = ws_stream.split();
    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => {
                let updates = parse_ticker_batch(&text);
                if updates.is_empty() {
                    continue;
                }
                if sink.send(updates).await.is_err() {
                    debug!("Ticker receiver dropped, closing stream");
                    return Ok(());
                }
            }
            Message::Ping(payload) => {
                write.send(Message::Pong(payload)).await?;
            }
            Message::Close(frame) => {
                info!(?frame, "Ticker stream closed by server");
                break;
            }
            _ => {}
        }
    }
    Ok(())
}
