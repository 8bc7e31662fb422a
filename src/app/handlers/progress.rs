// ==========================================
// 用户导入服务 - 进度 WebSocket
// ==========================================
// 路由: GET /api/excel/ws/progress
// 协议: 服务端推送 ProgressEvent JSON 文本帧；客户端消息忽略
// ==========================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};

use crate::app::state::AppState;
use crate::engine::{ProgressBroadcaster, ProgressSubscription};

pub async fn progress_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let broadcaster = state.broadcaster.clone();
    ws.on_upgrade(move |socket| stream_progress(socket, broadcaster))
}

async fn stream_progress(socket: WebSocket, broadcaster: Arc<ProgressBroadcaster>) {
    let ProgressSubscription {
        id,
        mut receiver,
    } = broadcaster.subscribe();
    let (mut sink, mut incoming) = socket.split();

    tracing::debug!(subscriber_id = id, "进度订阅已建立");

    loop {
        tokio::select! {
            event = receiver.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "进度事件序列化失败");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            message = incoming.next() => {
                match message {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    broadcaster.unsubscribe(id);
    tracing::debug!(subscriber_id = id, "进度订阅已断开");
}
