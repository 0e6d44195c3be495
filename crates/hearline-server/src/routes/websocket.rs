use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Json as JsonResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use hearline_audio::{
    pcm_bytes_to_samples, ActivityGate, OverlapTracker, PipelineSettings, SessionPipeline,
    WebRtcDetector,
};
use hearline_core::summarize::SessionSummarizer;
use hearline_core::{AudioFrame, HearlineError};

use crate::registry::LiveState;
use crate::server::AppState;

/// Commands a streaming client may send as JSON text frames.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ControlCommand {
    Ping,
    SetName(String),
    GetSummary,
}

/// Control frames are JSON with a `command` field. Anything else is a
/// protocol error, reported in-band without ending the session.
pub(crate) fn parse_control(text: &str) -> Result<ControlCommand, HearlineError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| HearlineError::Protocol(format!("invalid control message: {e}")))?;

    match value["command"].as_str() {
        Some("ping") => Ok(ControlCommand::Ping),
        Some("set_name") | Some("config") => Ok(ControlCommand::SetName(
            value["user_name"].as_str().unwrap_or("").trim().to_string(),
        )),
        Some("get_summary") => Ok(ControlCommand::GetSummary),
        Some(other) => Err(HearlineError::Protocol(format!("unknown command: {other}"))),
        None => Err(HearlineError::Protocol(
            "control message has no command field".into(),
        )),
    }
}

pub(crate) async fn ws_transcribe_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_transcribe_socket(socket, state))
}

/// Live streaming session: binary frames are raw PCM16 mono audio at the
/// pipeline sample rate, text frames are control messages, in arbitrary
/// interleaving. Lifecycle is connecting -> streaming -> closing -> closed.
async fn handle_transcribe_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let session_id = state.registry.new_session_id();

    // missing transcription credential is fatal at session creation
    let Some(backend) = state.transcriber.clone() else {
        let event = json!({
            "type": "error",
            "message": "transcription backend not configured on server",
        });
        let _ = sender.send(Message::Text(event.to_string())).await;
        return;
    };

    let gate = if state.config.use_vad {
        match WebRtcDetector::new(state.config.vad_aggressiveness, state.config.sample_rate) {
            Ok(detector) => ActivityGate::new(Box::new(detector)),
            Err(e) => {
                warn!("speech classifier unavailable, accepting all audio: {}", e);
                ActivityGate::disabled()
            }
        }
    } else {
        ActivityGate::disabled()
    };

    let (mut pipeline, mut segments_rx) = SessionPipeline::spawn(
        backend,
        gate,
        PipelineSettings {
            chunk_duration: state.config.chunk_duration_secs,
            num_speakers: state.config.num_speakers,
        },
    );

    let mut summarizer = SessionSummarizer::new(state.summarizer.clone());
    let mut overlap = OverlapTracker::new();
    let mut user_name: Option<String> = None;
    let mut clock: f64 = 0.0;
    let sample_rate = state.config.sample_rate;

    state.registry.insert_live(&session_id);
    info!("websocket session connected: {}", session_id);

    let connected = json!({
        "type": "connected",
        "session_id": session_id,
        "message": "send 16-bit pcm mono audio frames and json control messages",
    });
    if sender.send(Message::Text(connected.to_string())).await.is_err() {
        state.registry.remove_live(&session_id);
        return;
    }

    loop {
        tokio::select! {
            message = receiver.next() => {
                let Some(Ok(message)) = message else {
                    break;
                };

                // any client activity moves a connecting session to streaming
                state.registry.update_live(&session_id, |info| {
                    if info.state == LiveState::Connecting {
                        info.state = LiveState::Streaming;
                    }
                });

                match message {
                    Message::Binary(payload) => {
                        let samples = pcm_bytes_to_samples(&payload);
                        if samples.is_empty() {
                            continue;
                        }
                        let frame = AudioFrame::new(clock, samples, sample_rate);
                        clock += frame.duration();
                        state.registry.update_live(&session_id, |info| {
                            info.duration_secs = clock;
                            info.overlap = overlap.overlap_at(clock);
                        });

                        pipeline.ingest(&frame);
                        if pipeline.flush_due() {
                            let status = json!({
                                "type": "status",
                                "message": "processing audio...",
                                "timestamp": frame.timestamp,
                            });
                            if sender.send(Message::Text(status.to_string())).await.is_err() {
                                break;
                            }
                            pipeline.flush_if_due().await;
                        }
                    }
                    Message::Text(text) => {
                        let reply = match parse_control(&text) {
                            Ok(ControlCommand::Ping) => json!({
                                "type": "pong",
                                "timestamp": clock,
                            }),
                            Ok(ControlCommand::SetName(name)) => {
                                user_name = if name.is_empty() { None } else { Some(name.clone()) };
                                state.registry.update_live(&session_id, |info| {
                                    info.user_name = user_name.clone();
                                });
                                info!("session {} watches for name: {}", session_id, name);
                                json!({
                                    "type": "config_confirmed",
                                    "user_name": name,
                                    "message": format!("haptic alerts enabled for name: {name}"),
                                })
                            }
                            Ok(ControlCommand::GetSummary) => {
                                let summary = summarizer.generate_summary().await;
                                json!({
                                    "type": "summary",
                                    "data": {
                                        "summary": summary,
                                        "stats": summarizer.stats(),
                                    },
                                })
                            }
                            Err(e) => json!({
                                "type": "error",
                                "message": e.to_string(),
                            }),
                        };
                        if sender.send(Message::Text(reply.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    // axum answers pings at the protocol level
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }

            segments = segments_rx.recv() => {
                let Some(segments) = segments else {
                    break;
                };
                for segment in segments {
                    summarizer.add_segment(&segment);
                    overlap.mark_active(&segment.speaker_id, segment.end_time);

                    let matched = user_name
                        .as_deref()
                        .map(|name| segment.text.to_lowercase().contains(&name.to_lowercase()))
                        .unwrap_or(false);

                    state.registry.update_live(&session_id, |info| {
                        info.segment_count += 1;
                        info.overlap = overlap.overlap_at(clock);
                    });

                    let mut segment_json = serde_json::to_value(&segment).unwrap_or(Value::Null);
                    if let Some(fields) = segment_json.as_object_mut() {
                        fields.insert("haptic".to_string(), Value::Bool(matched));
                    }
                    let transcript = json!({
                        "type": "transcript",
                        "segment": segment_json,
                    });
                    if sender.send(Message::Text(transcript.to_string())).await.is_err() {
                        break;
                    }

                    if matched {
                        debug!(
                            "session {}: configured name mentioned by {}",
                            session_id, segment.speaker_id
                        );
                        let haptic = json!({
                            "type": "haptic",
                            "reason": "name_mentioned",
                            "text": segment.text,
                            "speaker_id": segment.speaker_id,
                            "user_name": user_name,
                        });
                        if sender.send(Message::Text(haptic.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    // closing: best-effort final summary, then release everything. audio
    // buffered but not yet flushed is discarded without transcription.
    state.registry.update_live(&session_id, |info| {
        info.state = LiveState::Closing;
    });
    info!("websocket session closing: {}", session_id);

    if !summarizer.is_empty() {
        let summary = summarizer.generate_summary().await;
        let event = json!({
            "type": "summary",
            "data": {
                "summary": summary,
                "stats": summarizer.stats(),
            },
        });
        let _ = sender.send(Message::Text(event.to_string())).await;
    }

    pipeline.abort();
    state.registry.remove_live(&session_id);
    info!("websocket session closed: {}", session_id);
}

pub(crate) async fn list_live_sessions(
    State(state): State<Arc<AppState>>,
) -> JsonResponse<Value> {
    let sessions: Vec<Value> = state
        .registry
        .list_live()
        .into_iter()
        .map(|(id, info)| {
            json!({
                "session_id": id,
                "state": info.state,
                "connected_at": info.connected_at,
                "duration": info.duration_secs,
                "user_name": info.user_name,
                "segments": info.segment_count,
                "overlap": info.overlap,
            })
        })
        .collect();

    JsonResponse(json!({
        "total": sessions.len(),
        "sessions": sessions,
    }))
}
