//! HTTP surface: routes each method + path to the encoder or the voice
//! manager and wraps every failure in the JSON error envelope.

use std::collections::HashMap;

use axum::body::{to_bytes, Body};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use chorus_protocol::{routes, CommandBatch, Empty, VoiceCollection, VoiceUpdate};

use crate::encoder;
use crate::error::ApiError;
use crate::native::{Gateway, VoiceParam};
use crate::voices;

/// Upper bound on request bodies
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

type Params = Query<HashMap<String, String>>;
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the router around a shared engine gateway.
///
/// Any method + path pair without a handler answers 404 with the error
/// envelope, including known paths called with the wrong method.
pub fn router(gateway: Gateway) -> Router {
    Router::new()
        .route(routes::AUDIO_COMMAND, post(post_audio_command).fallback(not_found))
        .route(routes::AUDIO_ENABLE, get(get_audio_enable).fallback(not_found))
        .route(routes::AUDIO_DISABLE, get(get_audio_disable).fallback(not_found))
        .route(routes::AUDIO_RESTART, get(get_audio_restart).fallback(not_found))
        .route(routes::AUDIO_PAUSE, get(get_audio_pause).fallback(not_found))
        .route(routes::VOICES, get(get_voices).fallback(not_found))
        .route(routes::VOICE, post(post_voice).fallback(not_found))
        .route(routes::VOICE_RATE, post(post_voice_rate).fallback(not_found))
        .route(routes::VOICE_PITCH, post(post_voice_pitch).fallback(not_found))
        .route(routes::VOICE_VOLUME, post(post_voice_volume).fallback(not_found))
        .route(routes::VOICE_DEFAULT, post(post_voice_default).fallback(not_found))
        .fallback(not_found)
        .with_state(gateway)
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn read_body(body: Body) -> Result<Vec<u8>, ApiError> {
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BrokenBody(e.to_string()))?;
    Ok(bytes.to_vec())
}

async fn read_json<T: DeserializeOwned>(body: Body) -> Result<T, ApiError> {
    let bytes = read_body(body).await?;
    debug!(body = %String::from_utf8_lossy(&bytes), "Request body");
    Ok(serde_json::from_slice(&bytes)?)
}

fn required_index(params: &HashMap<String, String>) -> Result<i32, ApiError> {
    let raw = params
        .get("index")
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingParameter("index"))?;
    let index: i32 = raw.trim().parse().map_err(|_| ApiError::InvalidParameter {
        name: "index",
        reason: "must be a number".to_string(),
    })?;
    if index < 0 {
        return Err(ApiError::InvalidParameter {
            name: "index",
            reason: "must not be negative".to_string(),
        });
    }
    Ok(index)
}

fn required_diff(params: &HashMap<String, String>) -> Result<f64, ApiError> {
    let raw = params
        .get("diff")
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingParameter("diff"))?;
    match raw.trim().parse::<f64>() {
        Ok(diff) if diff.is_finite() => Ok(diff),
        _ => Err(ApiError::InvalidParameter {
            name: "diff",
            reason: "must be a number".to_string(),
        }),
    }
}

async fn post_audio_command(
    State(gateway): State<Gateway>,
    Query(params): Params,
    body: Body,
) -> ApiResult<Empty> {
    let force = params.contains_key("force");
    let batch: CommandBatch = read_json(body).await?;

    let commands = encoder::encode_batch(&batch.commands)?;
    if commands.is_empty() {
        return Ok(Json(Empty {}));
    }

    let count = commands.len();
    gateway
        .call(move |engine| encoder::submit(engine, &commands, force))
        .await?;

    info!(count, force, "Queued command batch");
    Ok(Json(Empty {}))
}

async fn get_audio_enable(State(gateway): State<Gateway>) -> ApiResult<Empty> {
    gateway.enable().await?;
    Ok(Json(Empty {}))
}

async fn get_audio_disable(State(gateway): State<Gateway>) -> ApiResult<Empty> {
    gateway.disable().await?;
    Ok(Json(Empty {}))
}

async fn get_audio_restart(State(gateway): State<Gateway>) -> ApiResult<Empty> {
    gateway
        .call(|engine| engine.fade_in().map_err(|code| ApiError::native("FadeIn", code)))
        .await?;
    debug!("Playback faded in");
    Ok(Json(Empty {}))
}

async fn get_audio_pause(State(gateway): State<Gateway>) -> ApiResult<Empty> {
    gateway
        .call(|engine| engine.fade_out().map_err(|code| ApiError::native("FadeOut", code)))
        .await?;
    debug!("Playback faded out");
    Ok(Json(Empty {}))
}

async fn get_voices(State(gateway): State<Gateway>) -> ApiResult<VoiceCollection> {
    let collection = gateway.call(|engine| voices::enumerate(engine)).await?;
    Ok(Json(collection))
}

async fn post_voice(
    State(gateway): State<Gateway>,
    Query(params): Params,
    body: Body,
) -> ApiResult<Empty> {
    let index = required_index(&params)?;
    let update: VoiceUpdate = read_json(body).await?;

    gateway
        .call(move |engine| voices::apply_update(engine, index, &update))
        .await?;
    Ok(Json(Empty {}))
}

async fn adjust(gateway: Gateway, params: HashMap<String, String>, param: VoiceParam) -> ApiResult<Empty> {
    let diff = required_diff(&params)?;
    gateway
        .call(move |engine| voices::adjust_default(engine, param, diff))
        .await?;
    Ok(Json(Empty {}))
}

async fn post_voice_rate(State(gateway): State<Gateway>, Query(params): Params) -> ApiResult<Empty> {
    adjust(gateway, params, VoiceParam::SpeakingRate).await
}

async fn post_voice_pitch(State(gateway): State<Gateway>, Query(params): Params) -> ApiResult<Empty> {
    adjust(gateway, params, VoiceParam::AudioPitch).await
}

async fn post_voice_volume(State(gateway): State<Gateway>, Query(params): Params) -> ApiResult<Empty> {
    adjust(gateway, params, VoiceParam::AudioVolume).await
}

async fn post_voice_default(State(gateway): State<Gateway>, Query(params): Params) -> ApiResult<Empty> {
    let index = required_index(&params)?;
    gateway
        .call(move |engine| voices::set_default(engine, index))
        .await?;
    Ok(Json(Empty {}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn index_must_be_present_and_numeric() {
        assert!(matches!(
            required_index(&params(&[])),
            Err(ApiError::MissingParameter("index"))
        ));
        assert!(matches!(
            required_index(&params(&[("index", "")])),
            Err(ApiError::MissingParameter("index"))
        ));
        assert!(matches!(
            required_index(&params(&[("index", "two")])),
            Err(ApiError::InvalidParameter { name: "index", .. })
        ));
        assert!(required_index(&params(&[("index", "-1")])).is_err());
        assert_eq!(required_index(&params(&[("index", "3")])).unwrap(), 3);
    }

    #[test]
    fn diff_must_be_finite() {
        assert_eq!(required_diff(&params(&[("diff", "-0.5")])).unwrap(), -0.5);
        assert!(required_diff(&params(&[("diff", "inf")])).is_err());
        assert!(required_diff(&params(&[("diff", "NaN")])).is_err());
        assert!(matches!(
            required_diff(&params(&[])),
            Err(ApiError::MissingParameter("diff"))
        ));
    }
}
