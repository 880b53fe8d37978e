//! Request handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Html,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::error::{Result, ServerError};
use super::state::AppState;
use crate::eda::{self, EDA_OUTPUTS};
use crate::error::VinoError;
use crate::inference::{Prediction, Predictor};

const REPORT_PLACEHOLDER: &str =
    "# Report not available\n\nNo report has been generated in the artifact directory yet.";

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub features: HashMap<String, f64>,
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Feature order the model expects; empty when nothing has been trained
pub async fn get_features(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let features = match state.cache.feature_names().await {
        Ok(Some(names)) => names.as_ref().clone(),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(error = %e, "Feature list unreadable");
            Vec::new()
        }
    };
    Json(json!({ "features": features }))
}

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.cache.metrics().await {
        Ok(Some(metrics)) => Json(json!(metrics)),
        Ok(None) => Json(json!({ "error": "Metrics not found" })),
        Err(e) => {
            warn!(error = %e, "Metrics unreadable");
            Json(json!({ "error": "Metrics not found" }))
        }
    }
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<Prediction>> {
    // a load failure is an artifact problem, never the caller's
    let predictor = Predictor::from_cache(&state.cache)
        .await
        .map_err(|e| match e {
            VinoError::ShapeError { .. } => {
                warn!(error = %e, "Model and feature list disagree");
                ServerError::Unavailable("Model artifacts are inconsistent. Retrain the model.".to_string())
            }
            e => ServerError::from(e),
        })?
        .ok_or_else(|| ServerError::Unavailable("Model not loaded. Train a model first.".to_string()))?;

    if let Some((name, _)) = request.features.iter().find(|(_, v)| !v.is_finite()) {
        return Err(ServerError::BadRequest(format!("Feature {} is not a finite number", name)));
    }

    let result = predictor.predict(&request.features)?;
    if !result.missing.is_empty() {
        debug!(missing = ?result.missing, "Filled absent features with 0");
    }
    info!(
        score = result.prediction.score,
        verdict = %result.prediction.verdict,
        "Prediction served"
    );
    Ok(Json(result.prediction))
}

pub async fn get_report(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let content = match tokio::fs::read_to_string(state.paths().report()).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => REPORT_PLACEHOLDER.to_string(),
        Err(e) => return Err(e.into()),
    };
    Ok(Json(json!({ "content": content })))
}

/// One of the EDA chart files; anything outside the allow-list is a 404
pub async fn get_eda(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let name = name.strip_suffix(".json").unwrap_or(&name);
    if !EDA_OUTPUTS.contains(&name) {
        return Err(ServerError::NotFound(format!("Unknown EDA output: {}", name)));
    }
    let path = state.paths().join(&eda::file_name(name));
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ServerError::NotFound(format!("{} has not been generated", name)));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Json(serde_json::from_slice(&bytes)?))
}

pub async fn serve_index() -> Html<&'static str> {
    Html(EMBEDDED_INDEX_HTML)
}

const EMBEDDED_INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>VinoVeritas</title>
    <script defer src="https://cdn.jsdelivr.net/npm/alpinejs@3.x.x/dist/cdn.min.js"></script>
    <script src="https://cdn.tailwindcss.com"></script>
    <style>[x-cloak]{display:none!important}.tab-active{background-color:rgb(127 29 29);color:white}</style>
</head>
<body class="bg-stone-950 text-stone-100 min-h-screen" x-data="app()" x-init="init()">
    <header class="bg-stone-900 border-b border-stone-800 px-6 py-4">
        <div class="flex items-center justify-between">
            <h1 class="text-xl font-bold">VinoVeritas</h1>
            <span class="text-sm text-stone-400" x-text="'v' + version"></span>
        </div>
    </header>
    <nav class="bg-stone-900 px-6 py-2 border-b border-stone-800">
        <div class="flex space-x-1">
            <button @click="tab='predict'" :class="tab==='predict'?'tab-active':'hover:bg-stone-800'" class="px-4 py-2 rounded-md text-sm">Predict</button>
            <button @click="tab='metrics'" :class="tab==='metrics'?'tab-active':'hover:bg-stone-800'" class="px-4 py-2 rounded-md text-sm">Metrics</button>
            <button @click="tab='eda'; loadEda()" :class="tab==='eda'?'tab-active':'hover:bg-stone-800'" class="px-4 py-2 rounded-md text-sm">Explore</button>
            <button @click="tab='report'; loadReport()" :class="tab==='report'?'tab-active':'hover:bg-stone-800'" class="px-4 py-2 rounded-md text-sm">Report</button>
        </div>
    </nav>
    <main class="p-6 max-w-5xl mx-auto">
        <section x-show="tab==='predict'" x-cloak>
            <template x-if="features.length === 0">
                <p class="text-stone-400">No model artifacts found. Run <code>vinoveritas train</code> first.</p>
            </template>
            <form @submit.prevent="predict()" class="grid grid-cols-2 md:grid-cols-3 gap-4" x-show="features.length > 0">
                <template x-for="name in features" :key="name">
                    <label class="text-sm">
                        <span class="block text-stone-400 mb-1" x-text="name"></span>
                        <input type="number" step="any" x-model.number="values[name]" class="w-full bg-stone-800 rounded px-2 py-1">
                    </label>
                </template>
                <button type="submit" class="col-span-full bg-red-900 hover:bg-red-800 rounded py-2">Taste</button>
            </form>
            <div x-show="result" class="mt-6 bg-stone-900 rounded p-4">
                <div class="text-4xl font-bold" x-text="result && result.score"></div>
                <div class="text-lg" x-text="result && result.verdict"></div>
                <p class="text-stone-400 mt-2" x-text="result && result.advice"></p>
            </div>
            <p class="text-red-400 mt-4" x-text="error"></p>
        </section>
        <section x-show="tab==='metrics'" x-cloak>
            <pre class="bg-stone-900 rounded p-4" x-text="JSON.stringify(metrics, null, 2)"></pre>
        </section>
        <section x-show="tab==='eda'" x-cloak>
            <template x-for="h in histograms" :key="h.column">
                <div class="mb-4">
                    <div class="text-sm text-stone-400" x-text="h.column"></div>
                    <div class="flex items-end h-16 gap-px">
                        <template x-for="(c, i) in h.counts" :key="i">
                            <div class="bg-red-800 flex-1" :style="'height:' + (100 * c / Math.max(...h.counts)) + '%'"></div>
                        </template>
                    </div>
                </div>
            </template>
            <div class="overflow-x-auto mt-6" x-show="correlation">
                <div class="text-sm text-stone-400 mb-2">Correlation</div>
                <table class="text-xs">
                    <tr>
                        <th></th>
                        <template x-for="c in (correlation ? correlation.columns : [])" :key="c">
                            <th class="px-1 text-stone-400 font-normal" x-text="c"></th>
                        </template>
                    </tr>
                    <template x-for="(row, i) in (correlation ? correlation.values : [])" :key="i">
                        <tr>
                            <th class="pr-2 text-right text-stone-400 font-normal" x-text="correlation.columns[i]"></th>
                            <template x-for="(v, j) in row" :key="j">
                                <td class="w-10 h-6 text-center" :style="cellStyle(v)" x-text="v === null ? '' : v.toFixed(2)"></td>
                            </template>
                        </tr>
                    </template>
                </table>
            </div>
            <pre class="bg-stone-900 rounded p-4 mt-4" x-text="JSON.stringify(quality, null, 2)"></pre>
        </section>
        <section x-show="tab==='report'" x-cloak>
            <pre class="bg-stone-900 rounded p-4 whitespace-pre-wrap" x-text="report"></pre>
        </section>
    </main>
    <script>
    function app() {
        return {
            tab: 'predict', version: '', features: [], values: {}, result: null, error: '',
            metrics: {}, histograms: [], quality: null, correlation: null, report: '',
            async init() {
                this.version = (await (await fetch('/health')).json()).version;
                this.features = (await (await fetch('/features')).json()).features;
                this.features.forEach(f => this.values[f] = 0);
                this.metrics = await (await fetch('/metrics')).json();
            },
            async predict() {
                this.error = '';
                const res = await fetch('/predict', {
                    method: 'POST', headers: {'Content-Type': 'application/json'},
                    body: JSON.stringify({features: this.values}),
                });
                const body = await res.json();
                if (res.ok) { this.result = body; } else { this.result = null; this.error = body.message; }
            },
            async loadEda() {
                const h = await fetch('/eda/eda_histograms');
                if (h.ok) this.histograms = await h.json();
                const q = await fetch('/eda/eda_quality_dist');
                if (q.ok) this.quality = await q.json();
                const c = await fetch('/eda/eda_correlation');
                if (c.ok) this.correlation = await c.json();
            },
            cellStyle(v) {
                if (v === null) return 'background:rgb(41 37 36)';
                const a = Math.abs(v).toFixed(2);
                return v >= 0 ? `background:rgba(185,28,28,${a})` : `background:rgba(37,99,235,${a})`;
            },
            async loadReport() {
                this.report = (await (await fetch('/report')).json()).content;
            },
        };
    }
    </script>
</body>
</html>
"#;
