//! # Gatewayメトリクス
//!
//! Prometheusレジストリと、Gatewayが記録するカウンタ。

use axum::http::StatusCode;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Gatewayが公開するメトリクス。
///
/// クローンは同じレジストリとカウンタを共有する。
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    /// GETレスポンスに転送したバイト数
    pub file_download_byte_size: IntCounter,
    storage_requests_total: IntCounterVec,
}

impl GatewayMetrics {
    /// レジストリを作成し、全カウンタを登録する。
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let file_download_byte_size = IntCounter::with_opts(Opts::new(
            "file_download_byte_size",
            "Total bytes streamed to clients by GET requests",
        ))?;
        let storage_requests_total = IntCounterVec::new(
            Opts::new(
                "storage_requests_total",
                "Storage requests by method and response status",
            ),
            &["method", "status"],
        )?;

        registry.register(Box::new(file_download_byte_size.clone()))?;
        registry.register(Box::new(storage_requests_total.clone()))?;

        Ok(Self {
            registry,
            file_download_byte_size,
            storage_requests_total,
        })
    }

    /// ストレージリクエストを1件記録する。
    pub fn observe_request(&self, method: &str, status: StatusCode) {
        self.storage_requests_total
            .with_label_values(&[method, status.as_str()])
            .inc();
    }

    /// 登録済みメトリクスをPrometheusテキスト形式で出力する。
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// 指定したメソッド・ステータスのリクエスト数
    #[cfg(test)]
    pub fn requests(&self, method: &str, status: StatusCode) -> u64 {
        self.storage_requests_total
            .with_label_values(&[method, status.as_str()])
            .get()
    }
}
